//! Sync runner - drives one pass over a download work manager
//!
//! Polls requests, fetches them from the FHIR server, feeds the pages back
//! to the manager and hands yielded resources to the sink until the queue
//! is drained, a limit is hit or shutdown is requested.

use super::manager::{DownloadRequest, DownloadWorkManager};
use super::report::{SyncError, SyncErrorType, SyncSummary};
use crate::adapters::fhir::FhirServer;
use crate::adapters::storage::ResourceSink;
use crate::config::SyncConfig;
use crate::domain::{FhirResource, FhirSyncError, Resource, Result};
use crate::{log_error_with_context, log_sync_complete, log_sync_start};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Knobs for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Keep draining the queue after a request fails
    pub continue_on_error: bool,

    /// Fetch `_summary=count` totals before the pass
    pub fetch_summary_counts: bool,

    /// Stop after this many requests
    pub max_pages: Option<usize>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            fetch_summary_counts: false,
            max_pages: None,
        }
    }
}

impl From<&SyncConfig> for RunnerOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            continue_on_error: config.continue_on_error,
            fetch_summary_counts: config.fetch_summary_counts,
            max_pages: config.max_pages,
        }
    }
}

/// How a single request ended
enum Outcome {
    Processed(Vec<Resource>),
    Failed(FhirSyncError),
    Interrupted,
}

/// Sync runner
pub struct SyncRunner {
    server: Arc<dyn FhirServer>,
    sink: Arc<dyn ResourceSink + Send + Sync>,
    options: RunnerOptions,
    shutdown_signal: watch::Receiver<bool>,
}

impl SyncRunner {
    /// Create a new sync runner
    pub fn new(
        server: Arc<dyn FhirServer>,
        sink: Arc<dyn ResourceSink + Send + Sync>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            server,
            sink,
            options: RunnerOptions::default(),
            shutdown_signal,
        }
    }

    /// Replace the pass options
    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Run one pass until the manager is drained
    ///
    /// Request failures are recorded in the returned summary. With
    /// `continue_on_error` unset the pass stops at the first one. A failing
    /// sink always stops the pass and puts back the watermarks the unsaved
    /// page had moved.
    ///
    /// # Errors
    ///
    /// Returns an error only if the manager itself cannot hand out requests
    /// (for example the watermark store is unreadable).
    pub async fn run<M>(&self, manager: &mut M) -> Result<SyncSummary>
    where
        M: DownloadWorkManager + ?Sized,
    {
        let start_time = Instant::now();
        let mut summary = SyncSummary::new();

        log_sync_start!(self.server.base_url());

        if self.options.fetch_summary_counts {
            self.prefetch_counts(&*manager, &mut summary).await?;
        }

        loop {
            if self.shutdown_requested() {
                tracing::warn!(
                    requests = summary.requests_issued,
                    "Shutdown requested, stopping sync before next request"
                );
                summary.interrupted = true;
                break;
            }

            if let Some(max_pages) = self.options.max_pages {
                if summary.requests_issued >= max_pages {
                    tracing::warn!(max_pages, "Page limit reached, stopping sync");
                    summary.page_limit_reached = true;
                    break;
                }
            }

            let Some(request) = manager.next_request().await? else {
                break;
            };
            summary.requests_issued += 1;

            match self.execute_request(manager, &request).await {
                Outcome::Processed(resources) => {
                    summary.pages_processed += 1;
                    if let Err(e) = self.sink.store(&resources).await {
                        log_error_with_context!(&e, "Failed to store downloaded resources");
                        if let Err(revert) = manager.revert_last_page().await {
                            log_error_with_context!(&revert, "Failed to restore page watermarks");
                        }
                        summary.add_error(
                            SyncError::new(SyncErrorType::Storage, e.to_string())
                                .with_url(request.url.as_str()),
                        );
                        break;
                    }
                    summary.record_resources(resources.iter().map(|r| r.resource_type.as_str()));
                }
                Outcome::Failed(e) => {
                    tracing::error!(url = %request.url, error = %e, "Request failed");
                    summary.add_error(SyncError::from(&e).with_url(request.url.as_str()));
                    if !self.options.continue_on_error {
                        tracing::warn!("Stopping sync after failed request");
                        break;
                    }
                }
                Outcome::Interrupted => {
                    tracing::warn!(url = %request.url, "Shutdown requested, abandoning in-flight request");
                    summary.interrupted = true;
                    break;
                }
            }
        }

        let summary = summary.with_duration(start_time.elapsed());
        log_sync_complete!(summary.resources_downloaded, summary.duration);

        Ok(summary)
    }

    /// Fetch and process one request, giving up early on shutdown
    async fn execute_request<M>(&self, manager: &mut M, request: &DownloadRequest) -> Outcome
    where
        M: DownloadWorkManager + ?Sized,
    {
        let mut shutdown = self.shutdown_signal.clone();

        let page = tokio::select! {
            page = self.server.fetch(&request.url) => page,
            _ = wait_for_shutdown(&mut shutdown) => return Outcome::Interrupted,
        };

        let page = match page {
            Ok(page) => page,
            Err(e) => return Outcome::Failed(e),
        };

        tracing::debug!(url = %request.url, page = page.type_name(), "Processing page");

        match manager.process_response(page).await {
            Ok(resources) => Outcome::Processed(resources),
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Ask the server for match counts of everything pending
    ///
    /// Counts are informational only; a failed count request is logged and
    /// skipped.
    async fn prefetch_counts<M>(&self, manager: &M, summary: &mut SyncSummary) -> Result<()>
    where
        M: DownloadWorkManager + ?Sized,
    {
        for (resource_type, url) in manager.summary_request_urls().await? {
            if self.shutdown_requested() {
                break;
            }

            match self.server.fetch(&url).await {
                Ok(FhirResource::Bundle(bundle)) => match bundle.total {
                    Some(total) => {
                        tracing::info!(resource_type = %resource_type, total, "Resources to download");
                        summary.expected_totals.insert(resource_type, total);
                    }
                    None => {
                        tracing::debug!(resource_type = %resource_type, "Count bundle has no total")
                    }
                },
                Ok(other) => tracing::warn!(
                    resource_type = %resource_type,
                    page = other.type_name(),
                    "Unexpected answer to count request"
                ),
                Err(e) => tracing::warn!(
                    resource_type = %resource_type,
                    error = %e,
                    "Count request failed"
                ),
            }
        }

        Ok(())
    }
}

/// Resolve once a shutdown is signalled; never resolve if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
