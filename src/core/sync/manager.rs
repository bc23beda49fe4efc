//! Download work manager
//!
//! Owns the pending-request queue of one sync pass. Requests are polled one
//! at a time, each fetched page is handed back through
//! [`DownloadWorkManager::process_response`], and processing decides what
//! gets queued next and how far the watermarks move.

use super::cursor::{affix, EVERYTHING_OPERATION};
use super::summary::summary_url;
use super::templates::{build_templates, SyncFilterConfig};
use crate::config::SyncConfig;
use crate::core::state::{StateManager, WatermarkSnapshot};
use crate::domain::{FhirError, FhirResource, Resource, ResourceType, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// One GET request handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// URL to fetch, relative to the server base or absolute
    pub url: String,

    /// Resource type the URL was classified as, if any
    pub resource_type: Option<ResourceType>,
}

/// The page-by-page protocol a sync driver speaks
#[async_trait]
pub trait DownloadWorkManager: Send {
    /// Poll the next request, or `None` once the queue is drained
    async fn next_request(&mut self) -> Result<Option<DownloadRequest>>;

    /// Count-only URL per resource type for everything still pending
    async fn summary_request_urls(&self) -> Result<BTreeMap<ResourceType, String>>;

    /// Feed one fetched page and get back the resources it yields
    ///
    /// # Errors
    ///
    /// Returns `FhirError::OperationOutcome` when the page is an
    /// OperationOutcome. The queue is left as it was.
    async fn process_response(&mut self, response: FhirResource) -> Result<Vec<Resource>>;

    /// Undo the watermark moves of the last processed page
    ///
    /// Called when the resources of that page could not be persisted, so the
    /// next pass fetches them again.
    async fn revert_last_page(&mut self) -> Result<()>;
}

/// Timestamp-cursored download manager
///
/// # Example
///
/// ```no_run
/// use fhirsync::adapters::storage::MemoryTimestampStore;
/// use fhirsync::core::state::StateManager;
/// use fhirsync::core::sync::{DownloadManager, DownloadWorkManager};
/// use std::sync::Arc;
///
/// # async fn example() -> fhirsync::domain::Result<()> {
/// let state = Arc::new(StateManager::new_with_store(Arc::new(MemoryTimestampStore::new())));
/// let mut manager = DownloadManager::new(vec!["Patient?_count=50".to_string()], state);
///
/// while let Some(request) = manager.next_request().await? {
///     println!("GET {}", request.url);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DownloadManager {
    /// Pending requests, oldest first
    queue: VecDeque<String>,

    /// Watermark access
    state: Arc<StateManager>,

    /// Watermarks as they were before the last searchset page
    last_page: Option<WatermarkSnapshot>,
}

impl DownloadManager {
    /// Create a manager over an already templated queue
    pub fn new(urls: Vec<String>, state: Arc<StateManager>) -> Self {
        Self {
            queue: urls.into(),
            state,
            last_page: None,
        }
    }

    /// Template the configured URL lists into a fresh queue
    ///
    /// # Errors
    ///
    /// Returns `FhirSyncError::UnrecognizedResourceType` if a configured URL
    /// names no known resource type.
    pub fn from_config(config: &SyncConfig, state: Arc<StateManager>) -> Result<Self> {
        let filters = SyncFilterConfig::from(config);
        let urls = build_templates(
            &config.first_sync_urls,
            &config.recurring_sync_urls,
            &filters,
        )?;

        tracing::debug!(count = urls.len(), "Templated initial sync queue");

        Ok(Self::new(urls, state))
    }

    /// Requests still waiting, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    /// Number of requests still waiting
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    async fn cursor_for(&self, resource_type: Option<ResourceType>) -> Result<Option<String>> {
        match resource_type {
            Some(resource_type) => self.state.load_timestamp(resource_type).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DownloadWorkManager for DownloadManager {
    async fn next_request(&mut self) -> Result<Option<DownloadRequest>> {
        let Some(url) = self.queue.pop_front() else {
            return Ok(None);
        };

        let resource_type = ResourceType::from_url(&url);
        let url = match self.cursor_for(resource_type).await? {
            Some(last_updated) => affix(&url, &last_updated),
            None => url,
        };

        Ok(Some(DownloadRequest { url, resource_type }))
    }

    async fn summary_request_urls(&self) -> Result<BTreeMap<ResourceType, String>> {
        let mut urls = BTreeMap::new();

        for url in &self.queue {
            let Some(resource_type) = ResourceType::from_url(url) else {
                tracing::debug!(url = %url, "No resource type for pending URL, skipping count");
                continue;
            };

            let last_updated = self.state.load_timestamp(resource_type).await?;
            urls.insert(resource_type, summary_url(url, last_updated.as_deref()));
        }

        Ok(urls)
    }

    async fn process_response(&mut self, response: FhirResource) -> Result<Vec<Resource>> {
        self.last_page = None;
        match response {
            FhirResource::OperationOutcome(outcome) => {
                Err(FhirError::OperationOutcome(outcome.diagnostics()).into())
            }
            FhirResource::List(list) => {
                let before = self.queue.len();
                for reference in list.patient_references() {
                    let reference = reference.trim_end_matches('/');
                    self.queue
                        .push_back(format!("{reference}/{EVERYTHING_OPERATION}"));
                }
                tracing::debug!(
                    list_id = list.id.as_deref().unwrap_or(""),
                    patients = self.queue.len() - before,
                    "Expanded patient list"
                );
                Ok(Vec::new())
            }
            FhirResource::Bundle(bundle) => {
                if let Some(next) = bundle.next_link() {
                    self.queue.push_back(next.to_string());
                }

                if !bundle.is_searchset() {
                    tracing::debug!(bundle_type = %bundle.bundle_type, "Ignoring non-searchset bundle");
                    return Ok(Vec::new());
                }

                let resources = bundle.into_resources();

                let types: BTreeSet<ResourceType> =
                    resources.iter().filter_map(Resource::kind).collect();
                self.last_page = Some(self.state.snapshot(types).await?);
                self.state.checkpoint_page(&resources).await?;

                Ok(resources)
            }
            FhirResource::Other(resource) => {
                tracing::debug!(
                    resource_type = %resource.resource_type,
                    "Ignoring standalone resource page"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn revert_last_page(&mut self) -> Result<()> {
        match self.last_page.take() {
            Some(snapshot) => self.state.restore(&snapshot).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::{MemoryTimestampStore, TimestampStore};
    use crate::domain::FhirSyncError;
    use serde_json::json;

    fn manager_with(urls: &[&str], store: Arc<MemoryTimestampStore>) -> DownloadManager {
        let state = Arc::new(StateManager::new_with_store(store));
        DownloadManager::new(urls.iter().map(|u| u.to_string()).collect(), state)
    }

    fn page(value: serde_json::Value) -> FhirResource {
        FhirResource::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn test_next_request_drains_in_order() {
        let store = Arc::new(MemoryTimestampStore::new());
        let mut manager = manager_with(&["Patient?_count=50", "Observation?_count=50"], store);

        let first = manager.next_request().await.unwrap().unwrap();
        assert_eq!(first.url, "Patient?_count=50");
        assert_eq!(first.resource_type, Some(ResourceType::Patient));
        assert_eq!(
            manager.next_request().await.unwrap().unwrap().url,
            "Observation?_count=50"
        );
        assert!(manager.next_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_request_affixes_stored_cursor() {
        let store = Arc::new(MemoryTimestampStore::new());
        store
            .set(ResourceType::Encounter, "2024-01-01T00:00:00.000Z")
            .await
            .unwrap();
        let mut manager = manager_with(&["Encounter?_count=50", "Patient"], store);

        assert_eq!(
            manager.next_request().await.unwrap().unwrap().url,
            "Encounter?_count=50&_lastUpdated=gt2024-01-01T00:00:00.000Z"
        );
        assert_eq!(manager.next_request().await.unwrap().unwrap().url, "Patient");
    }

    #[tokio::test]
    async fn test_unclassified_next_link_is_issued_verbatim() {
        let store = Arc::new(MemoryTimestampStore::new());
        store
            .set(ResourceType::Patient, "2024-01-01T00:00:00.000Z")
            .await
            .unwrap();
        let mut manager = manager_with(&["http://host/fhir?_getpages=abc&_getpagesoffset=50"], store);

        let request = manager.next_request().await.unwrap().unwrap();
        assert_eq!(request.url, "http://host/fhir?_getpages=abc&_getpagesoffset=50");
        assert_eq!(request.resource_type, None);
    }

    #[tokio::test]
    async fn test_operation_outcome_is_an_error() {
        let store = Arc::new(MemoryTimestampStore::new());
        let mut manager = manager_with(&[], store);

        let err = manager
            .process_response(page(json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "processing", "diagnostics": "Invalid search"}]
            })))
            .await
            .unwrap_err();

        match err {
            FhirSyncError::Fhir(FhirError::OperationOutcome(msg)) => assert_eq!(msg, "Invalid search"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(manager.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_list_expands_patients_only() {
        let store = Arc::new(MemoryTimestampStore::new());
        let mut manager = manager_with(&[], store);

        let yielded = manager
            .process_response(page(json!({
                "resourceType": "List",
                "id": "roster",
                "entry": [
                    {"item": {"reference": "Patient/p1"}},
                    {"item": {"reference": "Practitioner/x"}},
                    {"item": {"display": "no reference"}},
                    {"item": {"reference": "Patient/p2"}}
                ]
            })))
            .await
            .unwrap();

        assert!(yielded.is_empty());
        let pending: Vec<_> = manager.pending().collect();
        assert_eq!(pending, vec!["Patient/p1/$everything", "Patient/p2/$everything"]);
    }

    #[tokio::test]
    async fn test_non_searchset_bundle_yields_nothing() {
        let store = Arc::new(MemoryTimestampStore::new());
        let mut manager = manager_with(&[], store.clone());

        let yielded = manager
            .process_response(page(json!({
                "resourceType": "Bundle",
                "type": "history",
                "link": [{"relation": "next", "url": "http://host/fhir?page=2"}],
                "entry": [{"resource": {
                    "resourceType": "Patient",
                    "id": "p1",
                    "meta": {"lastUpdated": "2024-01-01T00:00:00Z"}
                }}]
            })))
            .await
            .unwrap();

        assert!(yielded.is_empty());
        assert_eq!(manager.pending().collect::<Vec<_>>(), vec!["http://host/fhir?page=2"]);
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_urls_use_cursor_and_last_url_per_type() {
        let store = Arc::new(MemoryTimestampStore::new());
        store
            .set(ResourceType::Patient, "2024-01-01T00:00:00.000Z")
            .await
            .unwrap();
        let manager = manager_with(
            &[
                "Patient?_count=50",
                "Observation?_summary=data",
                "Patient/p9/$everything",
                "http://host/fhir?_getpages=x",
            ],
            store,
        );

        let urls = manager.summary_request_urls().await.unwrap();

        assert_eq!(urls.len(), 2);
        assert_eq!(
            urls[&ResourceType::Patient],
            "Patient/p9/$everything?_since=2024-01-01T00:00:00.000Z&_summary=count"
        );
        assert_eq!(urls[&ResourceType::Observation], "Observation?_summary=count");
        assert_eq!(manager.pending_len(), 4);
    }

    #[tokio::test]
    async fn test_revert_last_page_restores_watermarks() {
        let store = Arc::new(MemoryTimestampStore::new());
        store
            .set(ResourceType::Patient, "2024-01-01T00:00:00.000Z")
            .await
            .unwrap();
        let mut manager = manager_with(&[], store.clone());

        manager
            .process_response(page(json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "entry": [
                    {"resource": {"resourceType": "Patient", "id": "p1",
                                  "meta": {"lastUpdated": "2024-05-01T00:00:00.000Z"}}},
                    {"resource": {"resourceType": "Encounter", "id": "e1",
                                  "meta": {"lastUpdated": "2024-05-02T00:00:00.000Z"}}}
                ]
            })))
            .await
            .unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 2);

        manager.revert_last_page().await.unwrap();

        assert_eq!(
            store.get(ResourceType::Patient).await.unwrap().as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
        assert_eq!(store.get(ResourceType::Encounter).await.unwrap(), None);

        // Only the last page is undone, and only once
        manager.revert_last_page().await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_templates_queue() {
        let store = Arc::new(MemoryTimestampStore::new());
        let state = Arc::new(StateManager::new_with_store(store));
        let config = SyncConfig {
            first_sync_urls: "Patient?_count=100".to_string(),
            recurring_sync_urls: "Patient?_count=50,Group?_count=10".to_string(),
            cohort_type: Some("cohort".to_string()),
            ..Default::default()
        };

        let manager = DownloadManager::from_config(&config, state).unwrap();
        assert_eq!(
            manager.pending().collect::<Vec<_>>(),
            vec!["Patient?_count=100", "Group?_count=10&list-type=cohort"]
        );
    }
}
