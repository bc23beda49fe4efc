//! Integration tests for a full sync pass
//!
//! These tests verify that:
//! - Paginated searches are followed to the last page
//! - Failed requests are recorded and honour continue_on_error
//! - The page limit and shutdown signal stop the pass early
//! - A second pass resumes from the stored watermarks

use async_trait::async_trait;
use fhirsync::adapters::fhir::{FhirServer, HttpFhirClient};
use fhirsync::adapters::storage::{
    FileTimestampStore, MemoryResourceSink, MemoryTimestampStore, NdjsonSink, ResourceSink,
    TimestampStore,
};
use fhirsync::config::FhirConfig;
use fhirsync::core::state::StateManager;
use fhirsync::core::sync::{DownloadManager, RunnerOptions, SyncErrorType, SyncRunner};
use fhirsync::domain::{FhirError, FhirResource, FhirSyncError, Resource, ResourceType, Result};
use mockito::Matcher;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

/// Serves canned pages keyed by the exact request URL
struct CannedServer {
    pages: HashMap<String, Value>,
    requested: Mutex<Vec<String>>,
}

impl CannedServer {
    fn new(pages: Vec<(&str, Value)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, page)| (url.to_string(), page))
                .collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl FhirServer for CannedServer {
    async fn fetch(&self, url: &str) -> Result<FhirResource> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(page) => FhirResource::from_json(page.clone()),
            None => Err(FhirError::ClientError {
                status: 404,
                message: format!("no page for {url}"),
            }
            .into()),
        }
    }

    fn base_url(&self) -> &str {
        "http://canned.test/fhir"
    }
}

/// Never answers
struct HangingServer;

#[async_trait]
impl FhirServer for HangingServer {
    async fn fetch(&self, _url: &str) -> Result<FhirResource> {
        std::future::pending().await
    }

    fn base_url(&self) -> &str {
        "http://hanging.test/fhir"
    }
}

struct FailingSink;

#[async_trait]
impl ResourceSink for FailingSink {
    async fn store(&self, _resources: &[Resource]) -> Result<usize> {
        Err(FhirSyncError::Storage("disk full".to_string()))
    }
}

fn searchset(resources: Vec<Value>, next: Option<&str>) -> Value {
    let mut link = vec![json!({"relation": "self", "url": "ignored"})];
    if let Some(next) = next {
        link.push(json!({"relation": "next", "url": next}));
    }
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "link": link,
        "entry": resources.into_iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
    })
}

fn patient(id: &str, last_updated: &str) -> Value {
    json!({"resourceType": "Patient", "id": id, "meta": {"lastUpdated": last_updated}})
}

fn outcome(diagnostics: &str) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [{"severity": "error", "code": "processing", "diagnostics": diagnostics}]
    })
}

fn manager(urls: &[&str], store: Arc<MemoryTimestampStore>) -> DownloadManager {
    let state = Arc::new(StateManager::new_with_store(store));
    DownloadManager::new(urls.iter().map(|u| u.to_string()).collect(), state)
}

#[tokio::test]
async fn test_pass_follows_pagination() {
    let server = Arc::new(CannedServer::new(vec![
        (
            "Patient?_count=1",
            searchset(
                vec![patient("p1", "2024-03-01T00:00:00.000Z")],
                Some("http://canned.test/fhir?_getpages=q&page_token=2"),
            ),
        ),
        (
            "http://canned.test/fhir?_getpages=q&page_token=2",
            searchset(vec![patient("p2", "2024-03-02T00:00:00.000Z")], None),
        ),
    ]));
    let store = Arc::new(MemoryTimestampStore::new());
    let sink = Arc::new(MemoryResourceSink::new());
    let (_tx, rx) = watch::channel(false);

    let runner = SyncRunner::new(server.clone(), sink.clone(), rx);
    let mut manager = manager(&["Patient?_count=1"], store.clone());
    let summary = runner.run(&mut manager).await.unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.resources_downloaded, 2);
    assert_eq!(summary.resources_by_type["Patient"], 2);
    assert_eq!(sink.resources().await.len(), 2);
    assert_eq!(
        store.get(ResourceType::Patient).await.unwrap().as_deref(),
        Some("2024-03-02T00:00:00.000Z")
    );
}

#[tokio::test]
async fn test_operation_outcome_continues_by_default() {
    let server = Arc::new(CannedServer::new(vec![
        ("Patient", outcome("Patient search is disabled")),
        (
            "Encounter",
            searchset(
                vec![json!({"resourceType": "Encounter", "id": "e1"})],
                None,
            ),
        ),
    ]));
    let sink = Arc::new(MemoryResourceSink::new());
    let (_tx, rx) = watch::channel(false);

    let runner = SyncRunner::new(server.clone(), sink.clone(), rx);
    let mut manager = manager(&["Patient", "Encounter"], Arc::new(MemoryTimestampStore::new()));
    let summary = runner.run(&mut manager).await.unwrap();

    assert!(!summary.is_successful());
    assert_eq!(summary.failed_requests, 1);
    assert_eq!(summary.errors[0].error_type, SyncErrorType::OperationOutcome);
    assert_eq!(summary.errors[0].url.as_deref(), Some("Patient"));
    assert_eq!(summary.resources_downloaded, 1);
    assert_eq!(server.requested(), vec!["Patient", "Encounter"]);
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let server = Arc::new(CannedServer::new(vec![
        ("Patient", outcome("boom")),
        ("Encounter", searchset(vec![], None)),
    ]));
    let (_tx, rx) = watch::channel(false);

    let runner = SyncRunner::new(server.clone(), Arc::new(MemoryResourceSink::new()), rx)
        .with_options(RunnerOptions {
            continue_on_error: false,
            ..RunnerOptions::default()
        });
    let mut manager = manager(&["Patient", "Encounter"], Arc::new(MemoryTimestampStore::new()));
    let summary = runner.run(&mut manager).await.unwrap();

    assert_eq!(summary.requests_issued, 1);
    assert_eq!(summary.failed_requests, 1);
    assert_eq!(manager.pending_len(), 1);
    assert_eq!(server.requested(), vec!["Patient"]);
}

#[tokio::test]
async fn test_sink_failure_stops_pass() {
    let cursored = "Patient?_lastUpdated=gt2024-02-01T00:00:00.000Z";
    let server = Arc::new(CannedServer::new(vec![
        (
            cursored,
            searchset(
                vec![
                    patient("p1", "2024-03-01T00:00:00.000Z"),
                    json!({"resourceType": "Encounter", "id": "e1",
                           "meta": {"lastUpdated": "2024-03-02T00:00:00.000Z"}}),
                ],
                None,
            ),
        ),
        ("Encounter", searchset(vec![], None)),
    ]));
    let (_tx, rx) = watch::channel(false);
    let store = Arc::new(MemoryTimestampStore::with_entries(BTreeMap::from([(
        ResourceType::Patient,
        "2024-02-01T00:00:00.000Z".to_string(),
    )])));

    let runner = SyncRunner::new(server.clone(), Arc::new(FailingSink), rx);
    let mut manager = manager(&["Patient", "Encounter"], store.clone());
    let summary = runner.run(&mut manager).await.unwrap();

    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].error_type, SyncErrorType::Storage);
    assert_eq!(summary.resources_downloaded, 0);
    assert_eq!(server.requested(), vec![cursored]);

    // The unsaved page must be fetched again on the next pass
    assert_eq!(
        store.get(ResourceType::Patient).await.unwrap().as_deref(),
        Some("2024-02-01T00:00:00.000Z")
    );
    assert_eq!(store.get(ResourceType::Encounter).await.unwrap(), None);
}

#[tokio::test]
async fn test_page_limit_stops_pass() {
    let server = Arc::new(CannedServer::new(vec![
        ("Patient", searchset(vec![], None)),
        ("Encounter", searchset(vec![], None)),
        ("Observation", searchset(vec![], None)),
    ]));
    let (_tx, rx) = watch::channel(false);

    let runner = SyncRunner::new(server.clone(), Arc::new(MemoryResourceSink::new()), rx)
        .with_options(RunnerOptions {
            max_pages: Some(2),
            ..RunnerOptions::default()
        });
    let mut manager = manager(
        &["Patient", "Encounter", "Observation"],
        Arc::new(MemoryTimestampStore::new()),
    );
    let summary = runner.run(&mut manager).await.unwrap();

    assert!(summary.page_limit_reached);
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(manager.pending_len(), 1);
}

#[tokio::test]
async fn test_signalled_shutdown_issues_no_requests() {
    let server = Arc::new(CannedServer::new(vec![("Patient", searchset(vec![], None))]));
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let runner = SyncRunner::new(server.clone(), Arc::new(MemoryResourceSink::new()), rx);
    let mut manager = manager(&["Patient"], Arc::new(MemoryTimestampStore::new()));
    let summary = runner.run(&mut manager).await.unwrap();

    assert!(summary.interrupted);
    assert!(!summary.is_successful());
    assert_eq!(summary.requests_issued, 0);
    assert!(server.requested().is_empty());
}

#[tokio::test]
async fn test_shutdown_abandons_in_flight_request() {
    let (tx, rx) = watch::channel(false);
    let runner = SyncRunner::new(Arc::new(HangingServer), Arc::new(MemoryResourceSink::new()), rx);
    let mut manager = manager(&["Patient"], Arc::new(MemoryTimestampStore::new()));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), runner.run(&mut manager))
        .await
        .expect("runner did not stop on shutdown")
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.requests_issued, 1);
    assert_eq!(summary.pages_processed, 0);
}

#[tokio::test]
async fn test_summary_counts_are_collected() {
    let server = Arc::new(CannedServer::new(vec![
        (
            "Patient?_count=50&_summary=count",
            json!({"resourceType": "Bundle", "type": "searchset", "total": 42}),
        ),
        ("Patient?_count=50", searchset(vec![], None)),
        // No count page for Encounter: the failure is only logged
        ("Encounter", searchset(vec![], None)),
    ]));
    let (_tx, rx) = watch::channel(false);

    let runner = SyncRunner::new(server.clone(), Arc::new(MemoryResourceSink::new()), rx)
        .with_options(RunnerOptions {
            fetch_summary_counts: true,
            ..RunnerOptions::default()
        });
    let mut manager = manager(
        &["Patient?_count=50", "Encounter"],
        Arc::new(MemoryTimestampStore::new()),
    );
    let summary = runner.run(&mut manager).await.unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.expected_totals.get(&ResourceType::Patient), Some(&42));
    assert!(!summary.expected_totals.contains_key(&ResourceType::Encounter));
    assert_eq!(summary.requests_issued, 2);
}

#[tokio::test]
async fn test_http_sync_resumes_from_stored_watermark() {
    let mut server = mockito::Server::new_async().await;
    let base_url = format!("{}/fhir", server.url());
    let next_url = format!("{base_url}?_getpages=q1&page_token=2");

    let first_page = server
        .mock("GET", "/fhir/Patient")
        .match_query(Matcher::UrlEncoded("_count".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/fhir+json")
        .with_body(
            searchset(
                vec![patient("p1", "2024-03-01T00:00:00.000Z")],
                Some(&next_url),
            )
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let second_page = server
        .mock("GET", "/fhir")
        .match_query(Matcher::UrlEncoded("page_token".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/fhir+json")
        .with_body(searchset(vec![patient("p2", "2024-03-02T00:00:00.000Z")], None).to_string())
        .expect(1)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let client: Arc<dyn FhirServer> = Arc::new(
        HttpFhirClient::new(FhirConfig {
            base_url: base_url.clone(),
            auth_type: "none".to_string(),
            ..FhirConfig::default()
        })
        .unwrap(),
    );
    let sink = Arc::new(NdjsonSink::new(dir.path().join("resources"), false).await.unwrap());
    let (_tx, rx) = watch::channel(false);
    let runner = SyncRunner::new(client, sink, rx);

    {
        let store = Arc::new(
            FileTimestampStore::open(dir.path().join("state"), "last_updated")
                .await
                .unwrap(),
        );
        let state = Arc::new(StateManager::new_with_store(store));
        let mut manager = DownloadManager::new(vec!["Patient?_count=1".to_string()], state);
        let summary = runner.run(&mut manager).await.unwrap();
        assert!(summary.is_successful());
        assert_eq!(summary.resources_downloaded, 2);
    }

    first_page.assert_async().await;
    second_page.assert_async().await;
    first_page.remove_async().await;

    let written = std::fs::read_to_string(dir.path().join("resources/Patient.ndjson")).unwrap();
    assert_eq!(written.lines().count(), 2);

    let resumed = server
        .mock("GET", "/fhir/Patient")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("_count".into(), "1".into()),
            Matcher::UrlEncoded("_lastUpdated".into(), "gt2024-03-02T00:00:00.000Z".into()),
        ]))
        .with_status(200)
        .with_body(searchset(vec![], None).to_string())
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(
        FileTimestampStore::open(dir.path().join("state"), "last_updated")
            .await
            .unwrap(),
    );
    let state = Arc::new(StateManager::new_with_store(store));
    let mut manager = DownloadManager::new(vec!["Patient?_count=1".to_string()], state);
    let summary = runner.run(&mut manager).await.unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.resources_downloaded, 0);
    resumed.assert_async().await;
}
