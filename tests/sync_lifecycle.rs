/// Integration tests for the update lifecycle
///
/// These tests drive the public API end to end: an `UpdateController`
/// running a `SyncOrchestrator` over the in-memory store, with CSV bodies
/// supplied by scripted sources instead of the remote service.
///
/// Covered:
/// 1. First sync from an empty store, including a duplicated row
/// 2. A sync window with no new rows
/// 3. Fetch failures: error status, untouched store, retry on next trigger
/// 4. Checkpoint progression between cycles
///
/// Run with: cargo test --test sync_lifecycle

use chrono::{TimeZone, Utc};
use hydrosync_service::config::SyncConfig;
use hydrosync_service::ingest::wateroffice::{CsvSource, FetchError, FetchRequest, HttpCsvSource};
use hydrosync_service::lifecycle::{SyncStatus, TriggerOutcome, UpdateController};
use hydrosync_service::model::Observation;
use hydrosync_service::store::{MemoryStore, ObservationStore};
use hydrosync_service::sync::{SyncMode, SyncOrchestrator};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const HEADER: &str = "\u{feff} ID ,Date,Parameter/Paramètre,Value/Valeur,Qualifier/Qualificatif\n";

fn csv(rows: &[&str]) -> String {
    let mut body = HEADER.to_string();
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    body
}

/// Replays a fixed list of responses and remembers every request.
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<String, FetchError>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<String, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CsvSource for ScriptedSource {
    fn fetch_csv(&self, request: &FetchRequest) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Holds each fetch until the test releases it.
struct GatedSource {
    gate: Mutex<Receiver<()>>,
    body: String,
}

impl GatedSource {
    fn new(body: String) -> (Self, Sender<()>) {
        let (release, gate) = mpsc::channel();
        (
            Self {
                gate: Mutex::new(gate),
                body,
            },
            release,
        )
    }
}

impl CsvSource for GatedSource {
    fn fetch_csv(&self, _request: &FetchRequest) -> Result<String, FetchError> {
        let _ = self.gate.lock().unwrap().recv();
        Ok(self.body.clone())
    }
}

fn orchestrator(store: &Arc<MemoryStore>, source: Arc<dyn CsvSource>) -> SyncOrchestrator {
    SyncOrchestrator::new(SyncConfig::default(), store.clone(), source)
        .with_clock(|| Utc.with_ymd_and_hms(2020, 8, 25, 6, 30, 0).unwrap())
}

fn wait_until_settled(controller: &UpdateController) -> SyncStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = controller.status();
        if !status.is_updating() {
            return status;
        }
        assert!(Instant::now() < deadline, "update did not finish in time");
        thread::sleep(Duration::from_millis(5));
    }
}

// ---------------------------------------------------------------------------
// 1. First sync from an empty store
// ---------------------------------------------------------------------------

#[test]
fn test_duplicate_row_is_stored_once_and_status_walks_to_success() {
    let store = Arc::new(MemoryStore::new());
    let body = csv(&[
        "05OJ005,2020-08-24 00:05:00,3,1.23,",
        "05OJ005,2020-08-24 00:05:00,3,1.23,",
    ]);
    let (source, release) = GatedSource::new(body);
    let controller = UpdateController::start(orchestrator(&store, Arc::new(source))).unwrap();

    assert_eq!(controller.status(), SyncStatus::Idle);

    assert_eq!(controller.trigger(), TriggerOutcome::Accepted);
    assert_eq!(controller.status().as_str(), "updating");

    release.send(()).unwrap();
    let status = wait_until_settled(&controller);

    assert_eq!(status.as_str(), "success", "unexpected status: {:?}", status);
    assert!(
        status.message().contains("1 new observations"),
        "message should count one insert: {}",
        status.message()
    );
    assert_eq!(store.count().unwrap(), 1, "duplicate row must be stored once");
    assert_eq!(
        store.query(None, None).unwrap(),
        vec![Observation::new("05OJ005", "2020-08-24 00:05:00", "3", "1.23")]
    );
}

#[test]
fn test_first_sync_starts_at_default_epoch() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new(vec![Ok(csv(&[
        "05OJ021,2020-08-24 00:05:00,46,231.004,",
    ]))]));
    let orchestrator = orchestrator(&store, source.clone());

    let report = orchestrator.refresh().unwrap();

    assert_eq!(report.mode, SyncMode::Full);
    let requests = source.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].start_date, "2020-08-24 00:00:00");
    assert_eq!(requests[0].end_date, "2020-08-25 06:30:00");
    assert_eq!(requests[0].stations, vec!["05OJ005", "05OJ021", "05OJ024"]);
}

// ---------------------------------------------------------------------------
// 2. No new rows
// ---------------------------------------------------------------------------

#[test]
fn test_window_without_new_rows_keeps_store_size() {
    let existing = vec![
        Observation::new("05OJ005", "2020-08-24 00:05:00", "46", "234.567"),
        Observation::new("05OJ024", "2020-08-24 00:10:00", "47", "10.2"),
    ];
    let store = Arc::new(MemoryStore::with_observations(&existing));
    let source = Arc::new(ScriptedSource::new(vec![Ok(csv(&[
        "05OJ024,2020-08-24 00:10:00,47,10.2,",
    ]))]));
    let controller = UpdateController::start(orchestrator(&store, source.clone())).unwrap();

    assert_eq!(controller.trigger(), TriggerOutcome::Accepted);
    let status = wait_until_settled(&controller);

    assert_eq!(status.as_str(), "success");
    assert!(status.message().contains("0 new observations"), "{}", status.message());
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(source.requests()[0].start_date, "2020-08-24 00:10:00");
}

#[test]
fn test_header_only_response_is_success() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new(vec![Ok(csv(&[]))]));
    let controller = UpdateController::start(orchestrator(&store, source)).unwrap();

    controller.trigger();
    let status = wait_until_settled(&controller);

    assert_eq!(status.as_str(), "success");
    assert_eq!(store.count().unwrap(), 0);
}

// ---------------------------------------------------------------------------
// 3. Fetch failures
// ---------------------------------------------------------------------------

#[test]
fn test_transport_error_leaves_store_unchanged_and_sticks() {
    let existing = vec![Observation::new("05OJ005", "2020-08-24 00:05:00", "46", "234.567")];
    let store = Arc::new(MemoryStore::with_observations(&existing));

    // Nothing listens on the discard port, so the connection is refused.
    let config = SyncConfig {
        base_url: "http://127.0.0.1:9/services/real_time_data/csv/inline".to_string(),
        timeout_secs: 5,
        ..SyncConfig::default()
    };
    let source = HttpCsvSource::new(&config).unwrap();
    let controller =
        UpdateController::start(SyncOrchestrator::new(config, store.clone(), Arc::new(source))).unwrap();

    assert_eq!(controller.trigger(), TriggerOutcome::Accepted);
    let status = wait_until_settled(&controller);

    assert_eq!(status.as_str(), "error", "unexpected status: {:?}", status);
    assert!(status.message().contains("127.0.0.1:9"), "error should name the URL: {}", status.message());
    assert_eq!(store.count().unwrap(), 1, "failed cycle must not touch the store");

    thread::sleep(Duration::from_millis(50));
    assert_eq!(controller.status(), status, "error status must persist until the next trigger");
}

#[test]
fn test_failed_cycle_retries_from_same_checkpoint() {
    let store = Arc::new(MemoryStore::with_observations(&[Observation::new(
        "05OJ005",
        "2020-08-24 00:05:00",
        "46",
        "234.567",
    )]));
    let source = Arc::new(ScriptedSource::new(vec![
        Err(FetchError::Status {
            url: "https://wateroffice.ec.gc.ca/services/real_time_data/csv/inline".to_string(),
            status: 503,
        }),
        Ok(csv(&["05OJ005,2020-08-24 00:10:00,46,234.600,"])),
    ]));
    let controller = UpdateController::start(orchestrator(&store, source.clone())).unwrap();

    controller.trigger();
    let first = wait_until_settled(&controller);
    assert_eq!(first.as_str(), "error");
    assert!(first.message().contains("503"), "{}", first.message());

    assert_eq!(controller.trigger(), TriggerOutcome::Accepted, "error state accepts a new trigger");
    let second = wait_until_settled(&controller);
    assert_eq!(second.as_str(), "success");

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].start_date, requests[1].start_date);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_malformed_body_fails_whole_batch() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new(vec![Ok(
        "ID,Date,Parameter/Paramètre\n05OJ005,2020-08-24 00:05:00,46\n".to_string(),
    )]));
    let controller = UpdateController::start(orchestrator(&store, source)).unwrap();

    controller.trigger();
    let status = wait_until_settled(&controller);

    assert_eq!(status.as_str(), "error");
    assert_eq!(store.count().unwrap(), 0);
}

// ---------------------------------------------------------------------------
// 4. Checkpoint progression
// ---------------------------------------------------------------------------

#[test]
fn test_checkpoint_advances_after_successful_cycle() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(csv(&[
            "05OJ005,2020-08-24 00:05:00,46,234.567,",
            "05OJ021,2020-08-24 00:15:00,46,231.004,",
        ])),
        Ok(csv(&[
            "05OJ021,2020-08-24 00:15:00,46,231.004,",
            "05OJ021,2020-08-24 00:20:00,46,231.010,",
        ])),
    ]));
    let orchestrator = orchestrator(&store, source.clone());

    let first = orchestrator.refresh().unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.latest_timestamp.as_deref(), Some("2020-08-24 00:15:00"));

    let second = orchestrator.refresh().unwrap();
    assert_eq!(second.mode, SyncMode::Incremental);
    assert_eq!(second.start_date, "2020-08-24 00:15:00");
    assert_eq!(second.received, 2);
    assert_eq!(second.inserted, 1, "boundary row is already stored");

    let requests = source.requests();
    assert!(requests[1].start_date >= requests[0].start_date);
    assert_eq!(store.count().unwrap(), 3);
}
