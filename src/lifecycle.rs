/// Background update lifecycle.
///
/// Refresh cycles run on one dedicated worker thread fed by a queue of
/// capacity one. The caller of `trigger` gets an answer straight away and
/// follows progress by polling `status`:
///
/// ```text
/// idle ──trigger──▶ updating ──ok──▶ success ─┐
///                      ▲      └─err─▶ error ──┤
///                      └────────trigger───────┘
/// ```
///
/// The `updating` check and the enqueue happen under the status lock, so at
/// most one cycle is queued or running at any time. The lock is only held
/// to read or replace the status value, never while a cycle runs.

use crate::sync::SyncOrchestrator;
use log::{error, info, warn};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

pub const UPDATING_MESSAGE: &str = "Updating data from remote source...";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Updating,
    Success(String),
    Error(String),
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Updating => "updating",
            SyncStatus::Success(_) => "success",
            SyncStatus::Error(_) => "error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SyncStatus::Idle => "",
            SyncStatus::Updating => UPDATING_MESSAGE,
            SyncStatus::Success(msg) | SyncStatus::Error(msg) => msg,
        }
    }

    pub fn is_updating(&self) -> bool {
        matches!(self, SyncStatus::Updating)
    }

    pub fn report(&self) -> StatusReport {
        StatusReport {
            status: self.as_str(),
            message: self.message().to_string(),
        }
    }
}

/// Wire form of a status: `{"status": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub message: String,
}

/// Answer to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A cycle was queued; status is now `updating`.
    Accepted,
    /// A cycle is already queued or running; nothing was changed.
    AlreadyUpdating,
    /// The worker thread is gone; status is now `error`.
    WorkerUnavailable,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

type SharedStatus = Arc<Mutex<SyncStatus>>;

fn lock_status(status: &Mutex<SyncStatus>) -> MutexGuard<'_, SyncStatus> {
    // The guarded value is always a complete status, so a poisoned lock
    // still holds something valid to read or replace.
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct UpdateController {
    status: SharedStatus,
    requests: SyncSender<()>,
    worker: Option<JoinHandle<()>>,
}

impl UpdateController {
    /// Starts the worker thread that will run `orchestrator` on demand.
    pub fn start(orchestrator: SyncOrchestrator) -> std::io::Result<Self> {
        let status: SharedStatus = Arc::new(Mutex::new(SyncStatus::Idle));
        let (requests, queue) = mpsc::sync_channel(1);

        let worker_status = Arc::clone(&status);
        let worker = thread::Builder::new()
            .name("sync-worker".to_string())
            .spawn(move || run_worker(orchestrator, queue, worker_status))?;

        Ok(Self {
            status,
            requests,
            worker: Some(worker),
        })
    }

    /// Requests a refresh cycle without waiting for it.
    pub fn trigger(&self) -> TriggerOutcome {
        let mut status = lock_status(&self.status);

        if status.is_updating() {
            warn!("Update requested while another update is in progress; ignoring");
            return TriggerOutcome::AlreadyUpdating;
        }

        match self.requests.try_send(()) {
            Ok(()) => {
                *status = SyncStatus::Updating;
                info!("Update accepted");
                TriggerOutcome::Accepted
            }
            Err(TrySendError::Full(())) => {
                warn!("Update queue full; ignoring trigger");
                TriggerOutcome::AlreadyUpdating
            }
            Err(TrySendError::Disconnected(())) => {
                error!("Update worker is not running");
                *status = SyncStatus::Error("Update failed: update worker is not running".to_string());
                TriggerOutcome::WorkerUnavailable
            }
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> SyncStatus {
        lock_status(&self.status).clone()
    }
}

impl Drop for UpdateController {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop once any running cycle is done.
        let (closed, _) = mpsc::sync_channel(1);
        drop(std::mem::replace(&mut self.requests, closed));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_worker(orchestrator: SyncOrchestrator, queue: Receiver<()>, status: SharedStatus) {
    while queue.recv().is_ok() {
        info!("Starting data update...");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| orchestrator.refresh()));

        let next = match outcome {
            Ok(Ok(report)) => {
                info!("Data update complete.");
                SyncStatus::Success(report.summary())
            }
            Ok(Err(e)) => {
                error!("Update error: {}", e);
                SyncStatus::Error(format!("Update failed: {}", e))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!("Update panicked: {}", msg);
                SyncStatus::Error(format!("Update failed: {}", msg))
            }
        };

        *lock_status(&status) = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
