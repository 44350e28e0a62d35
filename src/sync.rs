/// Incremental synchronization of the observation store with the remote feed.
///
/// One refresh cycle:
/// 1. Resolve the checkpoint (latest stored timestamp, or the configured
///    historical start when the store is empty)
/// 2. Fetch CSV for the window `[checkpoint, now UTC]`
/// 3. Parse the CSV into observations
/// 4. Merge them into the store
///
/// Any step can fail and abort the cycle. Merging is additive and skips
/// known keys, so a failed cycle is retried simply by running another one:
/// at worst it re-merges rows that are already stored.

use crate::config::SyncConfig;
use crate::ingest::csv_parse::{self, ParseError};
use crate::ingest::wateroffice::{CsvSource, FetchError, FetchRequest};
use crate::model::TIMESTAMP_FORMAT;
use crate::store::{ObservationStore, StoreError};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Whether a cycle starts from stored history or from the historical start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Store is empty; fetch everything since the configured start.
    Full,
    /// Resume from the latest stored timestamp.
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Inclusive lower bound of the next fetch window.
    pub timestamp: String,
    pub mode: SyncMode,
}

/// Latest stored timestamp, or `default_start` for an empty store.
pub fn resolve_checkpoint(
    store: &dyn ObservationStore,
    default_start: &str,
) -> Result<Checkpoint, StoreError> {
    Ok(match store.latest_timestamp()? {
        Some(timestamp) => Checkpoint {
            timestamp,
            mode: SyncMode::Incremental,
        },
        None => Checkpoint {
            timestamp: default_start.to_string(),
            mode: SyncMode::Full,
        },
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of one successful refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub start_date: String,
    pub end_date: String,
    /// Rows read from the remote response.
    pub received: usize,
    /// Rows that were new to the store.
    pub inserted: usize,
    /// Latest stored timestamp after the merge.
    pub latest_timestamp: Option<String>,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "Update complete. {} new observations ({} received) for {} to {}.",
            self.inserted, self.received, self.start_date, self.end_date
        )
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct SyncOrchestrator {
    config: SyncConfig,
    store: Arc<dyn ObservationStore>,
    source: Arc<dyn CsvSource>,
    clock: Clock,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn ObservationStore>,
        source: Arc<dyn CsvSource>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            clock: Box::new(Utc::now),
        }
    }

    /// Replaces the wall clock used for the window's upper bound.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObservationStore> {
        &self.store
    }

    /// Where the next cycle would start.
    pub fn checkpoint(&self) -> Result<Checkpoint, StoreError> {
        resolve_checkpoint(self.store.as_ref(), &self.config.default_start)
    }

    /// Runs one complete fetch-parse-merge cycle.
    pub fn refresh(&self) -> Result<SyncReport, SyncError> {
        let checkpoint = self.checkpoint()?;
        let end_date = (self.clock)().format(TIMESTAMP_FORMAT).to_string();

        info!(
            "Starting {} sync from {} to {}",
            match checkpoint.mode {
                SyncMode::Full => "full",
                SyncMode::Incremental => "incremental",
            },
            checkpoint.timestamp,
            end_date
        );

        let request = FetchRequest {
            stations: self.config.stations.clone(),
            parameters: self.config.parameters.clone(),
            start_date: checkpoint.timestamp.clone(),
            end_date: end_date.clone(),
        };

        let body = self.source.fetch_csv(&request)?;
        debug!("Received {} bytes of CSV", body.len());

        let observations = csv_parse::parse_csv(&body)?;
        let inserted = self.store.merge(&observations)?;
        let latest_timestamp = self.store.latest_timestamp()?;

        let report = SyncReport {
            mode: checkpoint.mode,
            start_date: checkpoint.timestamp,
            end_date,
            received: observations.len(),
            inserted,
            latest_timestamp,
        };

        info!(
            "Sync complete: {} new observations ({} received), latest {}",
            report.inserted,
            report.received,
            report.latest_timestamp.as_deref().unwrap_or("none")
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
