/// Observation store: a deduplicating, append-only table of readings.
///
/// Two backends share the `ObservationStore` interface:
/// - `postgres::PostgresStore`: the persistent store used by the service
/// - `memory::MemoryStore`: in-process store for development and tests
///
/// Writes only ever add rows. A record whose (station, timestamp, parameter)
/// key is already present is skipped, so merging the same batch twice leaves
/// the store exactly as a single merge would.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use self::postgres::PostgresStore;

use crate::model::Observation;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] ::postgres::Error),

    #[error("Store lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Row count and date span, for summary displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub count: u64,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

pub trait ObservationStore: Send + Sync {
    /// Inserts every record whose key is not yet stored and returns how many
    /// rows were added. Existing keys, and repeats within `records`, are
    /// ignored. Either all new rows of the call become visible or none do.
    fn merge(&self, records: &[Observation]) -> Result<usize, StoreError>;

    /// Greatest stored timestamp, `None` when the store is empty.
    fn latest_timestamp(&self) -> Result<Option<String>, StoreError>;

    /// Smallest stored timestamp, `None` when the store is empty.
    fn earliest_timestamp(&self) -> Result<Option<String>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    /// Observations matching the optional station and parameter filters,
    /// ascending by timestamp.
    fn query(
        &self,
        station: Option<&str>,
        parameter: Option<&str>,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Observations at or after `min_timestamp` whose parameter is in
    /// `parameters`, ascending by timestamp.
    fn range_query(
        &self,
        min_timestamp: &str,
        parameters: &[String],
    ) -> Result<Vec<Observation>, StoreError>;

    fn summary(&self) -> Result<StoreSummary, StoreError> {
        Ok(StoreSummary {
            count: self.count()?,
            min_date: self.earliest_timestamp()?,
            max_date: self.latest_timestamp()?,
        })
    }
}
