/// In-process observation store.
///
/// Keys live in a `BTreeMap` ordered timestamp-first, so iteration order is
/// already the ascending-by-date order every query returns. One mutex guards
/// the map; a merge holds it for the whole batch.

use crate::model::{Observation, ObservationKey};
use crate::store::{ObservationStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<ObservationKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`, duplicates ignored.
    pub fn with_observations(records: &[Observation]) -> Self {
        let mut rows = BTreeMap::new();
        for record in records {
            rows.entry(record.key()).or_insert_with(|| record.value.clone());
        }
        Self {
            rows: Mutex::new(rows),
        }
    }

    fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<ObservationKey, String>>, StoreError> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Poisoned("memory store rows"))
    }
}

fn to_observation(key: &ObservationKey, value: &str) -> Observation {
    Observation {
        station_id: key.station_id.clone(),
        timestamp: key.timestamp.clone(),
        parameter_code: key.parameter_code.clone(),
        value: value.to_string(),
    }
}

impl ObservationStore for MemoryStore {
    fn merge(&self, records: &[Observation]) -> Result<usize, StoreError> {
        let mut rows = self.rows()?;
        let mut inserted = 0;

        for record in records {
            if let std::collections::btree_map::Entry::Vacant(slot) = rows.entry(record.key()) {
                slot.insert(record.value.clone());
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    fn latest_timestamp(&self) -> Result<Option<String>, StoreError> {
        Ok(self.rows()?.keys().next_back().map(|k| k.timestamp.clone()))
    }

    fn earliest_timestamp(&self) -> Result<Option<String>, StoreError> {
        Ok(self.rows()?.keys().next().map(|k| k.timestamp.clone()))
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.rows()?.len() as u64)
    }

    fn query(
        &self,
        station: Option<&str>,
        parameter: Option<&str>,
    ) -> Result<Vec<Observation>, StoreError> {
        let rows = self.rows()?;
        Ok(rows
            .iter()
            .filter(|(k, _)| station.is_none_or(|s| k.station_id == s))
            .filter(|(k, _)| parameter.is_none_or(|p| k.parameter_code == p))
            .map(|(k, v)| to_observation(k, v))
            .collect())
    }

    fn range_query(
        &self,
        min_timestamp: &str,
        parameters: &[String],
    ) -> Result<Vec<Observation>, StoreError> {
        let rows = self.rows()?;
        let lower = ObservationKey {
            timestamp: min_timestamp.to_string(),
            station_id: String::new(),
            parameter_code: String::new(),
        };

        Ok(rows
            .range(lower..)
            .filter(|(k, _)| parameters.iter().any(|p| *p == k.parameter_code))
            .map(|(k, v)| to_observation(k, v))
            .collect())
    }
}
