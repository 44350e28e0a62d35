/// PostgreSQL-backed observation store.
///
/// Readings land in `hydrometric.water_data`, keyed by
/// (station_id, reading_time, parameter_code). The schema is created once
/// when the store is opened and is never dropped afterwards; incremental
/// sync depends on history surviving between cycles.

use crate::model::Observation;
use crate::store::{ObservationStore, StoreError};
use postgres::{Client, Row};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = "
    CREATE SCHEMA IF NOT EXISTS hydrometric;

    CREATE TABLE IF NOT EXISTS hydrometric.water_data (
        station_id     TEXT NOT NULL,
        reading_time   TEXT NOT NULL,
        parameter_code TEXT NOT NULL,
        value          TEXT NOT NULL,
        PRIMARY KEY (station_id, reading_time, parameter_code)
    );

    CREATE INDEX IF NOT EXISTS water_data_reading_time_idx
        ON hydrometric.water_data (reading_time);
";

pub struct PostgresStore {
    client: Mutex<Client>,
}

impl PostgresStore {
    /// Wraps a connected client, creating the table on first use.
    pub fn open(mut client: Client) -> Result<Self, StoreError> {
        ensure_schema(&mut client)?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    fn client(&self) -> Result<MutexGuard<'_, Client>, StoreError> {
        self.client
            .lock()
            .map_err(|_| StoreError::Poisoned("postgres client"))
    }
}

/// Creates the observation table and its index if they do not exist.
pub fn ensure_schema(client: &mut Client) -> Result<(), StoreError> {
    client.batch_execute(SCHEMA_SQL)?;
    Ok(())
}

fn row_to_observation(row: &Row) -> Observation {
    Observation {
        station_id: row.get(0),
        timestamp: row.get(1),
        parameter_code: row.get(2),
        value: row.get(3),
    }
}

impl ObservationStore for PostgresStore {
    fn merge(&self, records: &[Observation]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut client = self.client()?;
        let mut tx = client.transaction()?;
        let insert = tx.prepare(
            "INSERT INTO hydrometric.water_data
             (station_id, reading_time, parameter_code, value)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (station_id, reading_time, parameter_code) DO NOTHING",
        )?;

        let mut inserted = 0;
        for record in records {
            let rows_affected = tx.execute(
                &insert,
                &[
                    &record.station_id,
                    &record.timestamp,
                    &record.parameter_code,
                    &record.value,
                ],
            )?;
            inserted += rows_affected as usize;
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn latest_timestamp(&self) -> Result<Option<String>, StoreError> {
        let row = self
            .client()?
            .query_one("SELECT MAX(reading_time) FROM hydrometric.water_data", &[])?;
        Ok(row.get(0))
    }

    fn earliest_timestamp(&self) -> Result<Option<String>, StoreError> {
        let row = self
            .client()?
            .query_one("SELECT MIN(reading_time) FROM hydrometric.water_data", &[])?;
        Ok(row.get(0))
    }

    fn count(&self) -> Result<u64, StoreError> {
        let row = self
            .client()?
            .query_one("SELECT COUNT(*) FROM hydrometric.water_data", &[])?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    fn query(
        &self,
        station: Option<&str>,
        parameter: Option<&str>,
    ) -> Result<Vec<Observation>, StoreError> {
        let rows = self.client()?.query(
            "SELECT station_id, reading_time, parameter_code, value
             FROM hydrometric.water_data
             WHERE ($1::TEXT IS NULL OR station_id = $1)
               AND ($2::TEXT IS NULL OR parameter_code = $2)
             ORDER BY reading_time ASC, station_id, parameter_code",
            &[&station, &parameter],
        )?;
        Ok(rows.iter().map(row_to_observation).collect())
    }

    fn range_query(
        &self,
        min_timestamp: &str,
        parameters: &[String],
    ) -> Result<Vec<Observation>, StoreError> {
        let rows = self.client()?.query(
            "SELECT station_id, reading_time, parameter_code, value
             FROM hydrometric.water_data
             WHERE reading_time >= $1
               AND parameter_code = ANY($2)
             ORDER BY reading_time ASC, station_id, parameter_code",
            &[&min_timestamp, &parameters],
        )?;
        Ok(rows.iter().map(row_to_observation).collect())
    }
}
