/// Core data types for the hydrometric sync service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O, only types and the timestamp format they agree on.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// Water Office parameter code for water level (primary sensor), in metres.
pub const PARAM_WATER_LEVEL: &str = "46";

/// Water Office parameter code for discharge (primary sensor), in m³/s.
pub const PARAM_DISCHARGE: &str = "47";

/// Parameter codes requested by the default deployment.
pub const DEFAULT_PARAMETERS: [&str; 4] = ["3", "6", PARAM_WATER_LEVEL, PARAM_DISCHARGE];

/// Stations monitored by the default deployment.
pub const DEFAULT_STATIONS: [&str; 3] = ["05OJ005", "05OJ021", "05OJ024"];

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Text format of fetch window boundaries and the default checkpoint.
///
/// Stored timestamps are whatever the remote service publishes; they are
/// compared as strings, which matches chronological order as long as the
/// service keeps a fixed-width, most-significant-first layout.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A single reading for one station, timestamp and parameter.
///
/// Corresponds to one data row of the real-time CSV feed. The value is kept
/// as published; nothing downstream interprets it numerically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "ID")]
    pub station_id: String,
    #[serde(rename = "Date")]
    pub timestamp: String,
    #[serde(rename = "Parameter")]
    pub parameter_code: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Observation {
    pub fn new(
        station_id: impl Into<String>,
        timestamp: impl Into<String>,
        parameter_code: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp: timestamp.into(),
            parameter_code: parameter_code.into(),
            value: value.into(),
        }
    }

    /// The uniqueness key of this observation.
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            timestamp: self.timestamp.clone(),
            station_id: self.station_id.clone(),
            parameter_code: self.parameter_code.clone(),
        }
    }
}

/// Composite key: at most one observation per station, time and parameter.
///
/// Field order puts the timestamp first so that ordered collections of keys
/// iterate in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservationKey {
    pub timestamp: String,
    pub station_id: String,
    pub parameter_code: String,
}
