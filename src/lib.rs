/// hydrosync_service: incremental synchronizer for real-time hydrometric data.
///
/// # Module structure
///
/// ```text
/// hydrosync_service
/// ├── model      — shared data types (Observation, ObservationKey, constants)
/// ├── config     — service configuration loader (hydrosync.toml)
/// ├── logging    — env_logger setup for the log facade (stderr or a log file)
/// ├── db         — DATABASE_URL resolution and validated connection
/// ├── store
/// │   ├── memory   — ordered in-memory store for tests and development
/// │   └── postgres — PostgreSQL-backed store with idempotent merge
/// ├── ingest
/// │   ├── wateroffice — CSV URL construction and HTTP retrieval
/// │   ├── csv_parse   — header normalization and row extraction
/// │   └── fixtures (test only) — representative CSV bodies
/// ├── sync       — checkpoint resolution and one fetch/parse/merge cycle
/// ├── lifecycle  — background worker and shared update status
/// └── endpoint   — HTTP API for triggering updates and reading data
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod ingest;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod store;
pub mod sync;
