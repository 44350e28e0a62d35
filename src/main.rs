//! Hydrometric Sync Service - Main Binary
//!
//! Keeps a local PostgreSQL copy of real-time hydrometric observations in
//! step with the remote CSV service:
//! 1. Resolves the checkpoint from the newest stored reading
//! 2. Fetches the CSV window from the checkpoint to now
//! 3. Merges new rows without touching existing ones
//! 4. Serves update triggers, status and stored data over HTTP
//!
//! Usage:
//!   cargo run --release                              # Serve on the configured port
//!   cargo run --release -- --port 9000               # Override the port
//!   cargo run --release -- --sync-on-start           # Start an update immediately
//!   cargo run --release -- --sync-once               # Run one update and exit
//!   cargo run --release -- --config other.toml       # Use another config file
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string

use hydrosync_service::config::{self, DEFAULT_CONFIG_PATH};
use hydrosync_service::db;
use hydrosync_service::endpoint::{self, EndpointContext};
use hydrosync_service::ingest::wateroffice::HttpCsvSource;
use hydrosync_service::lifecycle::{TriggerOutcome, UpdateController};
use hydrosync_service::logging;
use hydrosync_service::store::{ObservationStore, PostgresStore};
use hydrosync_service::sync::SyncOrchestrator;
use log::{error, info};
use std::env;
use std::sync::Arc;

struct Options {
    config_path: String,
    port: Option<u16>,
    sync_on_start: bool,
    sync_once: bool,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--config PATH] [--port PORT] [--sync-on-start] [--sync-once]",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let program = args.first().map(String::as_str).unwrap_or("hydrosync_service");
    let mut options = Options {
        config_path: DEFAULT_CONFIG_PATH.to_string(),
        port: None,
        sync_on_start: false,
        sync_once: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| "--config requires a file path".to_string())?;
                options.config_path = path.clone();
                i += 2;
            }
            "--port" => {
                let port = args
                    .get(i + 1)
                    .ok_or_else(|| "--port requires a port number".to_string())?;
                options.port = Some(
                    port.parse()
                        .map_err(|_| format!("invalid port number: {}", port))?,
                );
                i += 2;
            }
            "--sync-on-start" => {
                options.sync_on_start = true;
                i += 1;
            }
            "--sync-once" => {
                options.sync_once = true;
                i += 1;
            }
            other => {
                return Err(format!("Unknown argument: {}\n{}", other, usage(program)));
            }
        }
    }

    Ok(options)
}

fn fail(message: String) -> ! {
    error!("{}", message);
    eprintln!("\n❌ {}\n", message);
    std::process::exit(1);
}

fn main() {
    println!("🌊 Hydrometric Sync Service");
    println!("===========================\n");

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let config = config::load_config_or_default(&options.config_path)
        .unwrap_or_else(|e| fail(format!("Configuration error: {}", e)));

    if let Err(e) = logging::init_logger(&config.logging.level, config.logging.file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(
        "Tracking {} stations x {} parameters from {}",
        config.sync.stations.len(),
        config.sync.parameters.len(),
        config.sync.base_url
    );

    // Store: connect and make sure the table exists. Existing rows are kept.
    let client = db::connect_with_validation()
        .unwrap_or_else(|e| fail(format!("Database connection failed: {}", e)));
    let store: Arc<dyn ObservationStore> = Arc::new(
        PostgresStore::open(client)
            .unwrap_or_else(|e| fail(format!("Schema initialization failed: {}", e))),
    );
    println!("✓ Database ready ({} stored observations)", store.count().unwrap_or(0));

    let source = HttpCsvSource::new(&config.sync)
        .unwrap_or_else(|e| fail(format!("HTTP client setup failed: {}", e)));
    let orchestrator = SyncOrchestrator::new(config.sync.clone(), Arc::clone(&store), Arc::new(source));

    if options.sync_once {
        match orchestrator.refresh() {
            Ok(report) => {
                println!("✓ {}", report.summary());
                return;
            }
            Err(e) => fail(format!("Update failed: {}", e)),
        }
    }

    let controller = Arc::new(
        UpdateController::start(orchestrator)
            .unwrap_or_else(|e| fail(format!("Failed to start sync worker: {}", e))),
    );

    if options.sync_on_start {
        match controller.trigger() {
            TriggerOutcome::Accepted => println!("📥 Initial update started"),
            outcome => fail(format!("Initial update not started: {:?}", outcome)),
        }
    }

    let port = options.port.unwrap_or(config.server.port);
    println!("🚀 Serving on http://0.0.0.0:{}", port);
    println!("   Press Ctrl+C to stop\n");

    let ctx = EndpointContext {
        store,
        controller,
        recent_parameters: config.sync.parameters.clone(),
    };

    if let Err(e) = endpoint::start_endpoint_server(port, config.server.worker_threads, ctx) {
        fail(format!("Endpoint server error: {}", e));
    }
}
