/// Logging setup behind the `log` facade
///
/// `env_logger` is the backend. Every line carries a UTC timestamp, the
/// level and the emitting module. Lines go to stderr, or are appended to the
/// configured log file instead. `RUST_LOG` overrides the configured level.

use chrono::Utc;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter};
use std::fs::OpenOptions;
use std::io::Write;

/// Formats a single log line.
pub fn format_entry(level: Level, target: &str, message: &str) -> String {
    format!(
        "{} {:<5} {}: {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        level,
        target,
        message
    )
}

/// Parses a configured level name. Unknown names fall back to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Logger builder for the configured level and optional file.
pub fn build_logger(level: &str, log_file: Option<&str>) -> std::io::Result<Builder> {
    let mut builder = Builder::new();
    builder
        .filter_level(parse_level(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_entry(record.level(), record.target(), &record.args().to_string())
            )
        });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    Ok(builder)
}

/// Installs the service logger as the global `log` backend.
pub fn init_logger(level: &str, log_file: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = build_logger(level, log_file)?;
    builder.parse_default_env().try_init()?;
    Ok(())
}
