/// Water Office real-time CSV service client.
///
/// Handles URL construction and retrieval for the inline CSV endpoint:
///   https://wateroffice.ec.gc.ca/services/real_time_data/csv/inline
///
/// Stations and parameters are passed as repeated `stations[]` and
/// `parameters[]` query values; the window is given by `start_date` and
/// `end_date` in `YYYY-MM-DD HH:MM:SS` (UTC).

use crate::config::SyncConfig;
use log::debug;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} from {url}")]
    Status { url: String, status: u16 },
}

/// One remote request: what to ask for and over which window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub stations: Vec<String>,
    pub parameters: Vec<String>,
    /// Inclusive lower bound (the checkpoint).
    pub start_date: String,
    /// Upper bound, current UTC time at cycle start.
    pub end_date: String,
}

/// Anything that can produce raw CSV text for a request.
pub trait CsvSource: Send + Sync {
    fn fetch_csv(&self, request: &FetchRequest) -> Result<String, FetchError>;
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

/// Builds the request URL for the given stations, parameters and window.
///
/// # Example
/// ```
/// use hydrosync_service::ingest::wateroffice::build_csv_url;
///
/// let url = build_csv_url(
///     "https://wateroffice.ec.gc.ca/services/real_time_data/csv/inline",
///     &["05OJ005".to_string()],
///     &["46".to_string()],
///     "2020-08-24 00:00:00",
///     "2020-08-25 00:00:00",
/// );
/// assert!(url.contains("stations[]=05OJ005"));
/// ```
pub fn build_csv_url(
    base_url: &str,
    stations: &[String],
    parameters: &[String],
    start_date: &str,
    end_date: &str,
) -> String {
    let mut query: Vec<String> = Vec::with_capacity(stations.len() + parameters.len() + 2);

    for station in stations {
        query.push(format!("stations[]={}", urlencoding::encode(station)));
    }
    for parameter in parameters {
        query.push(format!("parameters[]={}", urlencoding::encode(parameter)));
    }
    query.push(format!("start_date={}", urlencoding::encode(start_date)));
    query.push(format!("end_date={}", urlencoding::encode(end_date)));

    format!("{}?{}", base_url, query.join("&"))
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Blocking HTTP client for the real-time CSV endpoint.
pub struct HttpCsvSource {
    client: reqwest::blocking::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCsvSource {
    pub fn new(config: &SyncConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("hydrosync_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
        })
    }

    fn transport_error(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

impl CsvSource for HttpCsvSource {
    fn fetch_csv(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let url = build_csv_url(
            &self.base_url,
            &request.stations,
            &request.parameters,
            &request.start_date,
            &request.end_date,
        );

        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "text/csv")
            .send()
            .map_err(|e| self.transport_error(&url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response.text().map_err(|e| self.transport_error(&url, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
