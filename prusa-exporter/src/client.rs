//! HTTP client for the printer's telemetry endpoint.

use std::time::Duration;

use tracing::{debug, warn};

use crate::telemetry::Telemetry;

/// Timeout for a single telemetry request.
pub const TELEMETRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the telemetry endpoint on the printer.
pub const TELEMETRY_PATH: &str = "/api/telemetry";

/// Error type for telemetry requests.
///
/// The variants only matter for logging; every one of them means the
/// printer is unavailable for this scrape.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {}s", TELEMETRY_TIMEOUT.as_secs())]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid telemetry payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result of polling the printer once.
#[derive(Debug, Clone, PartialEq)]
pub enum Scrape {
    Available(Telemetry),
    Unavailable,
}

impl Scrape {
    pub fn is_available(&self) -> bool {
        matches!(self, Scrape::Available(_))
    }
}

/// Client polling one printer.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    url: String,
}

impl TelemetryClient {
    /// Create a client for the printer at `hostname` (optionally `host:port`).
    pub fn new(hostname: &str) -> Result<Self, FetchError> {
        // Printers live on the local network; never route through a proxy.
        let http = reqwest::Client::builder()
            .timeout(TELEMETRY_TIMEOUT)
            .no_proxy()
            .build()?;

        Ok(Self {
            http,
            url: format!("http://{}{}", hostname, TELEMETRY_PATH),
        })
    }

    /// The telemetry URL this client polls.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Poll the printer once.
    ///
    /// Never fails: any error is logged and reported as [`Scrape::Unavailable`].
    pub async fn fetch(&self) -> Scrape {
        match self.try_fetch().await {
            Ok(telemetry) => Scrape::Available(telemetry),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Printer unavailable");
                Scrape::Unavailable
            }
        }
    }

    async fn try_fetch(&self) -> Result<Telemetry, FetchError> {
        let response = self.http.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        debug!(url = %self.url, payload = %body, "Received telemetry");

        Ok(Telemetry::from_json(&body)?)
    }
}
