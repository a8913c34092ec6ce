//! HTTP snapshot source
//!
//! Calls the aggregation endpoint with `POST {"playerId": ...}` and maps the
//! outcome onto [`FetchError`]:
//!
//! | Outcome | Result |
//! |---|---|
//! | 2xx with a snapshot body | `Ok(Snapshot)` (normalized) |
//! | 2xx with `{"error": "..."}` | `ServerError` |
//! | 2xx with `null` / empty body | `ServerError("No dashboard data returned")` |
//! | 404 | `NotFound` |
//! | 408, 504, or the request timeout elapsing | `Timeout` |
//! | any other status, or an undecodable body | `ServerError` |
//! | connection / transport failure | `Network` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::SnapshotSource;
use crate::snapshot::{normalize, RawDashboard, Snapshot};
use crate::types::{FetchError, SubjectId};

/// Message used when the endpoint answers successfully without any data
pub const NO_DATA_MESSAGE: &str = "No dashboard data returned";

/// Aggregator client configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Aggregation endpoint URL
    pub url: String,
    /// Optional API key (bearer token and `apikey` header)
    pub api_key: Option<String>,
    /// Upper bound on one fetch, connect included
    pub request_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321/functions/v1/player-dashboard".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Production [`SnapshotSource`] backed by reqwest
pub struct HttpSnapshotSource {
    config: AggregatorConfig,
    http_client: reqwest::Client,
}

impl HttpSnapshotSource {
    pub fn new(config: AggregatorConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("sideline/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    async fn request(&self, subject: &SubjectId) -> Result<Snapshot, FetchError> {
        let mut request = self
            .http_client
            .post(&self.config.url)
            .json(&json!({ "playerId": subject.as_str() }));

        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;

        interpret_response(status, &body, subject, Utc::now())
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self, subject: &SubjectId) -> Result<Snapshot, FetchError> {
        let started = Instant::now();

        let result = match tokio::time::timeout(self.config.request_timeout, self.request(subject))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "no response within {} ms",
                self.config.request_timeout.as_millis()
            ))),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(subject = %subject, elapsed_ms, "Dashboard snapshot fetched"),
            Err(e) => warn!(
                subject = %subject,
                elapsed_ms,
                kind = e.kind(),
                error = %e,
                "Dashboard fetch failed"
            ),
        }

        result
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

/// Map a status code and body onto a normalized snapshot or a typed error
pub fn interpret_response(
    status: u16,
    body: &[u8],
    subject: &SubjectId,
    fetched_at: DateTime<Utc>,
) -> Result<Snapshot, FetchError> {
    match status {
        404 => return Err(FetchError::NotFound(format!("player {}", subject))),
        408 | 504 => return Err(FetchError::Timeout(format!("HTTP {}", status))),
        200..=299 => {}
        _ => {
            let detail = serde_json::from_slice::<RawDashboard>(body)
                .ok()
                .and_then(|raw| raw.error_message().map(str::to_string));
            return Err(FetchError::ServerError(match detail {
                Some(msg) => format!("HTTP {}: {}", status, msg),
                None => format!("HTTP {}", status),
            }));
        }
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::ServerError(NO_DATA_MESSAGE.to_string()));
    }

    let raw = serde_json::from_slice::<Option<RawDashboard>>(body)
        .map_err(|e| FetchError::ServerError(format!("Invalid dashboard payload: {}", e)))?
        .ok_or_else(|| FetchError::ServerError(NO_DATA_MESSAGE.to_string()))?;

    if let Some(msg) = raw.error_message() {
        return Err(FetchError::ServerError(msg.to_string()));
    }

    Ok(normalize(raw, subject, fetched_at))
}
