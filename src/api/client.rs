use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, error, info};

use super::types::{
    ErrorBody, HealthStatus, MetricsSnapshot, MetricsTier, QueryRequest, QueryResponse,
    SessionInfo,
};
use crate::config::BackendConfig;
use crate::error::{QueryError, QueryResult};

/// Client for the SIRA backend HTTP API
#[derive(Clone)]
pub struct SiraClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl SiraClient {
    /// Create a new client.
    ///
    /// The per-request timeout applies to short calls (metrics, health,
    /// session reads). Query submissions are NOT bounded here; the
    /// submission controller enforces its own wall-clock ceiling so the
    /// abort fires deterministically regardless of backend behavior.
    pub fn new(config: &BackendConfig) -> QueryResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| QueryError::NetworkUnreachable {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a query to the reasoning backend (`POST /query`).
    pub async fn submit_query(&self, request: &QueryRequest) -> QueryResult<QueryResponse> {
        let url = format!("{}/query", self.base_url);
        let start = Instant::now();

        debug!(
            session = ?request.session_id,
            query_len = request.query.len(),
            "Submitting query"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            // No reqwest deadline on this call; the submission ceiling is
            // enforced by the caller. Any transport failure here means no
            // response was obtained.
            .map_err(|e| QueryError::NetworkUnreachable {
                message: e.to_string(),
            })?;

        let parsed: QueryResponse = Self::read_json(response).await?;

        info!(
            session = %parsed.session_id,
            steps = parsed.reasoning_steps.len(),
            quality = parsed.metadata.quality_score,
            latency_ms = start.elapsed().as_millis(),
            "Query succeeded"
        );

        Ok(parsed)
    }

    /// Fetch the aggregate metrics summary (`GET /metrics/summary`).
    pub async fn metrics_summary(&self) -> QueryResult<MetricsSnapshot> {
        let url = format!("{}/metrics/summary", self.base_url);
        self.get_json(&url).await
    }

    /// Fetch tiered core metrics (`GET /metrics/core?tier=...`).
    pub async fn core_metrics(&self, tier: MetricsTier) -> QueryResult<MetricsSnapshot> {
        let url = format!("{}/metrics/core?tier={}", self.base_url, tier.as_str());
        self.get_json(&url).await
    }

    /// Fetch historical session data (`GET /session/{id}`).
    pub async fn get_session(&self, session_id: &str) -> QueryResult<SessionInfo> {
        let url = format!("{}/session/{}", self.base_url, session_id);
        self.get_json(&url).await
    }

    /// Liveness probe (`GET /health`).
    pub async fn health(&self) -> QueryResult<HealthStatus> {
        let url = format!("{}/health", self.base_url);
        self.get_json(&url).await
    }

    /// Short GET with the per-request deadline from [`BackendConfig`].
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> QueryResult<T> {
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(e, self.request_timeout.as_millis() as u64))?;

        Self::read_json(response).await
    }

    /// Turn an HTTP response into a parsed body or a classified error.
    ///
    /// An HTTP response was obtained at this point, so failures here are
    /// `Server` (non-2xx, message from `{error}`/`{detail}` when parseable)
    /// or `InvalidResponse` (2xx with a body that breaks the contract).
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> QueryResult<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = ErrorBody::message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown server error")
                    .to_string()
            });
            error!(status = status.as_u16(), message = %message, "Backend returned error");
            return Err(QueryError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| QueryError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

/// Classify a reqwest error from a short GET that produced no HTTP
/// response.
///
/// Transport conditions come first per the API contract: the per-request
/// deadline maps to `Timeout`, anything else without a response is
/// `NetworkUnreachable`.
fn classify_transport(e: reqwest::Error, timeout_ms: u64) -> QueryError {
    if e.is_timeout() {
        QueryError::Timeout { timeout_ms }
    } else {
        QueryError::NetworkUnreachable {
            message: e.to_string(),
        }
    }
}
