use serde::{Deserialize, Serialize};

/// Request body for `POST /query`
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub query: String,
    /// Existing session id; the backend creates a new session when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Response body for `POST /query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub session_id: String,
    #[serde(default)]
    pub reasoning_steps: Vec<ReasoningStep>,
    pub metadata: ResponseMetadata,
}

/// One unit of the backend's disclosed reasoning process.
///
/// Steps within a response are ordered by ascending `step_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_number: u32,
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

/// Processing metadata attached to a query response
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMetadata {
    pub quality_score: f64,
    #[serde(default)]
    pub patterns_retrieved_count: Option<u64>,
}

/// Aggregate metrics from `GET /metrics/summary` and `GET /metrics/core`.
///
/// Every field is independently absent-tolerant; the backend omits values
/// it has not yet computed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub total_queries: Option<u64>,
    #[serde(default)]
    pub avg_quality: Option<f64>,
    #[serde(default)]
    pub avg_latency_ms: Option<f64>,
    #[serde(default)]
    pub pattern_library_size: Option<u64>,
    #[serde(default)]
    pub pattern_reuse_rate: Option<f64>,
    #[serde(default)]
    pub cache_hit_rate: Option<f64>,
}

/// Tier filter for `GET /metrics/core`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsTier {
    Tier1,
    Tier2,
    Tier3,
    All,
}

impl MetricsTier {
    /// Query-string representation expected by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsTier::Tier1 => "tier1",
            MetricsTier::Tier2 => "tier2",
            MetricsTier::Tier3 => "tier3",
            MetricsTier::All => "all",
        }
    }
}

impl std::fmt::Display for MetricsTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response body for `GET /session/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: String,
    pub last_activity: String,
    #[serde(default)]
    pub query_count: u64,
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub llm_status: Option<String>,
    #[serde(default)]
    pub database_status: Option<String>,
}

/// Error body shape used by the backend: `{error}` or `{detail}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    /// Best-effort application error message from a response body.
    pub(crate) fn message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed.error.or(parsed.detail)
    }
}

impl QueryRequest {
    /// Create a request, trimming the query text.
    pub fn new(query: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            query: query.into().trim().to_string(),
            session_id,
        }
    }
}

impl ReasoningStep {
    /// Create a minimal step; optional fields start empty.
    pub fn new(step_number: u32, step_type: impl Into<String>) -> Self {
        Self {
            step_number,
            step_type: step_type.into(),
            description: None,
            reasoning: None,
            result: None,
            patterns_used: Vec::new(),
            quality_score: None,
        }
    }

    /// Set the human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the reasoning text.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Set the step result.
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Set the patterns consulted for this step.
    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns_used = patterns;
        self
    }

    /// Set the per-step quality score.
    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = Some(quality_score);
        self
    }
}
