use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Lower bound for the query timeout ceiling.
pub const MIN_QUERY_TIMEOUT_MS: u64 = 60_000;
/// Upper bound for the query timeout ceiling.
pub const MAX_QUERY_TIMEOUT_MS: u64 = 300_000;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub query: QueryConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// SIRA backend endpoint configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Per-request timeout for short calls (metrics, health, session reads).
    pub request_timeout_ms: u64,
}

/// Query submission configuration
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Hard wall-clock ceiling for a query submission, enforced client-side.
    pub timeout_ms: u64,
    /// Elapsed time after which the UI shows a "taking longer than usual"
    /// advisory. Cosmetic only.
    pub slow_threshold_ms: u64,
}

/// Metrics poller configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub poll_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig {
            base_url: env::var("SIRA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
        };

        let query = QueryConfig {
            timeout_ms: env::var("QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_QUERY_TIMEOUT_MS)
                .clamp(MIN_QUERY_TIMEOUT_MS, MAX_QUERY_TIMEOUT_MS),
            slow_threshold_ms: env::var("SLOW_QUERY_THRESHOLD_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30_000),
        };

        let metrics = MetricsConfig {
            poll_interval_ms: env::var("METRICS_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            backend,
            query,
            metrics,
            logging,
        })
    }
}

impl QueryConfig {
    /// Timeout ceiling as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Slow-query advisory threshold as a [`Duration`].
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: MAX_QUERY_TIMEOUT_MS,
            slow_threshold_ms: 30_000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
        }
    }
}
