//! HTTP client for the SIRA backend API.
//!
//! Wire shapes match the backend contract exactly: `POST /query`,
//! `GET /metrics/summary`, `GET /metrics/core?tier=...`,
//! `GET /session/{id}`, and `GET /health`.

mod client;
mod types;

pub use client::SiraClient;
pub use types::{
    HealthStatus, MetricsSnapshot, MetricsTier, QueryRequest, QueryResponse, ReasoningStep,
    ResponseMetadata, SessionInfo,
};
