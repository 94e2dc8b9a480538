//! # SIRA Client
//!
//! Client-side orchestration core for the SIRA (Self-Improving Reasoning
//! Agent) backend: query submission lifecycle, conversation tracking,
//! reasoning trace projection, and metrics polling.
//!
//! ## Components
//!
//! - **Submission controller**: `Idle -> Submitting -> Idle` state machine
//!   with per-submission request tokens. A completion whose token was
//!   superseded by a clear or timeout is discarded without mutating state.
//! - **Conversation store**: ordered, append-only turn log bound to at most
//!   one backend session; cleared atomically together with the binding.
//! - **Trace renderer**: pure projection of the latest response into an
//!   ordered, collapsible step list with identity-keyed toggle state.
//! - **Metrics poller**: independent periodic fetch with single-flight
//!   discipline and an explicit stop lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! user input -> SubmissionController -> SIRA backend (HTTP)
//!                      |
//!               ConversationStore + LatestResult -> TraceView -> UI
//!
//! MetricsPoller -> watch channel -> read-only dashboard
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use sira_client::{Config, SiraClient, SubmissionController};
//! use sira_client::controller::run_submission;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = SiraClient::new(&config.backend)?;
//!     let mut controller = SubmissionController::new(config.query.clone());
//!     run_submission(&mut controller, &client, "What is 2 + 2?").await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// HTTP client and wire types for the SIRA backend API.
pub mod api;
/// Configuration management.
pub mod config;
/// Query submission lifecycle state machine.
pub mod controller;
/// Conversation turn log and session binding.
pub mod conversation;
/// Error types and result aliases.
pub mod error;
/// Periodic metrics polling.
pub mod metrics;
/// Reasoning trace projection.
pub mod trace;

pub use api::SiraClient;
pub use config::Config;
pub use controller::SubmissionController;
pub use error::{AppError, AppResult};
