//! Periodic metrics polling with single-flight discipline and an explicit
//! start/stop lifecycle.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::{MetricsSnapshot, SiraClient};
use crate::config::MetricsConfig;

/// Read-only metrics state for display.
///
/// `snapshot` is the last successfully fetched snapshot; it survives fetch
/// failures so the dashboard keeps showing known-good values. `fetch_error`
/// is the transient indicator for the most recent failed tick and resets on
/// the next success.
#[derive(Debug, Clone, Default)]
pub struct MetricsDisplay {
    pub snapshot: Option<MetricsSnapshot>,
    pub fetch_error: Option<String>,
}

/// Periodic metrics fetcher.
///
/// Fetches immediately on spawn, then on a fixed interval. Each fetch is
/// awaited inline and missed ticks are skipped, so at most one metrics
/// request is outstanding no matter how slow the backend is. A failed
/// fetch never terminates the loop.
pub struct MetricsPoller;

/// Handle to a running poller. Dropping the handle does not stop the
/// poller; call [`PollerHandle::stop`] when the owning view is torn down.
pub struct PollerHandle {
    task: JoinHandle<()>,
    receiver: watch::Receiver<MetricsDisplay>,
}

impl MetricsPoller {
    /// Start polling on a background task.
    pub fn spawn(client: SiraClient, config: MetricsConfig) -> PollerHandle {
        let (sender, receiver) = watch::channel(MetricsDisplay::default());
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        let task = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            // Ticks that fire while a fetch is still outstanding are
            // coalesced, never queued.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // First tick completes immediately.
                ticker.tick().await;

                match client.metrics_summary().await {
                    Ok(snapshot) => {
                        debug!(
                            total_queries = ?snapshot.total_queries,
                            "Metrics fetched"
                        );
                        sender.send_modify(|display| {
                            display.snapshot = Some(snapshot);
                            display.fetch_error = None;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Metrics fetch failed, keeping last snapshot");
                        sender.send_modify(|display| {
                            display.fetch_error = Some(e.to_string());
                        });
                    }
                }
            }
        });

        PollerHandle { task, receiver }
    }
}

impl PollerHandle {
    /// Subscribe to metrics updates.
    pub fn subscribe(&self) -> watch::Receiver<MetricsDisplay> {
        self.receiver.clone()
    }

    /// The most recently published display state.
    pub fn latest(&self) -> MetricsDisplay {
        self.receiver.borrow().clone()
    }

    /// Whether the polling task is still alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling.
    ///
    /// Aborts the task, which drops any outstanding fetch; no further
    /// ticks fire and no callback can mutate state after teardown.
    pub fn stop(self) {
        self.task.abort();
    }
}
