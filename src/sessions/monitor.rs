//! Heartbeat monitor.
//!
//! Recurring sweep over the session registry. Sessions whose heartbeat is
//! overdue are flagged (logged and reported, never removed); sessions idle
//! past the retention threshold are evicted regardless of handshake or
//! heartbeat state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::SessionRegistry;

/// Events published by the monitor for interested subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Evicted {
        session_id: String,
        agent_id: String,
    },
}

/// Outcome of a single sweep iteration.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub flagged: Vec<String>,
    pub evicted: Vec<String>,
}

pub struct HeartbeatMonitor {
    registry: Arc<SessionRegistry>,
    /// Sessions already reported as timed out, to avoid re-logging every
    /// sweep. A session that recovers is eligible for flagging again.
    flagged: HashSet<String>,
    events: broadcast::Sender<SessionEvent>,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<SessionRegistry>) -> (Self, broadcast::Receiver<SessionEvent>) {
        let (events, receiver) = broadcast::channel(64);
        (
            Self {
                registry,
                flagged: HashSet::new(),
                events,
            },
            receiver,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run one sweep against the given clock. Each record is handled
    /// independently; one bad record never aborts the rest of the sweep.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> SweepReport {
        let idle_retention_ms = self.registry.policy().idle_retention.as_millis() as i64;
        let snapshots = self.registry.list_all(now);

        let mut report = SweepReport {
            scanned: snapshots.len(),
            ..Default::default()
        };

        for snapshot in snapshots {
            if snapshot.idle_time_ms > idle_retention_ms {
                if self.registry.remove(&snapshot.session_id) {
                    info!(
                        "Evicting session {} (agent {}): idle for {}ms",
                        snapshot.session_id, snapshot.agent_id, snapshot.idle_time_ms
                    );
                    self.flagged.remove(&snapshot.session_id);
                    report.evicted.push(snapshot.session_id.clone());
                    let _ = self.events.send(SessionEvent::Evicted {
                        session_id: snapshot.session_id,
                        agent_id: snapshot.agent_id,
                    });
                } else {
                    warn!(
                        "Session {} disappeared during sweep, skipping",
                        snapshot.session_id
                    );
                }
                continue;
            }

            if snapshot.heartbeat_timed_out {
                if self.flagged.insert(snapshot.session_id.clone()) {
                    warn!(
                        "Session {} (agent {}) missed its heartbeat window",
                        snapshot.session_id, snapshot.agent_id
                    );
                    report.flagged.push(snapshot.session_id);
                }
            } else {
                self.flagged.remove(&snapshot.session_id);
            }
        }

        report
    }

    /// Main monitor loop. Sweeps at the given interval until shutdown.
    pub async fn run(mut self, sweep_interval: Duration, shutdown_token: CancellationToken) {
        info!(
            "Starting heartbeat monitor, sweeping every {:?}",
            sweep_interval
        );
        let mut ticker = tokio::time::interval(sweep_interval);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep(Utc::now());
                    if !report.flagged.is_empty() || !report.evicted.is_empty() {
                        debug!(
                            "Sweep scanned {} sessions: {} flagged, {} evicted",
                            report.scanned,
                            report.flagged.len(),
                            report.evicted.len()
                        );
                    }
                }
                _ = shutdown_token.cancelled() => {
                    info!("Heartbeat monitor received shutdown signal");
                    break;
                }
            }
        }

        info!("Heartbeat monitor stopped");
    }
}
