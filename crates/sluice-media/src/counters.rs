//! Diagnostic counters — packets refused by direction policy and packets
//! tail-dropped by a full receive queue.
//!
//! One `TrackCounters` is shared (via `Arc`) by every track that should be
//! reported together. Counters never drive control flow; they are logged
//! periodically by [`spawn_reporter`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sluice_core::config::DiagnosticsConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct TrackCounters {
    bad_direction: AtomicU64,
    queue_full: AtomicU64,
    // Totals at the time of the last report. Read and replaced under one
    // lock so concurrent reporters never see totals move backwards.
    reported: Mutex<CounterSnapshot>,
}

/// Point-in-time totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bad_direction: u64,
    pub queue_full: u64,
}

impl TrackCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A media packet was sent or received against the track's direction.
    pub fn record_bad_direction(&self) {
        self.bad_direction.fetch_add(1, Ordering::Relaxed);
    }

    /// An incoming packet was dropped because the receive queue was full.
    pub fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            bad_direction: self.bad_direction.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
        }
    }

    /// Log whatever was counted since the previous call. Returns the deltas.
    pub fn log_stats(&self) -> CounterSnapshot {
        let (now, delta) = {
            let mut reported = self.reported.lock();
            let now = self.snapshot();
            let delta = CounterSnapshot {
                bad_direction: now.bad_direction.saturating_sub(reported.bad_direction),
                queue_full: now.queue_full.saturating_sub(reported.queue_full),
            };
            *reported = now;
            (now, delta)
        };

        if delta.bad_direction > 0 {
            tracing::warn!(
                count = delta.bad_direction,
                total = now.bad_direction,
                "media packets sent in invalid directions"
            );
        }
        if delta.queue_full > 0 {
            tracing::warn!(
                count = delta.queue_full,
                total = now.queue_full,
                "media packets dropped due to a full queue"
            );
        }
        delta
    }
}

/// Log counter deltas every `interval` until `shutdown` fires.
pub fn spawn_reporter(
    counters: Arc<TrackCounters>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    counters.log_stats();
                    tracing::debug!("counter reporter shutting down");
                    return;
                }

                _ = ticker.tick() => {
                    counters.log_stats();
                }
            }
        }
    })
}

/// Start a reporter at the configured interval. `None` when reporting is
/// disabled (`report_interval_secs = 0`).
pub fn spawn_configured_reporter(
    counters: Arc<TrackCounters>,
    config: &DiagnosticsConfig,
    shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    let Some(interval) = config.report_interval() else {
        tracing::debug!("counter reporting disabled");
        return None;
    };
    Some(spawn_reporter(counters, interval, shutdown))
}
