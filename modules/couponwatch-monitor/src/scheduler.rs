use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use crate::monitor::Monitor;

/// Shared view of the polling loop for the status endpoint.
pub struct SchedulerStatus {
    pub started_at: DateTime<Utc>,
    last_tick: RwLock<Option<DateTime<Utc>>>,
    ticks: AtomicU64,
}

impl SchedulerStatus {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            last_tick: RwLock::new(None),
            ticks: AtomicU64::new(0),
        }
    }

    pub async fn record_tick(&self) {
        *self.last_tick.write().await = Some(Utc::now());
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.read().await
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the polling loop. Ticks run strictly sequentially inside the task;
/// a long tick simply delays the next one. Manual runs triggered through the
/// API may overlap a scheduled tick — the store's unique code constraint is
/// the only coordination between them.
pub fn start(
    monitor: Arc<Monitor>,
    interval: Duration,
    status: Arc<SchedulerStatus>,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting monitor polling loop");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // The first interval tick completes immediately; consume it so the
        // loop waits a full period before the first poll.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            status.record_tick().await;
            monitor.tick().await;
        }
    })
}
