//! Timer-driven sync cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime, Timelike};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::sync::SyncOrchestrator;

pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    window_start: NaiveTime,
    window_end: NaiveTime,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let (window_start, window_end) = config.window()?;
        Ok(Self {
            orchestrator,
            interval: config.interval(),
            window_start,
            window_end,
        })
    }

    /// Run a cycle now and then every interval until `ctx` is cancelled.
    ///
    /// Ticks outside the sync window are skipped. A cycle in progress is
    /// abandoned on cancellation.
    pub async fn run(&self, ctx: CancellationToken) {
        log::info!(
            "[scheduler] Started: every {}s between {} and {}",
            self.interval.as_secs(),
            self.window_start.format("%H:%M"),
            self.window_end.format("%H:%M")
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    log::info!("[scheduler] Received shutdown signal, stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let now = Local::now().time();
                    if !in_window(now, self.window_start, self.window_end) {
                        log::debug!("[scheduler] {} is outside the sync window, skipping", now.format("%H:%M"));
                        continue;
                    }

                    tokio::select! {
                        _ = ctx.cancelled() => {
                            log::info!("[scheduler] Shutdown during sync cycle, abandoning it");
                            break;
                        }
                        outcome = self.orchestrator.run_sync_cycle() => {
                            if outcome.success {
                                log::info!("[scheduler] {}", outcome.message);
                            } else {
                                log::warn!("[scheduler] Cycle failed: {}", outcome.message);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Whether `now` falls in `[start, end]` at minute resolution. A window with
/// `start > end` spans midnight.
pub fn in_window(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    let now = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now);
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}
