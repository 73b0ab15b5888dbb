//! Fixed-interval cycle scheduler for `--loop` mode

use super::cycle::IngestionCycle;
use std::future::Future;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed: u64,
    pub failed: u64,
}

/// Run `cycle` every `every` until `shutdown` resolves
///
/// The first cycle starts immediately. A cycle in progress is never
/// interrupted, so its ingestion log row is always written; shutdown is
/// observed between cycles. A failed cycle is logged and the schedule
/// continues. Cycles that overrun the interval delay the next tick instead
/// of bunching up.
pub async fn run_scheduled<F>(cycle: &IngestionCycle, every: Duration, shutdown: F) -> SchedulerStats
where
    F: Future<Output = ()>,
{
    log::info!("⏰ Starting cycle scheduler (interval: {}s)", every.as_secs());

    let mut timer = interval(every);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = SchedulerStats::default();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("🛑 Shutdown requested, stopping scheduler");
                break;
            }
            _ = timer.tick() => {}
        }

        match cycle.run_once().await {
            Ok(_) => stats.completed += 1,
            Err(e) => {
                stats.failed += 1;
                log::error!("❌ Cycle failed: {}", e);
            }
        }
    }

    log::info!(
        "📊 Scheduler stopped: {} cycles completed, {} failed",
        stats.completed,
        stats.failed
    );
    stats
}
