//! Stats stage -- publishes watchdog state and daemon uptime as gauges.
//!
//! Only spawned when `[metrics] enabled = true`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use netwatch_core::SyncCoordinator;
use netwatch_core::metrics as m;
use netwatch_watchdog::WatchdogStats;

/// Gauge refresh cadence.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Publish gauges every `interval` until shutdown.
pub async fn run(
    stats: Arc<WatchdogStats>,
    sync: SyncCoordinator,
    start_time: Instant,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("stats publisher shutting down");
                break;
            }
            _ = ticker.tick() => publish(&stats, &sync, start_time),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn publish(stats: &WatchdogStats, sync: &SyncCoordinator, start_time: Instant) {
    let snapshot = stats.snapshot();

    metrics::gauge!(m::WATCHDOG_WINDOW_HITS).set(snapshot.window_hits as f64);
    metrics::gauge!(m::WATCHDOG_ALERTING).set(if snapshot.alerting { 1.0 } else { 0.0 });
    metrics::gauge!(m::WATCHDOG_UNDELIVERED).set(snapshot.undelivered as f64);
    metrics::gauge!(m::DAEMON_LIVE_STAGES).set(sync.live_count() as f64);
    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exits_on_shutdown() {
        let sync = SyncCoordinator::new();
        let token = sync.shutdown_token();
        let task = sync.spawn(
            "stats",
            run(
                Arc::new(WatchdogStats::new()),
                sync.clone(),
                Instant::now(),
                Duration::from_millis(10),
                token,
            ),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        sync.broadcast_shutdown();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("publisher should stop")
            .unwrap();
        assert_eq!(sync.live_count(), 0);
    }

    #[test]
    fn publish_without_recorder_is_noop() {
        publish(
            &WatchdogStats::new(),
            &SyncCoordinator::new(),
            Instant::now(),
        );
    }
}
