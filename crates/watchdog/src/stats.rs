//! 워치독 통계
//!
//! 명령 루프가 매 명령 처리 후 갱신하는 원자적 카운터입니다.
//! 캐시와 `alerting` 플래그는 루프가 단독 소유하며, 외부에는 이 미러만 노출됩니다.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// 워치독 상태 미러
#[derive(Debug, Default)]
pub struct WatchdogStats {
    window_hits: AtomicUsize,
    alerting: AtomicBool,
    hits_received: AtomicU64,
    alerts_emitted: AtomicU64,
    recoveries_emitted: AtomicU64,
    undelivered: AtomicU64,
    hits_dropped: AtomicU64,
}

/// 특정 시점의 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// 현재 윈도우 내 hit 수
    pub window_hits: usize,
    /// 알림 상태 여부
    pub alerting: bool,
    /// 엔진이 받은 총 hit 수
    pub hits_received: u64,
    /// 발생한 알림 수
    pub alerts_emitted: u64,
    /// 발생한 복구 수
    pub recoveries_emitted: u64,
    /// 수신자가 없어 전달하지 못한 메시지 수
    pub undelivered: u64,
    /// 버퍼 포화로 드롭된 hit 수
    pub hits_dropped: u64,
}

impl WatchdogStats {
    /// 새 통계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_state(&self, window_hits: usize, alerting: bool) {
        self.window_hits.store(window_hits, Ordering::Relaxed);
        self.alerting.store(alerting, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.hits_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_alert(&self) {
        self.alerts_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovery(&self) {
        self.recoveries_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_undelivered(&self) {
        self.undelivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.hits_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// 현재 윈도우 내 hit 수
    pub fn window_hits(&self) -> usize {
        self.window_hits.load(Ordering::Relaxed)
    }

    /// 알림 상태 여부
    pub fn is_alerting(&self) -> bool {
        self.alerting.load(Ordering::Relaxed)
    }

    /// 엔진이 받은 총 hit 수
    pub fn hits_received(&self) -> u64 {
        self.hits_received.load(Ordering::Relaxed)
    }

    /// 버퍼 포화로 드롭된 hit 수
    pub fn hits_dropped(&self) -> u64 {
        self.hits_dropped.load(Ordering::Relaxed)
    }

    /// 현재 값의 스냅샷
    ///
    /// 필드별로 읽으므로 필드 간 일관성은 보장하지 않습니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            window_hits: self.window_hits(),
            alerting: self.is_alerting(),
            hits_received: self.hits_received(),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            recoveries_emitted: self.recoveries_emitted.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            hits_dropped: self.hits_dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stats_are_zero() {
        assert_eq!(WatchdogStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn counters_accumulate() {
        let stats = WatchdogStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_alert();
        stats.record_recovery();
        stats.record_undelivered();
        stats.record_dropped();
        stats.record_state(2, true);

        let snap = stats.snapshot();
        assert_eq!(snap.hits_received, 2);
        assert_eq!(snap.alerts_emitted, 1);
        assert_eq!(snap.recoveries_emitted, 1);
        assert_eq!(snap.undelivered, 1);
        assert_eq!(snap.hits_dropped, 1);
        assert_eq!(snap.window_hits, 2);
        assert!(snap.alerting);
    }

    #[test]
    fn snapshot_serializes_to_json_fields() {
        let stats = WatchdogStats::new();
        stats.record_state(7, false);
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"window_hits\":7"));
        assert!(json.contains("\"alerting\":false"));
    }
}
