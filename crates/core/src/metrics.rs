//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 워치독 엔진 자체는 메트릭을 기록하지 않으며, 데몬 스테이지가
//! 이 상수로 `metrics::counter!()`, `metrics::gauge!()`를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `netwatch_`
//! - 접미어: `_total` (counter), `_seconds` (시간), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 알림 종류 레이블 키 (alert, recovery)
pub const LABEL_KIND: &str = "kind";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// Collector: 수신한 데이터그램 수 (counter)
pub const COLLECTOR_DATAGRAMS_TOTAL: &str = "netwatch_collector_datagrams_total";

/// Collector: 워치독에 제출한 hit 수 (counter)
pub const COLLECTOR_HITS_SUBMITTED_TOTAL: &str = "netwatch_collector_hits_submitted_total";

/// Collector: 버퍼 포화로 드롭된 hit 수 (counter)
pub const COLLECTOR_HITS_DROPPED_TOTAL: &str = "netwatch_collector_hits_dropped_total";

// ─── 워치독 메트릭 ──────────────────────────────────────────────────

/// Watchdog: 현재 윈도우 내 hit 수 (gauge)
pub const WATCHDOG_WINDOW_HITS: &str = "netwatch_watchdog_window_hits";

/// Watchdog: 현재 알림 상태 (gauge, 1 = alerting)
pub const WATCHDOG_ALERTING: &str = "netwatch_watchdog_alerting";

/// Watchdog: 전달하지 못한 알림 메시지 수 (gauge)
pub const WATCHDOG_UNDELIVERED: &str = "netwatch_watchdog_undelivered_messages";

// ─── 표시 메트릭 ────────────────────────────────────────────────────

/// Display: 표시한 알림 메시지 수 (counter, label: kind)
pub const DISPLAY_MESSAGES_TOTAL: &str = "netwatch_display_messages_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "netwatch_daemon_uptime_seconds";

/// Daemon: 현재 살아있는 스테이지 수 (gauge)
pub const DAEMON_LIVE_STAGES: &str = "netwatch_daemon_live_stages";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "netwatch_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        COLLECTOR_DATAGRAMS_TOTAL,
        "Total datagrams received by the collector"
    );
    describe_counter!(
        COLLECTOR_HITS_SUBMITTED_TOTAL,
        "Qualifying hits submitted to the watchdog"
    );
    describe_counter!(
        COLLECTOR_HITS_DROPPED_TOTAL,
        "Hits dropped because the watchdog submission buffer was full"
    );

    describe_gauge!(WATCHDOG_WINDOW_HITS, "Hits inside the trailing alert window");
    describe_gauge!(WATCHDOG_ALERTING, "1 while the traffic alert is raised");
    describe_gauge!(
        WATCHDOG_UNDELIVERED,
        "Alert messages the watchdog could not deliver"
    );

    describe_counter!(
        DISPLAY_MESSAGES_TOTAL,
        "Alert and recovery messages rendered by the display stage"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_LIVE_STAGES, "Stages registered and not yet exited");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        for name in [
            COLLECTOR_DATAGRAMS_TOTAL,
            COLLECTOR_HITS_SUBMITTED_TOTAL,
            COLLECTOR_HITS_DROPPED_TOTAL,
            WATCHDOG_WINDOW_HITS,
            WATCHDOG_ALERTING,
            WATCHDOG_UNDELIVERED,
            DISPLAY_MESSAGES_TOTAL,
            DAEMON_UPTIME_SECONDS,
            DAEMON_LIVE_STAGES,
            DAEMON_BUILD_INFO,
        ] {
            assert!(name.starts_with("netwatch_"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_does_not_panic() {
        describe_all();
    }
}
