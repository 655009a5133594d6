//! 이벤트 타입: 스테이지 간 통신의 기본 단위
//!
//! 수집 스테이지는 [`HitEvent`]를 워치독으로 보내고,
//! 워치독은 상태 전환이 일어날 때마다 [`AlertMessage`]를 표시 스테이지로 보냅니다.
//!
//! ```text
//! collector --HitEvent--> watchdog --AlertMessage--> display
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- 스테이지명 상수 ---

/// 메인(엔트리) 스테이지명
pub const STAGE_MAIN: &str = "main";
/// 워치독 스테이지명
pub const STAGE_WATCHDOG: &str = "watchdog";
/// 수집 스테이지명
pub const STAGE_COLLECTOR: &str = "collector";
/// 표시 스테이지명
pub const STAGE_DISPLAY: &str = "display";
/// 운영자 명령(시그널) 스테이지명
pub const STAGE_COMMAND: &str = "command";
/// 통계 발행 스테이지명
pub const STAGE_STATS: &str = "stats";

/// 알림 본문에 사용하는 시각 형식
pub const TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// 하나의 유효 관측(hit)을 표시하는 타임스탬프
///
/// 값 외의 식별자는 없으며, 같은 시각의 hit도 각각 독립적으로 집계됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HitEvent {
    /// 관측 시각
    pub timestamp: DateTime<Utc>,
}

impl HitEvent {
    /// 주어진 시각의 hit을 생성합니다.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }
}

impl From<DateTime<Utc>> for HitEvent {
    fn from(timestamp: DateTime<Utc>) -> Self {
        Self::at(timestamp)
    }
}

/// 알림 메시지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// 임계값 도달 (Normal → Alerting)
    Alert,
    /// 임계값 아래로 복구 (Alerting → Normal)
    Recovery,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

/// 워치독 상태 전환 메시지
///
/// 상태 전환마다 정확히 한 번 생성되며, 상태를 유지하는 tick에서는 생성되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    /// 복구 메시지 여부
    pub is_recovery: bool,
    /// 사람이 읽는 메시지 본문
    pub body: String,
    /// 전환 시각
    pub timestamp: DateTime<Utc>,
}

impl AlertMessage {
    /// 임계값 도달 알림을 생성합니다.
    pub fn alert(hits: usize, at: DateTime<Utc>) -> Self {
        Self {
            is_recovery: false,
            body: format!(
                "High traffic generated an alert - hits = {hits}, triggered at {}",
                at.format(TIME_LAYOUT)
            ),
            timestamp: at,
        }
    }

    /// 복구 알림을 생성합니다.
    pub fn recovery(at: DateTime<Utc>) -> Self {
        Self {
            is_recovery: true,
            body: format!("Traffic alert recovered at {}", at.format(TIME_LAYOUT)),
            timestamp: at,
        }
    }

    /// 메시지 종류를 반환합니다.
    pub fn kind(&self) -> AlertKind {
        if self.is_recovery {
            AlertKind::Recovery
        } else {
            AlertKind::Alert
        }
    }
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind(), self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn alert_body_contains_hits_and_time() {
        let msg = AlertMessage::alert(512, t0());
        assert!(!msg.is_recovery);
        assert_eq!(msg.kind(), AlertKind::Alert);
        assert!(msg.body.contains("hits = 512"));
        assert!(msg.body.contains("2024-03-01 12:00:00"));
        assert_eq!(msg.timestamp, t0());
    }

    #[test]
    fn recovery_body_contains_only_time() {
        let msg = AlertMessage::recovery(t0());
        assert!(msg.is_recovery);
        assert_eq!(msg.kind(), AlertKind::Recovery);
        assert!(msg.body.contains("2024-03-01 12:00:00"));
        assert!(!msg.body.contains("hits"));
    }

    #[test]
    fn display_prefixes_kind() {
        let msg = AlertMessage::recovery(t0());
        assert!(msg.to_string().starts_with("[recovery]"));
    }

    #[test]
    fn hit_events_order_by_timestamp() {
        let a = HitEvent::at(t0());
        let b = HitEvent::at(t0() + chrono::Duration::seconds(1));
        assert!(a < b);
        assert_eq!(a, HitEvent::from(t0()));
    }

    #[test]
    fn alert_message_serializes_to_json() {
        let msg = AlertMessage::alert(3, t0());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"is_recovery\":false"));
        let parsed: AlertMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }
}
