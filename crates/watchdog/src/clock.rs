//! 워치독 시계
//!
//! [`WatchClock`]은 생성 시점의 벽시계 시각을 `tokio::time::Instant`에 고정하고,
//! 이후 시각은 단조 시계의 경과 시간으로 계산합니다.
//! 엔진과 생산자가 같은 시간 기준을 공유하므로 벽시계가 뒤로 가더라도
//! 윈도우 순서가 깨지지 않고, `tokio::time::pause()` 테스트에서도 그대로 동작합니다.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// 단조 시계에 고정된 벽시계
#[derive(Debug, Clone, Copy)]
pub struct WatchClock {
    wall: DateTime<Utc>,
    anchor: Instant,
}

impl WatchClock {
    /// 현재 벽시계 시각과 현재 단조 시각으로 시계를 생성합니다.
    pub fn new() -> Self {
        Self::anchored(Utc::now(), Instant::now())
    }

    /// 지정한 벽시계 시각을 `anchor` 시점에 고정합니다.
    pub fn anchored(wall: DateTime<Utc>, anchor: Instant) -> Self {
        Self { wall, anchor }
    }

    /// 현재 시각
    pub fn now(&self) -> DateTime<Utc> {
        self.at(Instant::now())
    }

    /// 주어진 단조 시각에 해당하는 벽시계 시각
    ///
    /// 고정 시점 이전의 instant는 고정 시각으로 포화됩니다.
    pub fn at(&self, instant: Instant) -> DateTime<Utc> {
        let elapsed = instant.saturating_duration_since(self.anchor);
        TimeDelta::from_std(elapsed)
            .ok()
            .and_then(|delta| self.wall.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for WatchClock {
    fn default() -> Self {
        Self::new()
    }
}
