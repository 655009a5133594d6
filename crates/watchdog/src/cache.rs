//! 시간 윈도우 hit 캐시
//!
//! [`TimeWindowCache`]는 트레일링 윈도우 안에 남아 있는 hit 타임스탬프를
//! 삽입 순서(시간 순서)대로 보관합니다. 만료는 앞쪽에서만 잘라내며,
//! 처음으로 윈도우 안에 있는 원소를 만나면 중단합니다.
//!
//! 캐시는 워치독 명령 루프만 소유하므로 잠금이 필요 없습니다.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// 트레일링 윈도우 hit 캐시
#[derive(Debug, Default)]
pub struct TimeWindowCache {
    hits: VecDeque<DateTime<Utc>>,
    count: usize,
}

impl TimeWindowCache {
    /// 빈 캐시를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지정한 용량을 미리 확보한 빈 캐시를 생성합니다.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hits: VecDeque::with_capacity(capacity),
            count: 0,
        }
    }

    /// hit을 꼬리에 추가합니다. O(1)
    pub fn append(&mut self, timestamp: DateTime<Utc>) {
        self.hits.push_back(timestamp);
        self.count += 1;
    }

    /// `now - hit > window`인 hit을 앞에서부터 제거하고 제거한 개수를 반환합니다.
    ///
    /// 나이가 정확히 `window`인 hit은 남습니다.
    pub fn evict(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        let mut evicted = 0;

        while let Some(&oldest) = self.hits.front() {
            if now.signed_duration_since(oldest) <= window {
                break;
            }
            self.hits.pop_front();
            evicted += 1;
        }

        self.count -= evicted;
        debug_assert_eq!(self.count, self.hits.len());
        evicted
    }

    /// 현재 hit 수. O(1)
    pub fn size(&self) -> usize {
        self.count
    }

    /// 캐시가 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 가장 오래된 hit
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.hits.front().copied()
    }

    /// 가장 최근 hit
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.hits.back().copied()
    }

    /// 모든 hit을 제거합니다.
    pub fn clear(&mut self) {
        self.hits.clear();
        self.count = 0;
    }
}
