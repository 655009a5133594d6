//! hit 제출 인터페이스
//!
//! 수집 스테이지는 [`HitSender`]로 워치독에 hit을 제출합니다.
//! 제출 채널은 bounded이며, 가득 찼을 때의 동작은 [`DropPolicy`]가 결정합니다.
//!
//! - [`DropPolicy::Block`]: `submit`이 공간이 생길 때까지 대기 (역압)
//! - [`DropPolicy::DropNewest`]: 들어오지 못한 hit을 버리고 통계에 기록
//!
//! 종료 브로드캐스트 이후의 제출은 모두 [`WatchdogError::Stopped`]로 거부됩니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use netwatch_core::event::HitEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::clock::WatchClock;
use crate::config::DropPolicy;
use crate::error::WatchdogError;
use crate::stats::WatchdogStats;

/// 워치독 hit 제출 핸들
///
/// `Clone`으로 여러 생산자가 공유할 수 있습니다.
#[derive(Debug, Clone)]
pub struct HitSender {
    tx: mpsc::Sender<HitEvent>,
    policy: DropPolicy,
    clock: WatchClock,
    stats: Arc<WatchdogStats>,
    shutdown: CancellationToken,
}

impl HitSender {
    pub(crate) fn new(
        tx: mpsc::Sender<HitEvent>,
        policy: DropPolicy,
        clock: WatchClock,
        stats: Arc<WatchdogStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tx,
            policy,
            clock,
            stats,
            shutdown,
        }
    }

    /// 타임스탬프 `timestamp`의 hit을 제출합니다.
    ///
    /// `Block` 정책에서는 버퍼에 공간이 생기거나 종료가 브로드캐스트될 때까지 대기합니다.
    /// `DropNewest` 정책에서는 버퍼가 가득 차면 hit을 버리고
    /// [`WatchdogError::BufferFull`]을 반환합니다.
    pub async fn submit(&self, timestamp: DateTime<Utc>) -> Result<(), WatchdogError> {
        if self.shutdown.is_cancelled() {
            return Err(WatchdogError::Stopped);
        }

        match self.policy {
            DropPolicy::Block => {
                tokio::select! {
                    result = self.tx.send(HitEvent::at(timestamp)) => {
                        result.map_err(|_| WatchdogError::Stopped)
                    }
                    _ = self.shutdown.cancelled() => Err(WatchdogError::Stopped),
                }
            }
            DropPolicy::DropNewest => {
                let result = self.try_submit(timestamp);
                if matches!(result, Err(WatchdogError::BufferFull { .. })) {
                    self.stats.record_dropped();
                }
                result
            }
        }
    }

    /// 공유 시계의 현재 시각으로 hit을 제출합니다.
    pub async fn submit_now(&self) -> Result<(), WatchdogError> {
        self.submit(self.clock.now()).await
    }

    /// 대기하지 않고 hit 제출을 시도합니다.
    ///
    /// 버퍼가 가득 차면 정책과 무관하게 [`WatchdogError::BufferFull`]을 반환합니다.
    /// 이 경로의 실패는 드롭 통계에 기록되지 않습니다.
    pub fn try_submit(&self, timestamp: DateTime<Utc>) -> Result<(), WatchdogError> {
        if self.shutdown.is_cancelled() {
            return Err(WatchdogError::Stopped);
        }

        self.tx
            .try_send(HitEvent::at(timestamp))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => WatchdogError::BufferFull {
                    capacity: self.capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => WatchdogError::Stopped,
            })
    }

    /// 제출 채널 용량
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// 현재 버퍼에 대기 중인 hit 수
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// 적용 중인 드롭 정책
    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    /// 공유 시계
    pub fn clock(&self) -> WatchClock {
        self.clock
    }

    /// 워치독이 더 이상 hit을 받지 않는지 여부
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(
        capacity: usize,
        policy: DropPolicy,
    ) -> (HitSender, mpsc::Receiver<HitEvent>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let token = CancellationToken::new();
        let sender = HitSender::new(
            tx,
            policy,
            WatchClock::new(),
            Arc::new(WatchdogStats::new()),
            token.clone(),
        );
        (sender, rx, token)
    }

    #[tokio::test]
    async fn submit_delivers_hit() {
        let (sender, mut rx, _token) = sender(4, DropPolicy::Block);
        let t = Utc::now();

        sender.submit(t).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().timestamp, t);
    }

    #[tokio::test]
    async fn try_submit_reports_full_buffer() {
        let (sender, _rx, _token) = sender(1, DropPolicy::Block);

        sender.try_submit(Utc::now()).unwrap();
        let err = sender.try_submit(Utc::now()).unwrap_err();

        assert!(matches!(err, WatchdogError::BufferFull { capacity: 1 }));
        assert_eq!(sender.pending(), 1);
        assert_eq!(sender.stats.hits_dropped(), 0);
    }

    #[tokio::test]
    async fn drop_newest_counts_dropped_hits() {
        let (sender, _rx, _token) = sender(1, DropPolicy::DropNewest);

        sender.submit(Utc::now()).await.unwrap();
        let err = sender.submit(Utc::now()).await.unwrap_err();

        assert!(matches!(err, WatchdogError::BufferFull { .. }));
        assert_eq!(sender.stats.hits_dropped(), 1);
    }

    #[tokio::test]
    async fn blocked_submit_released_by_shutdown() {
        let (sender, _rx, token) = sender(1, DropPolicy::Block);
        sender.submit(Utc::now()).await.unwrap();

        let blocked = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.submit(Utc::now()).await })
        };
        tokio::task::yield_now().await;
        token.cancel();

        let result = blocked.await.unwrap();
        assert!(matches!(result, Err(WatchdogError::Stopped)));
    }

    #[tokio::test]
    async fn submit_after_receiver_dropped_is_stopped() {
        let (sender, rx, _token) = sender(4, DropPolicy::Block);
        drop(rx);

        assert!(sender.is_stopped());
        assert!(matches!(
            sender.submit(Utc::now()).await,
            Err(WatchdogError::Stopped)
        ));
        assert!(matches!(
            sender.try_submit(Utc::now()),
            Err(WatchdogError::Stopped)
        ));
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_stopped() {
        let (sender, _rx, token) = sender(4, DropPolicy::DropNewest);
        token.cancel();

        assert!(matches!(sender.submit_now().await, Err(WatchdogError::Stopped)));
    }
}
