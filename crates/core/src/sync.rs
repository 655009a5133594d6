//! 스테이지 동기화 프로토콜: 등록, 종료 브로드캐스트, 전체 조인
//!
//! [`SyncCoordinator`]는 프로세스 전역의 스테이지 생명주기 레지스트리입니다.
//!
//! # 프로토콜
//! ```text
//! register_routine() ──▶ spawn ──▶ ... ──▶ routine_done() (정확히 한 번)
//!
//! main: register(self) → 스테이지 등록/스폰 → routine_done(self)
//!       → wait_shutdown() → join_all()
//! ```
//!
//! - 스테이지를 스폰하기 **전에** `register_routine()`을 호출해야 합니다.
//! - 스테이지는 어떤 경로로 종료되든 정확히 한 번 해제되어야 합니다.
//!   [`RoutineGuard`]는 `Drop`에서 해제하므로 에러/abort 경로도 포함됩니다.
//! - `broadcast_shutdown()`은 멱등이며, 이미 발동된 뒤에 대기하는 스테이지도
//!   즉시 종료 신호를 관측합니다.
//!
//! # 활성(liveness) 의무
//! 종료 신호를 관측하지 못하는 스테이지(취소 경로가 없는 블로킹 I/O 등)가 하나라도 있으면
//! `join_all()`은 반환되지 않습니다. 코디네이터는 이를 강제할 수 없으므로,
//! 모든 스테이지는 자신의 대기 지점에서 종료 신호를 함께 기다려야 합니다.
//! 운영 환경에서는 [`SyncCoordinator::join_all_timeout`]으로 증상을 드러냅니다.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::SyncError;

struct Inner {
    /// 등록 후 아직 해제되지 않은 스테이지 수
    live: AtomicUsize,
    /// 일회성 종료 브로드캐스트
    shutdown: CancellationToken,
    /// 첫 발동 여부 (로그 중복 방지)
    fired: AtomicBool,
    /// live 카운트가 0이 될 때 조인 대기자를 깨움
    all_stopped: Notify,
}

/// 스테이지 생명주기 코디네이터
///
/// `Clone`은 같은 레지스트리를 공유하는 핸들을 만듭니다.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// 새 코디네이터를 생성합니다.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                live: AtomicUsize::new(0),
                shutdown: CancellationToken::new(),
                fired: AtomicBool::new(false),
                all_stopped: Notify::new(),
            }),
        }
    }

    /// 스테이지를 등록하고 해제 가드를 반환합니다.
    ///
    /// 스테이지를 스폰하기 전에 호출해야 합니다.
    pub fn register_routine(&self, name: impl Into<String>) -> RoutineGuard {
        let name = name.into();
        let live = self.inner.live.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(routine = %name, live, "routine registered");
        RoutineGuard {
            coordinator: self.clone(),
            name,
            released: false,
        }
    }

    /// 등록된 스테이지 하나를 해제합니다.
    ///
    /// 등록 수보다 많이 호출되면 [`SyncError::UnbalancedRelease`]를 반환하며
    /// 카운트는 0에 머뭅니다.
    pub fn routine_done(&self) -> Result<(), SyncError> {
        let prev = self
            .inner
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| SyncError::UnbalancedRelease)?;

        if prev == 1 {
            self.inner.all_stopped.notify_waiters();
        }
        Ok(())
    }

    /// 종료 신호를 발동합니다.
    ///
    /// 멱등입니다. 이번 호출이 최초 발동이면 `true`를 반환합니다.
    pub fn broadcast_shutdown(&self) -> bool {
        let first = !self.inner.fired.swap(true, Ordering::AcqRel);
        self.inner.shutdown.cancel();
        if first {
            info!(live = self.live_count(), "shutdown broadcast fired");
        }
        first
    }

    /// 종료 신호가 발동되었는지 확인합니다.
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// 종료 신호가 발동될 때까지 대기합니다.
    ///
    /// 이미 발동된 경우 즉시 반환합니다.
    pub async fn wait_shutdown(&self) {
        self.inner.shutdown.cancelled().await;
    }

    /// `tokio::select!`에서 소유권을 가지고 사용할 종료 토큰을 반환합니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// 현재 해제되지 않은 스테이지 수를 반환합니다.
    pub fn live_count(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// 등록된 모든 스테이지가 해제될 때까지 대기합니다.
    pub async fn join_all(&self) {
        loop {
            let notified = self.inner.all_stopped.notified();
            tokio::pin!(notified);
            // 카운트 확인 전에 대기자로 등록해야 notify_waiters()를 놓치지 않음
            notified.as_mut().enable();

            if self.live_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// 제한 시간 안에 모든 스테이지가 해제되기를 기다립니다.
    pub async fn join_all_timeout(&self, timeout: Duration) -> Result<(), SyncError> {
        tokio::time::timeout(timeout, self.join_all())
            .await
            .map_err(|_| SyncError::JoinTimeout {
                live: self.live_count(),
            })
    }

    /// 스테이지를 등록한 뒤 tokio 태스크로 스폰합니다.
    ///
    /// 태스크가 정상 종료, 에러 반환, abort 중 어느 경로로 끝나도 정확히 한 번 해제됩니다.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.register_routine(name);
        tokio::spawn(async move {
            let output = future.await;
            if let Err(e) = guard.release() {
                error!(error = %e, "stage release failed");
            }
            output
        })
    }
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("live", &self.live_count())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// 등록된 스테이지의 해제 가드
///
/// [`release`](Self::release)를 호출하거나 드롭되면 `routine_done()`을 정확히 한 번 호출합니다.
#[must_use = "dropping the guard releases the routine immediately"]
pub struct RoutineGuard {
    coordinator: SyncCoordinator,
    name: String,
    released: bool,
}

impl RoutineGuard {
    /// 스테이지 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 스테이지를 명시적으로 해제합니다.
    pub fn release(mut self) -> Result<(), SyncError> {
        self.released = true;
        debug!(routine = %self.name, "routine released");
        self.coordinator.routine_done()
    }
}

impl Drop for RoutineGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!(routine = %self.name, "routine released on drop");
        if let Err(e) = self.coordinator.routine_done() {
            error!(routine = %self.name, error = %e, "routine release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_release_balance() {
        let sync = SyncCoordinator::new();
        let a = sync.register_routine("a");
        let b = sync.register_routine("b");
        assert_eq!(sync.live_count(), 2);

        a.release().unwrap();
        drop(b);
        assert_eq!(sync.live_count(), 0);
    }

    #[test]
    fn extra_release_is_detected() {
        let sync = SyncCoordinator::new();
        let guard = sync.register_routine("only");
        guard.release().unwrap();

        assert_eq!(sync.routine_done(), Err(SyncError::UnbalancedRelease));
        assert_eq!(sync.live_count(), 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let sync = SyncCoordinator::new();
        assert!(!sync.is_shutdown());
        assert!(sync.broadcast_shutdown());
        assert!(!sync.broadcast_shutdown());
        assert!(sync.is_shutdown());
    }

    #[test]
    fn shutdown_before_any_registration_is_safe() {
        let sync = SyncCoordinator::new();
        sync.broadcast_shutdown();
        let guard = sync.register_routine("late");
        assert!(sync.shutdown_token().is_cancelled());
        guard.release().unwrap();
    }

    #[tokio::test]
    async fn late_subscriber_observes_fired_shutdown() {
        let sync = SyncCoordinator::new();
        sync.broadcast_shutdown();
        tokio::time::timeout(Duration::from_millis(100), sync.wait_shutdown())
            .await
            .expect("already-fired shutdown must not block");
    }

    #[tokio::test]
    async fn join_all_returns_immediately_when_nothing_registered() {
        let sync = SyncCoordinator::new();
        tokio::time::timeout(Duration::from_millis(100), sync.join_all())
            .await
            .expect("join with no routines must not block");
    }

    #[tokio::test]
    async fn join_all_waits_for_spawned_stages() {
        let sync = SyncCoordinator::new();
        for _ in 0..4 {
            let token = sync.shutdown_token();
            sync.spawn("worker", async move { token.cancelled().await });
        }
        assert_eq!(sync.live_count(), 4);

        assert!(
            sync.join_all_timeout(Duration::from_millis(50)).await.is_err(),
            "workers are still waiting for shutdown"
        );

        sync.broadcast_shutdown();
        sync.join_all_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(sync.live_count(), 0);
    }

    #[tokio::test]
    async fn aborted_stage_is_still_released() {
        let sync = SyncCoordinator::new();
        let handle = sync.spawn("stuck", std::future::pending::<()>());
        assert_eq!(sync.live_count(), 1);

        handle.abort();
        let _ = handle.await;
        sync.join_all_timeout(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn join_timeout_reports_live_count() {
        let sync = SyncCoordinator::new();
        let _guard = sync.register_routine("never-exits");
        let err = sync
            .join_all_timeout(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::JoinTimeout { live: 1 });
    }
}
