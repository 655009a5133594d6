//! 알림 엔진
//!
//! [`Watchdog`]은 [`TimeWindowCache`] 하나를 소유하고, 단일 명령 루프에서
//! 세 가지 이벤트를 직렬화해 처리합니다.
//!
//! - 종료 브로드캐스트: 루프 종료
//! - tick: 만료 처리 후 임계값 재평가
//! - hit 제출: 캐시에 추가 후 임계값 재평가
//!
//! 상태는 `Normal`/`Alerting` 두 가지이며, 임계값은 밴드가 아닌 경계입니다.
//! 경계 부근에서 진동하면 알림과 복구가 그대로 번갈아 발생합니다.
//! 상태 전이마다 정확히 한 번 [`AlertMessage`]를 보내고, 종료 시에는
//! 알림 중이더라도 복구 메시지를 보내지 않습니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), netwatch_watchdog::WatchdogError> {
//! use netwatch_core::SyncCoordinator;
//! use netwatch_watchdog::{WatchdogBuilder, WatchdogConfig};
//!
//! let sync = SyncCoordinator::new();
//! let (watchdog, alert_rx) = WatchdogBuilder::new()
//!     .config(WatchdogConfig::default())
//!     .build()?;
//! let _alert_rx = alert_rx.expect("internal alert channel");
//!
//! let handle = watchdog.spawn(&sync);
//! handle.hit_sender().submit_now().await?;
//!
//! sync.broadcast_shutdown();
//! handle.join().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use netwatch_core::event::{AlertMessage, HitEvent, STAGE_WATCHDOG};
use netwatch_core::sync::SyncCoordinator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cache::TimeWindowCache;
use crate::clock::WatchClock;
use crate::config::WatchdogConfig;
use crate::error::WatchdogError;
use crate::ingest::HitSender;
use crate::stats::WatchdogStats;

/// 내부 알림 채널 용량 (보류 중인 메시지 1개)
const ALERT_CHANNEL_CAPACITY: usize = 1;

/// 윈도우 상태와 임계값 판정
///
/// 명령 루프가 단독 소유하며 잠금 없이 변경됩니다.
#[derive(Debug)]
struct AlertState {
    cache: TimeWindowCache,
    alerting: bool,
    threshold: usize,
    span: std::time::Duration,
}

impl AlertState {
    fn new(config: &WatchdogConfig) -> Self {
        Self {
            cache: TimeWindowCache::new(),
            alerting: false,
            threshold: config.alert_threshold,
            span: config.alert_span,
        }
    }

    /// hit을 추가하고 재평가합니다. 전이 시각은 hit의 타임스탬프입니다.
    fn push(&mut self, timestamp: DateTime<Utc>) -> Option<AlertMessage> {
        self.cache.append(timestamp);
        self.verify(timestamp)
    }

    /// 만료 처리 후 재평가합니다.
    fn tick(&mut self, now: DateTime<Utc>) -> Option<AlertMessage> {
        self.cache.evict(now, self.span);
        self.verify(now)
    }

    fn verify(&mut self, now: DateTime<Utc>) -> Option<AlertMessage> {
        let size = self.cache.size();

        if self.cache.is_empty() || size < self.threshold {
            if self.alerting {
                self.alerting = false;
                return Some(AlertMessage::recovery(now));
            }
            return None;
        }

        if !self.alerting {
            self.alerting = true;
            return Some(AlertMessage::alert(size, now));
        }

        None
    }
}

/// 워치독 빌더
pub struct WatchdogBuilder {
    config: WatchdogConfig,
    alert_tx: Option<mpsc::Sender<AlertMessage>>,
    clock: Option<WatchClock>,
}

impl WatchdogBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: WatchdogConfig::default(),
            alert_tx: None,
            clock: None,
        }
    }

    /// 워치독 설정을 지정합니다.
    pub fn config(mut self, config: WatchdogConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 알림 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 용량 1의 채널을 새로 생성합니다.
    pub fn alert_sender(mut self, tx: mpsc::Sender<AlertMessage>) -> Self {
        self.alert_tx = Some(tx);
        self
    }

    /// 엔진과 생산자가 공유할 시계를 지정합니다.
    pub fn clock(mut self, clock: WatchClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 워치독을 빌드합니다.
    ///
    /// # Returns
    /// - `Watchdog`: 아직 실행되지 않은 엔진
    /// - `Option<mpsc::Receiver<AlertMessage>>`: 알림 수신 채널
    ///   (외부 alert_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(Watchdog, Option<mpsc::Receiver<AlertMessage>>), WatchdogError> {
        self.config.validate()?;

        let (alert_tx, alert_rx) = match self.alert_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(ALERT_CHANNEL_CAPACITY);
                (tx, Some(rx))
            }
        };

        let (push_tx, push_rx) = mpsc::channel(self.config.buffer_size);

        let watchdog = Watchdog {
            state: AlertState::new(&self.config),
            clock: self.clock.unwrap_or_default(),
            config: self.config,
            alert_tx,
            push_tx,
            push_rx,
            stats: Arc::new(WatchdogStats::new()),
        };

        Ok((watchdog, alert_rx))
    }
}

impl Default for WatchdogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 트래픽 급증 워치독
///
/// [`WatchdogBuilder`]로 생성하고 [`Watchdog::spawn`]으로 실행합니다.
pub struct Watchdog {
    config: WatchdogConfig,
    state: AlertState,
    clock: WatchClock,
    alert_tx: mpsc::Sender<AlertMessage>,
    push_tx: mpsc::Sender<HitEvent>,
    push_rx: mpsc::Receiver<HitEvent>,
    stats: Arc<WatchdogStats>,
}

impl Watchdog {
    /// 적용된 설정
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// 공유 시계
    pub fn clock(&self) -> WatchClock {
        self.clock
    }

    /// 상태 미러를 반환합니다. 실행 전후로 같은 인스턴스입니다.
    pub fn stats(&self) -> Arc<WatchdogStats> {
        Arc::clone(&self.stats)
    }

    /// 명령 루프를 코디네이터에 등록한 뒤 실행합니다.
    ///
    /// 등록은 태스크 생성 전에 이루어지며, 루프가 어떤 경로로 끝나든
    /// 정확히 한 번 해제됩니다.
    pub fn spawn(self, sync: &SyncCoordinator) -> WatchdogHandle {
        let guard = sync.register_routine(STAGE_WATCHDOG);
        let shutdown = sync.shutdown_token();

        let sender = HitSender::new(
            self.push_tx.clone(),
            self.config.drop_policy,
            self.clock,
            Arc::clone(&self.stats),
            shutdown.clone(),
        );
        let stats = Arc::clone(&self.stats);

        let task = tokio::spawn(async move {
            let _guard = guard;
            self.run(shutdown).await;
        });

        WatchdogHandle {
            sender,
            stats,
            task,
        }
    }

    async fn run(self, shutdown: CancellationToken) {
        let Self {
            config,
            mut state,
            clock,
            alert_tx,
            push_tx,
            mut push_rx,
            stats,
        } = self;
        // 루프가 끝나면 수신 채널이 닫혀 생산자가 Stopped를 받도록
        // 엔진 쪽 송신 핸들은 바로 놓습니다.
        drop(push_tx);

        // 알림 전송에서 지연된 뒤에는 밀린 tick을 재생하지 않고 현재 시각으로 한 번 평가
        let mut ticker = tokio::time::interval_at(Instant::now() + config.tick, config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut producers_open = true;

        loop {
            let transition = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => state.tick(clock.now()),
                received = push_rx.recv(), if producers_open => match received {
                    Some(hit) => {
                        stats.record_hit();
                        state.push(hit.timestamp)
                    }
                    None => {
                        producers_open = false;
                        None
                    }
                },
            };

            stats.record_state(state.cache.size(), state.alerting);

            if let Some(message) = transition {
                if message.is_recovery {
                    stats.record_recovery();
                } else {
                    stats.record_alert();
                }

                tokio::select! {
                    result = alert_tx.send(message) => {
                        if result.is_err() {
                            stats.record_undelivered();
                        }
                    }
                    _ = shutdown.cancelled() => {
                        stats.record_undelivered();
                        break;
                    }
                }
            }
        }
    }
}

/// 실행 중인 워치독 핸들
#[derive(Debug)]
pub struct WatchdogHandle {
    sender: HitSender,
    stats: Arc<WatchdogStats>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    /// hit 제출 핸들을 반환합니다.
    pub fn hit_sender(&self) -> HitSender {
        self.sender.clone()
    }

    /// 상태 미러를 반환합니다.
    pub fn stats(&self) -> Arc<WatchdogStats> {
        Arc::clone(&self.stats)
    }

    /// 명령 루프가 종료되었는지 여부
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 명령 루프 종료를 기다립니다.
    ///
    /// 종료 브로드캐스트 없이 호출하면 반환되지 않습니다.
    pub async fn join(self) -> Result<(), WatchdogError> {
        self.task
            .await
            .map_err(|e| WatchdogError::Task(e.to_string()))
    }
}
