//! netwatch 트래픽 급증 워치독
//!
//! 트레일링 시간 윈도우 안의 hit 수가 임계값에 도달하면 알림을,
//! 임계값 아래로 내려가면 복구 메시지를 발생시킵니다.
//!
//! # 구성
//!
//! - [`cache`]: 만료 순서로 정렬된 hit 타임스탬프 캐시
//! - [`clock`]: 단조 시계에 고정된 벽시계
//! - [`config`]: 윈도우/임계값/tick/버퍼 설정
//! - [`engine`]: 단일 명령 루프 상태 기계와 빌더
//! - [`ingest`]: bounded hit 제출 인터페이스
//! - [`stats`]: 명령 루프가 갱신하는 상태 미러
//!
//! 엔진은 로그와 메트릭을 직접 기록하지 않습니다. 관측은
//! [`WatchdogStats`]와 알림 채널을 통해 데몬 스테이지가 담당합니다.

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod stats;

pub use cache::TimeWindowCache;
pub use clock::WatchClock;
pub use config::{DropPolicy, WatchdogConfig, WatchdogConfigBuilder};
pub use engine::{Watchdog, WatchdogBuilder, WatchdogHandle};
pub use error::WatchdogError;
pub use ingest::HitSender;
pub use stats::{StatsSnapshot, WatchdogStats};
