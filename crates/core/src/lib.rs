//! netwatch 공통 크레이트
//!
//! 모든 스테이지가 공유하는 에러 타입, 설정, 이벤트 타입,
//! 그리고 스테이지 생명주기를 조율하는 [`SyncCoordinator`]를 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `netwatch.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 도메인 에러 타입
//! - [`event`]: [`HitEvent`], [`AlertMessage`]
//! - [`metrics`]: 메트릭 이름 상수
//! - [`sync`]: 등록/종료 브로드캐스트/조인 프로토콜

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod sync;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, NetwatchError, PipelineError, SyncError};

// 설정
pub use config::NetwatchConfig;

// 이벤트
pub use event::{AlertKind, AlertMessage, HitEvent};

// 동기화
pub use sync::{RoutineGuard, SyncCoordinator};
