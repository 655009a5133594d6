//! 워치독 에러 타입
//!
//! [`WatchdogError`]는 워치독 생성과 hit 제출 과정에서 발생하는 에러를 표현합니다.
//! `From<WatchdogError> for NetwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use netwatch_core::error::{ConfigError, NetwatchError, PipelineError};

/// 워치독 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// 설정 에러 (생성 시점에 거부됨)
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 제출 버퍼가 가득 참 (`try_submit` 또는 드롭 정책)
    #[error("submission buffer full: capacity {capacity}")]
    BufferFull {
        /// 제출 채널 용량
        capacity: usize,
    },

    /// 워치독이 이미 종료되어 hit을 받지 않음
    #[error("watchdog stopped, hit dropped")]
    Stopped,

    /// 명령 루프 태스크가 비정상 종료됨
    #[error("watchdog task failed: {0}")]
    Task(String),
}

impl From<WatchdogError> for NetwatchError {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::Config { field, reason } => {
                NetwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => NetwatchError::Pipeline(PipelineError::ChannelSend(other.to_string())),
        }
    }
}
