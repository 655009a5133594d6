//! 에러 타입: 도메인별 에러 정의

/// netwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum NetwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인(스테이지 간 채널) 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스테이지 동기화 프로토콜 에러
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

/// 동기화 프로토콜 에러
///
/// [`SyncCoordinator`](crate::sync::SyncCoordinator)의 등록/해제 균형이 깨졌거나
/// 제한 시간 안에 모든 스테이지가 종료되지 않았을 때 발생합니다.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyncError {
    /// `register_routine()`보다 `routine_done()`이 더 많이 호출됨
    #[error("routine_done() called with no live routine registered")]
    UnbalancedRelease,

    /// `join_all_timeout()` 제한 시간 초과
    #[error("join timed out with {live} routine(s) still live")]
    JoinTimeout { live: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_netwatch_error() {
        let err: NetwatchError = ConfigError::InvalidValue {
            field: "watchdog.alert_threshold".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(err, NetwatchError::Config(_)));
        assert!(err.to_string().contains("alert_threshold"));
    }

    #[test]
    fn sync_error_display() {
        let err = SyncError::JoinTimeout { live: 3 };
        assert!(err.to_string().contains('3'));

        let err: NetwatchError = SyncError::UnbalancedRelease.into();
        assert!(err.to_string().contains("routine_done"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: NetwatchError = io.into();
        assert!(matches!(err, NetwatchError::Io(_)));
    }
}
