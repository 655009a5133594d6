//! 워치독 설정
//!
//! [`WatchdogConfig`]는 core의 [`WatchdogSection`](netwatch_core::config::WatchdogSection)을
//! 기반으로 워치독이 사용하는 형태(`Duration`, [`DropPolicy`])로 변환한 설정입니다.
//! 생성 후에는 변경되지 않습니다.
//!
//! # 사용 예시
//! ```
//! use std::time::Duration;
//! use netwatch_watchdog::config::WatchdogConfigBuilder;
//!
//! let config = WatchdogConfigBuilder::new()
//!     .alert_span(Duration::from_secs(60))
//!     .alert_threshold(100)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.alert_threshold, 100);
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WatchdogError;

/// 최대 윈도우 길이 (1일)
const MAX_ALERT_SPAN: Duration = Duration::from_secs(86_400);
/// 최대 제출 채널 용량
const MAX_BUFFER_SIZE: usize = 1_000_000;

/// 제출 버퍼가 가득 찼을 때의 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// 생산자가 공간이 생길 때까지 대기 (기본값, 역압 전파)
    #[default]
    Block,
    /// 들어오지 못한 hit을 드롭하고 카운트
    DropNewest,
}

impl FromStr for DropPolicy {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "drop_newest" => Ok(Self::DropNewest),
            other => Err(WatchdogError::Config {
                field: "drop_policy".to_owned(),
                reason: format!("unknown policy '{other}', expected 'block' or 'drop_newest'"),
            }),
        }
    }
}

/// 워치독 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// 트레일링 윈도우 길이 (AlertSpan)
    pub alert_span: Duration,
    /// 알림을 발생시키는 윈도우 내 hit 수
    pub alert_threshold: usize,
    /// 만료 처리/재평가 주기
    pub tick: Duration,
    /// hit 제출 채널 용량
    pub buffer_size: usize,
    /// 버퍼 포화 시 정책
    pub drop_policy: DropPolicy,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            alert_span: Duration::from_secs(120),
            alert_threshold: 500,
            tick: Duration::from_secs(1),
            buffer_size: 256,
            drop_policy: DropPolicy::Block,
        }
    }
}

impl WatchdogConfig {
    /// core의 `WatchdogSection`에서 워치독 설정을 생성합니다.
    pub fn from_core(
        core: &netwatch_core::config::WatchdogSection,
    ) -> Result<Self, WatchdogError> {
        let config = Self {
            alert_span: Duration::from_secs(core.alert_span_secs),
            alert_threshold: core.alert_threshold,
            tick: Duration::from_millis(core.tick_millis),
            buffer_size: core.buffer_size,
            drop_policy: core.drop_policy.parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 0 윈도우, 0 임계값, 0 tick, 0 버퍼는 모두 거부됩니다.
    pub fn validate(&self) -> Result<(), WatchdogError> {
        if self.alert_span.is_zero() || self.alert_span > MAX_ALERT_SPAN {
            return Err(WatchdogError::Config {
                field: "alert_span".to_owned(),
                reason: format!("must be between 1ns and {}s", MAX_ALERT_SPAN.as_secs()),
            });
        }

        if self.alert_threshold == 0 {
            return Err(WatchdogError::Config {
                field: "alert_threshold".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.tick.is_zero() {
            return Err(WatchdogError::Config {
                field: "tick".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(WatchdogError::Config {
                field: "buffer_size".to_owned(),
                reason: format!("must be 1-{MAX_BUFFER_SIZE}"),
            });
        }

        Ok(())
    }
}

/// 워치독 설정 빌더
#[derive(Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 윈도우 길이를 설정합니다.
    pub fn alert_span(mut self, span: Duration) -> Self {
        self.config.alert_span = span;
        self
    }

    /// 알림 임계값을 설정합니다.
    pub fn alert_threshold(mut self, threshold: usize) -> Self {
        self.config.alert_threshold = threshold;
        self
    }

    /// tick 주기를 설정합니다.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// 제출 채널 용량을 설정합니다.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// 버퍼 포화 정책을 설정합니다.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.config.drop_policy = policy;
        self
    }

    /// 설정을 빌드합니다. 유효성 검증을 수행합니다.
    pub fn build(self) -> Result<WatchdogConfig, WatchdogError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        WatchdogConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_converts_units() {
        let core = netwatch_core::config::WatchdogSection {
            alert_span_secs: 30,
            alert_threshold: 7,
            tick_millis: 250,
            buffer_size: 64,
            drop_policy: "drop_newest".to_owned(),
        };
        let config = WatchdogConfig::from_core(&core).unwrap();
        assert_eq!(config.alert_span, Duration::from_secs(30));
        assert_eq!(config.tick, Duration::from_millis(250));
        assert_eq!(config.alert_threshold, 7);
        assert_eq!(config.buffer_size, 64);
        assert_eq!(config.drop_policy, DropPolicy::DropNewest);
    }

    #[test]
    fn from_core_rejects_unknown_policy() {
        let core = netwatch_core::config::WatchdogSection {
            drop_policy: "drop_everything".to_owned(),
            ..Default::default()
        };
        let err = WatchdogConfig::from_core(&core).unwrap_err();
        assert!(err.to_string().contains("drop_policy"));
    }

    #[test]
    fn builder_rejects_zero_span() {
        let err = WatchdogConfigBuilder::new()
            .alert_span(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("alert_span"));
    }

    #[test]
    fn builder_rejects_zero_threshold() {
        let err = WatchdogConfigBuilder::new()
            .alert_threshold(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("alert_threshold"));
    }

    #[test]
    fn builder_rejects_zero_tick() {
        assert!(WatchdogConfigBuilder::new().tick(Duration::ZERO).build().is_err());
    }

    #[test]
    fn builder_rejects_zero_and_huge_buffer() {
        assert!(WatchdogConfigBuilder::new().buffer_size(0).build().is_err());
        assert!(
            WatchdogConfigBuilder::new()
                .buffer_size(MAX_BUFFER_SIZE + 1)
                .build()
                .is_err()
        );
    }

    #[test]
    fn builder_rejects_span_over_one_day() {
        assert!(
            WatchdogConfigBuilder::new()
                .alert_span(Duration::from_secs(86_401))
                .build()
                .is_err()
        );
    }

    #[test]
    fn drop_policy_parses() {
        assert_eq!("block".parse::<DropPolicy>().unwrap(), DropPolicy::Block);
        assert_eq!(
            "drop_newest".parse::<DropPolicy>().unwrap(),
            DropPolicy::DropNewest
        );
        assert!("oldest".parse::<DropPolicy>().is_err());
    }
}
