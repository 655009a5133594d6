//! 설정 관리: netwatch.toml 파싱 및 런타임 설정
//!
//! [`NetwatchConfig`]는 모든 스테이지의 설정을 담는 최상위 구조체입니다.
//! 생성 시점에 한 번 로드되며 이후에는 변경되지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`NETWATCH_WATCHDOG_ALERT_THRESHOLD=800` 형식)
//! 3. 설정 파일 (`netwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), netwatch_core::error::NetwatchError> {
//! use netwatch_core::config::NetwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = NetwatchConfig::load("netwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = NetwatchConfig::parse("[watchdog]\nalert_threshold = 50")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, NetwatchError};

/// netwatch 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 워치독(알림 엔진) 설정
    #[serde(default)]
    pub watchdog: WatchdogSection,
    /// 수집 스테이지 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// 표시 스테이지 설정
    #[serde(default)]
    pub display: DisplayConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl NetwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, NetwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, NetwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NetwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                NetwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, NetwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            NetwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `NETWATCH_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "NETWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "NETWATCH_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.log_file, "NETWATCH_GENERAL_LOG_FILE");
        override_u64(
            &mut self.general.shutdown_timeout_secs,
            "NETWATCH_GENERAL_SHUTDOWN_TIMEOUT_SECS",
        );

        // Watchdog
        override_u64(
            &mut self.watchdog.alert_span_secs,
            "NETWATCH_WATCHDOG_ALERT_SPAN_SECS",
        );
        override_usize(
            &mut self.watchdog.alert_threshold,
            "NETWATCH_WATCHDOG_ALERT_THRESHOLD",
        );
        override_u64(&mut self.watchdog.tick_millis, "NETWATCH_WATCHDOG_TICK_MILLIS");
        override_usize(&mut self.watchdog.buffer_size, "NETWATCH_WATCHDOG_BUFFER_SIZE");
        override_string(&mut self.watchdog.drop_policy, "NETWATCH_WATCHDOG_DROP_POLICY");

        // Collector
        override_bool(&mut self.collector.enabled, "NETWATCH_COLLECTOR_ENABLED");
        override_string(&mut self.collector.bind_addr, "NETWATCH_COLLECTOR_BIND_ADDR");
        override_string(
            &mut self.collector.payload_filter,
            "NETWATCH_COLLECTOR_PAYLOAD_FILTER",
        );

        // Display
        override_string(&mut self.display.format, "NETWATCH_DISPLAY_FORMAT");
        override_u64(&mut self.display.refresh_secs, "NETWATCH_DISPLAY_REFRESH_SECS");

        // Metrics
        override_bool(&mut self.metrics.enabled, "NETWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "NETWATCH_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "NETWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 워치독 수치(0 이하의 윈도우/임계값/tick/버퍼)는 여기서 거부되어
    /// 최초 사용 시점이 아닌 생성 시점에 실패합니다.
    pub fn validate(&self) -> Result<(), NetwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.watchdog.alert_span_secs == 0 {
            return Err(invalid("watchdog.alert_span_secs", "must be greater than 0"));
        }
        if self.watchdog.alert_threshold == 0 {
            return Err(invalid("watchdog.alert_threshold", "must be greater than 0"));
        }
        if self.watchdog.tick_millis == 0 {
            return Err(invalid("watchdog.tick_millis", "must be greater than 0"));
        }
        if self.watchdog.buffer_size == 0 {
            return Err(invalid("watchdog.buffer_size", "must be greater than 0"));
        }

        let valid_policies = ["block", "drop_newest"];
        if !valid_policies.contains(&self.watchdog.drop_policy.as_str()) {
            return Err(invalid(
                "watchdog.drop_policy",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }

        if self.collector.enabled {
            if self.collector.bind_addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(invalid(
                    "collector.bind_addr",
                    format!("'{}' is not a socket address", self.collector.bind_addr),
                ));
            }
            if self.collector.max_datagram_size == 0 {
                return Err(invalid(
                    "collector.max_datagram_size",
                    "must be greater than 0",
                ));
            }
        }

        let valid_display = ["plain", "json"];
        if !valid_display.contains(&self.display.format.as_str()) {
            return Err(invalid(
                "display.format",
                format!("must be one of: {}", valid_display.join(", ")),
            ));
        }
        if self.display.refresh_secs == 0 {
            return Err(invalid("display.refresh_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> NetwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 로그 파일 경로 (빈 문자열이면 stderr)
    pub log_file: String,
    /// 종료 시 모든 스테이지를 기다리는 최대 시간 (초, 0이면 무제한)
    pub shutdown_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            log_file: String::new(),
            shutdown_timeout_secs: 10,
        }
    }
}

/// 워치독 설정 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSection {
    /// 트레일링 윈도우 길이 (초, AlertSpan)
    pub alert_span_secs: u64,
    /// 알림을 발생시키는 윈도우 내 hit 수 (AlertThreshold)
    pub alert_threshold: usize,
    /// 만료 처리/재평가 주기 (밀리초, WatchdogTick)
    pub tick_millis: u64,
    /// hit 제출 채널 용량 (WatchdogBufSize)
    pub buffer_size: usize,
    /// 제출 버퍼가 가득 찼을 때의 정책 (block, drop_newest)
    pub drop_policy: String,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            alert_span_secs: 120,
            alert_threshold: 500,
            tick_millis: 1000,
            buffer_size: 256,
            drop_policy: "block".to_owned(),
        }
    }
}

/// 수집 스테이지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 미러링된 페이로드를 수신할 UDP 주소
    pub bind_addr: String,
    /// 페이로드에 이 문자열이 포함되면 hit으로 분류
    pub payload_filter: String,
    /// 최대 데이터그램 크기 (바이트)
    pub max_datagram_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: "127.0.0.1:9514".to_owned(),
            payload_filter: "HTTP".to_owned(),
            max_datagram_size: 65535,
        }
    }
}

/// 표시 스테이지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 출력 형식 (plain, json)
    pub format: String,
    /// 상태 줄 갱신 주기 (초)
    pub refresh_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            format: "plain".to_owned(),
            refresh_secs: 10,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스너 주소
    pub listen_addr: String,
    /// 리스너 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
