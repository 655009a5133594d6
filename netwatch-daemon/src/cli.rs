//! CLI argument definitions for netwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use netwatch_core::config::NetwatchConfig;

/// Live network-traffic watchdog.
///
/// Counts qualifying hits over a trailing window and raises an alert
/// when the count reaches the configured threshold.
#[derive(Parser, Debug)]
#[command(name = "netwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to netwatch.toml configuration file.
    ///
    /// When omitted, built-in defaults are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Override the alert threshold (hits inside the window).
    #[arg(long)]
    pub threshold: Option<usize>,

    /// Override the trailing window length in seconds.
    #[arg(long)]
    pub span_secs: Option<u64>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Resolve the effective configuration.
    ///
    /// Values are layered file (or defaults), then `NETWATCH_*` environment
    /// variables, then command-line flags, and the result is validated.
    pub async fn resolve_config(&self) -> Result<NetwatchConfig> {
        let mut config = match &self.config {
            Some(path) => NetwatchConfig::from_file(path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?,
            None => NetwatchConfig::default(),
        };
        config.apply_env_overrides();
        self.apply_overrides(&mut config);
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut NetwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(file) = &self.log_file {
            config.general.log_file = file.clone();
        }
        if let Some(threshold) = self.threshold {
            config.watchdog.alert_threshold = threshold;
        }
        if let Some(span) = self.span_secs {
            config.watchdog.alert_span_secs = span;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_without_arguments() {
        let cli = DaemonCli::try_parse_from(["netwatch-daemon"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_take_precedence() {
        let cli = DaemonCli::try_parse_from([
            "netwatch-daemon",
            "--config",
            "/tmp/netwatch.toml",
            "--threshold",
            "42",
            "--span-secs",
            "30",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/netwatch.toml")));

        let mut config = NetwatchConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.watchdog.alert_threshold, 42);
        assert_eq!(config.watchdog.alert_span_secs, 30);
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn rejects_non_numeric_threshold() {
        assert!(DaemonCli::try_parse_from(["netwatch-daemon", "--threshold", "many"]).is_err());
    }
}
