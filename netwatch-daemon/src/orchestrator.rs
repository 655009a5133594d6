//! Stage orchestration -- assembly, channel wiring, and the termination protocol.
//!
//! The [`Orchestrator`] builds every stage from a validated
//! [`NetwatchConfig`] and runs them under one [`SyncCoordinator`].
//!
//! # Startup
//!
//! 1. The entry stage registers itself
//! 2. Watchdog (registered by [`Watchdog::spawn`] before its task starts)
//! 3. Display
//! 4. Stats publisher (when metrics are enabled)
//! 5. Collector (when enabled; its socket is bound during `build`)
//! 6. Signal stage
//!
//! # Shutdown
//!
//! The entry stage releases itself once every stage is spawned, waits for the
//! shutdown broadcast, then joins every stage. With
//! `general.shutdown_timeout_secs > 0` the join is bounded and a stage that
//! never observes shutdown is reported as an error instead of hanging.

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;

use netwatch_core::{NetwatchError, SyncCoordinator};
use netwatch_core::config::NetwatchConfig;
use netwatch_core::event::{
    AlertMessage, STAGE_COLLECTOR, STAGE_COMMAND, STAGE_DISPLAY, STAGE_MAIN, STAGE_STATS,
};
use netwatch_watchdog::{StatsSnapshot, Watchdog, WatchdogBuilder, WatchdogConfig};

use crate::metrics_server;
use crate::stages::collector::CollectorStage;
use crate::stages::display::{DisplayFormat, DisplayStage};
use crate::stages::{signal, stats};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: NetwatchConfig,
    /// Stage lifecycle registry shared by every stage.
    sync: SyncCoordinator,
    /// Built but not yet running watchdog.
    watchdog: Watchdog,
    /// Alert channel consumed by the display stage.
    alert_rx: mpsc::Receiver<AlertMessage>,
    /// Collector with its socket already bound.
    collector: Option<CollectorStage>,
    display_format: DisplayFormat,
    display_writer: Box<dyn Write + Send>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any enabled stage fails to initialize
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = NetwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: NetwatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        let watchdog_config = WatchdogConfig::from_core(&config.watchdog)
            .map_err(|e| anyhow::anyhow!("invalid watchdog config: {}", e))?;
        let (watchdog, alert_rx) = WatchdogBuilder::new()
            .config(watchdog_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build watchdog: {}", e))?;
        let alert_rx =
            alert_rx.ok_or_else(|| anyhow::anyhow!("watchdog did not create an alert channel"))?;

        tracing::info!(
            span_secs = config.watchdog.alert_span_secs,
            threshold = config.watchdog.alert_threshold,
            drop_policy = %config.watchdog.drop_policy,
            "watchdog initialized"
        );

        let collector = if config.collector.enabled {
            Some(CollectorStage::bind(&config.collector).await?)
        } else {
            tracing::info!("collector disabled");
            None
        };

        let display_format = config.display.format.parse()?;

        Ok(Self {
            config,
            sync: SyncCoordinator::new(),
            watchdog,
            alert_rx,
            collector,
            display_format,
            display_writer: Box::new(std::io::stdout()),
            start_time: Instant::now(),
        })
    }

    /// Send display output to `writer` instead of stdout.
    pub fn with_display_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.display_writer = Box::new(writer);
        self
    }

    /// The coordinator shared by every stage.
    pub fn sync(&self) -> SyncCoordinator {
        self.sync.clone()
    }

    /// Address the collector is bound to, if enabled.
    pub fn collector_addr(&self) -> Option<SocketAddr> {
        self.collector
            .as_ref()
            .and_then(|collector| collector.local_addr().ok())
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &NetwatchConfig {
        &self.config
    }

    /// Run every stage until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<StatsSnapshot> {
        self.run_until(signal::os_signal()).await
    }

    /// Run every stage until `trigger` completes or shutdown is broadcast
    /// through [`sync`](Self::sync).
    ///
    /// Returns the watchdog counters observed after every stage stopped.
    pub async fn run_until<F>(self, trigger: F) -> Result<StatsSnapshot>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            config,
            sync,
            watchdog,
            alert_rx,
            collector,
            display_format,
            display_writer,
            start_time,
        } = self;

        let display = DisplayStage::new(
            display_format,
            Duration::from_secs(config.display.refresh_secs),
            display_writer,
            alert_rx,
            watchdog.stats(),
        )
        .map_err(|e| anyhow::anyhow!("failed to start display writer: {}", e))?;

        let main_guard = sync.register_routine(STAGE_MAIN);

        let handle = watchdog.spawn(&sync);
        let watchdog_stats = handle.stats();

        sync.spawn(STAGE_DISPLAY, display.run(sync.shutdown_token()));

        if config.metrics.enabled {
            sync.spawn(
                STAGE_STATS,
                stats::run(
                    handle.stats(),
                    sync.clone(),
                    start_time,
                    stats::PUBLISH_INTERVAL,
                    sync.shutdown_token(),
                ),
            );
        }

        if let Some(collector) = collector {
            sync.spawn(
                STAGE_COLLECTOR,
                collector.run(handle.hit_sender(), sync.shutdown_token()),
            );
        }

        sync.spawn(STAGE_COMMAND, signal::run(sync.clone(), trigger));

        tracing::info!(live = sync.live_count(), "netwatch running");
        main_guard.release().map_err(NetwatchError::from)?;

        sync.wait_shutdown().await;
        tracing::info!("waiting for all stages to stop");

        match config.general.shutdown_timeout_secs {
            0 => sync.join_all().await,
            secs => {
                if let Err(e) = sync.join_all_timeout(Duration::from_secs(secs)).await {
                    tracing::error!(error = %e, timeout_secs = secs, "shutdown incomplete");
                    return Err(NetwatchError::from(e).into());
                }
            }
        }

        handle
            .join()
            .await
            .map_err(|e| anyhow::anyhow!("watchdog task failed: {}", e))?;

        let snapshot = watchdog_stats.snapshot();
        tracing::info!(
            hits_received = snapshot.hits_received,
            hits_dropped = snapshot.hits_dropped,
            alerts = snapshot.alerts_emitted,
            recoveries = snapshot.recoveries_emitted,
            uptime_secs = start_time.elapsed().as_secs(),
            "netwatch stopped"
        );
        Ok(snapshot)
    }
}

/// Record daemon-level metrics once the recorder is installed.
fn record_daemon_metrics() {
    use netwatch_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}
