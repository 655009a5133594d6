//! Display stage -- renders watchdog output.
//!
//! Consumes [`AlertMessage`] values from the watchdog's alert channel and
//! writes one line per message. Every `refresh_secs` a status line is
//! written from the [`WatchdogStats`] mirror.
//!
//! Two output formats are supported:
//!
//! * `plain` - `[alert] High traffic generated an alert - hits = 512, ...`
//! * `json` - one JSON object per line, tagged with `"type"`
//!
//! Lines are written by a dedicated thread so a slow terminal or pipe blocks
//! that thread instead of a runtime worker.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use netwatch_core::event::{AlertMessage, TIME_LAYOUT};
use netwatch_core::metrics as m;
use netwatch_watchdog::{StatsSnapshot, WatchdogStats};

/// Output format for the display stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    /// Human-readable lines.
    Plain,
    /// One JSON object per line.
    Json,
}

impl FromStr for DisplayFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(anyhow::anyhow!(
                "unknown display format '{}', expected 'plain' or 'json'",
                other
            )),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonLine<'a> {
    Alert {
        recovery: bool,
        body: &'a str,
        timestamp: DateTime<Utc>,
    },
    Status {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        stats: StatsSnapshot,
    },
}

/// Blocking writer thread fed through an unbounded line channel.
struct LineWriter {
    lines: mpsc::UnboundedSender<String>,
    done: oneshot::Receiver<()>,
}

impl LineWriter {
    fn spawn<W: Write + Send + 'static>(mut writer: W) -> std::io::Result<Self> {
        let (lines, mut rx) = mpsc::unbounded_channel::<String>();
        let (done_tx, done) = oneshot::channel();

        std::thread::Builder::new()
            .name("netwatch-display".to_owned())
            .spawn(move || {
                while let Some(line) = rx.blocking_recv() {
                    if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
                        tracing::warn!(error = %e, "failed to write display line");
                    }
                }
                let _ = done_tx.send(());
            })?;

        Ok(Self { lines, done })
    }

    fn send(&self, line: String) {
        // The receiver lives until `finish`.
        let _ = self.lines.send(line);
    }

    /// Close the channel and wait until every queued line is written.
    async fn finish(self) {
        drop(self.lines);
        let _ = self.done.await;
    }
}

/// The display stage.
pub struct DisplayStage {
    format: DisplayFormat,
    refresh: Duration,
    writer: LineWriter,
    alert_rx: mpsc::Receiver<AlertMessage>,
    stats: Arc<WatchdogStats>,
    rendered: u64,
}

impl DisplayStage {
    /// Create a display stage writing to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer thread cannot be started.
    pub fn new<W: Write + Send + 'static>(
        format: DisplayFormat,
        refresh: Duration,
        writer: W,
        alert_rx: mpsc::Receiver<AlertMessage>,
        stats: Arc<WatchdogStats>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            format,
            refresh,
            writer: LineWriter::spawn(writer)?,
            alert_rx,
            stats,
            rendered: 0,
        })
    }

    /// Run until shutdown or until the alert channel closes.
    ///
    /// A message already queued when shutdown fires is still rendered.
    /// Returns the number of alert/recovery messages rendered.
    pub async fn run(mut self, shutdown: CancellationToken) -> u64 {
        let mut refresh = tokio::time::interval_at(Instant::now() + self.refresh, self.refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("display stage shutting down");
                    break;
                }
                received = self.alert_rx.recv() => match received {
                    Some(msg) => self.render_message(&msg),
                    None => {
                        tracing::debug!("alert channel closed, exiting display stage");
                        break;
                    }
                },
                _ = refresh.tick() => {
                    let snapshot = self.stats.snapshot();
                    self.render_status(Utc::now(), &snapshot);
                }
            }
        }

        while let Ok(msg) = self.alert_rx.try_recv() {
            self.render_message(&msg);
        }

        let rendered = self.rendered;
        self.writer.finish().await;
        rendered
    }

    fn render_message(&mut self, msg: &AlertMessage) {
        if msg.is_recovery {
            tracing::info!(body = %msg.body, "traffic alert recovered");
        } else {
            tracing::warn!(body = %msg.body, "traffic alert raised");
        }
        metrics::counter!(m::DISPLAY_MESSAGES_TOTAL, m::LABEL_KIND => msg.kind().to_string())
            .increment(1);

        let line = match self.format {
            DisplayFormat::Plain => Ok(msg.to_string()),
            DisplayFormat::Json => serde_json::to_string(&JsonLine::Alert {
                recovery: msg.is_recovery,
                body: &msg.body,
                timestamp: msg.timestamp,
            }),
        };
        self.write_line(line);
        self.rendered += 1;
    }

    fn render_status(&mut self, now: DateTime<Utc>, snapshot: &StatsSnapshot) {
        let line = match self.format {
            DisplayFormat::Plain => Ok(format!(
                "{} window_hits={} alerting={} received={} dropped={}",
                now.format(TIME_LAYOUT),
                snapshot.window_hits,
                snapshot.alerting,
                snapshot.hits_received,
                snapshot.hits_dropped,
            )),
            DisplayFormat::Json => serde_json::to_string(&JsonLine::Status {
                timestamp: now,
                stats: *snapshot,
            }),
        };
        self.write_line(line);
    }

    fn write_line(&mut self, line: serde_json::Result<String>) {
        match line {
            Ok(line) => self.writer.send(line),
            Err(e) => tracing::warn!(error = %e, "failed to serialize display line"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn stage(
        format: DisplayFormat,
    ) -> (DisplayStage, SharedBuffer, mpsc::Sender<AlertMessage>) {
        let (tx, rx) = mpsc::channel(4);
        let buffer = SharedBuffer::default();
        let stage = DisplayStage::new(
            format,
            Duration::from_secs(10),
            buffer.clone(),
            rx,
            Arc::new(WatchdogStats::new()),
        )
        .unwrap();
        (stage, buffer, tx)
    }

    #[test]
    fn display_format_parses() {
        assert_eq!("plain".parse::<DisplayFormat>().unwrap(), DisplayFormat::Plain);
        assert_eq!("json".parse::<DisplayFormat>().unwrap(), DisplayFormat::Json);
        assert!("html".parse::<DisplayFormat>().is_err());
    }

    #[tokio::test]
    async fn plain_messages_render_until_channel_closes() {
        let (stage, buffer, tx) = stage(DisplayFormat::Plain);
        tx.send(AlertMessage::alert(600, Utc::now())).await.unwrap();
        tx.send(AlertMessage::recovery(Utc::now())).await.unwrap();
        drop(tx);

        let rendered = stage.run(CancellationToken::new()).await;

        assert_eq!(rendered, 2);
        let out = buffer.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[alert] High traffic"));
        assert!(lines[0].contains("hits = 600"));
        assert!(lines[1].starts_with("[recovery] Traffic alert recovered"));
    }

    #[tokio::test]
    async fn json_messages_are_tagged() {
        let (stage, buffer, tx) = stage(DisplayFormat::Json);
        tx.send(AlertMessage::alert(3, Utc::now())).await.unwrap();
        drop(tx);

        stage.run(CancellationToken::new()).await;

        let value: serde_json::Value = serde_json::from_str(buffer.contents().trim()).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["recovery"], false);
        assert!(value["body"].as_str().unwrap().contains("hits = 3"));
    }

    #[tokio::test]
    async fn queued_message_is_drained_on_shutdown() {
        let (stage, buffer, tx) = stage(DisplayFormat::Plain);
        tx.send(AlertMessage::alert(1, Utc::now())).await.unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let rendered = stage.run(token).await;

        // Rendered whichever select branch wins first.
        assert_eq!(rendered, 1);
        assert!(buffer.contents().contains("[alert]"));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn status_line_every_refresh() {
        let (stage, buffer, tx) = stage(DisplayFormat::Plain);
        let token = CancellationToken::new();
        let task = tokio::spawn(stage.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        token.cancel();
        task.await.unwrap();

        let out = buffer.contents();
        let status_lines = out.lines().filter(|l| l.contains("window_hits=")).count();
        assert_eq!(status_lines, 2);
        drop(tx);
    }

    #[tokio::test]
    async fn json_status_flattens_snapshot() {
        let (mut stage, buffer, _tx) = stage(DisplayFormat::Json);
        let snapshot = StatsSnapshot {
            window_hits: 12,
            alerting: true,
            ..Default::default()
        };

        stage.render_status(Utc::now(), &snapshot);
        stage.writer.finish().await;

        let value: serde_json::Value = serde_json::from_str(buffer.contents().trim()).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["window_hits"], 12);
        assert_eq!(value["alerting"], true);
    }

    /// Writer that blocks the calling thread on every write.
    struct SlowWriter {
        inner: SharedBuffer,
        delay: Duration,
    }

    impl Write for SlowWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            std::thread::sleep(self.delay);
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_writer_does_not_block_runtime() {
        let (tx, rx) = mpsc::channel(4);
        let buffer = SharedBuffer::default();
        let writer = SlowWriter {
            inner: buffer.clone(),
            delay: Duration::from_millis(200),
        };
        let stage = DisplayStage::new(
            DisplayFormat::Plain,
            Duration::from_secs(3600),
            writer,
            rx,
            Arc::new(WatchdogStats::new()),
        )
        .unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(stage.run(token.clone()));

        tx.send(AlertMessage::alert(5, Utc::now())).await.unwrap();
        tx.send(AlertMessage::recovery(Utc::now())).await.unwrap();

        // The single runtime thread stays free while lines are being written.
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(
            started.elapsed() < Duration::from_millis(150),
            "runtime stalled for {:?}",
            started.elapsed()
        );

        token.cancel();
        let rendered = task.await.unwrap();

        // Every queued line is written before the stage returns.
        assert_eq!(rendered, 2);
        let out = buffer.contents();
        assert!(out.contains("[alert]"));
        assert!(out.contains("[recovery]"));
    }
}
