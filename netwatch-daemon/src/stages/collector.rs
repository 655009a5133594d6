//! Collector stage -- UDP ingestion of mirrored application payloads.
//!
//! Each datagram received on `collector.bind_addr` is one observed payload.
//! A datagram whose bytes contain `collector.payload_filter` is a hit and is
//! submitted to the watchdog through a [`HitSender`], stamped with the
//! watchdog's shared clock.
//!
//! With the `block` drop policy a full submission buffer stalls this stage,
//! which in turn leaves datagrams in the kernel socket buffer.

use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use netwatch_core::config::CollectorConfig;
use netwatch_core::metrics as m;
use netwatch_watchdog::{HitSender, WatchdogError};

/// Counters reported when the collector exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSummary {
    /// Datagrams received.
    pub datagrams: u64,
    /// Hits accepted by the watchdog.
    pub hits: u64,
    /// Hits rejected because the submission buffer was full.
    pub dropped: u64,
}

/// Whether `payload` qualifies as a hit for `filter`.
///
/// An empty filter matches every payload.
pub fn is_hit(payload: &[u8], filter: &[u8]) -> bool {
    filter.is_empty() || payload.windows(filter.len()).any(|window| window == filter)
}

/// The collector stage.
pub struct CollectorStage {
    socket: UdpSocket,
    filter: Vec<u8>,
    max_datagram_size: usize,
}

impl CollectorStage {
    /// Bind the UDP socket.
    ///
    /// Binding happens before any stage is spawned so that an unusable
    /// address fails startup instead of a running stage.
    pub async fn bind(config: &CollectorConfig) -> Result<Self> {
        let socket = UdpSocket::bind(&config.bind_addr).await.map_err(|e| {
            anyhow::anyhow!("failed to bind collector to {}: {}", config.bind_addr, e)
        })?;

        tracing::info!(
            bind_addr = %config.bind_addr,
            filter = %config.payload_filter,
            "collector bound"
        );

        Ok(Self {
            socket,
            filter: config.payload_filter.as_bytes().to_vec(),
            max_datagram_size: config.max_datagram_size,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until shutdown or until the watchdog stops.
    pub async fn run(self, sender: HitSender, shutdown: CancellationToken) -> CollectorSummary {
        let mut buf = vec![0u8; self.max_datagram_size];
        let mut summary = CollectorSummary::default();

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("collector shutting down");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => received,
            };

            let len = match received {
                Ok((len, _peer)) => len,
                Err(e) => {
                    tracing::warn!(error = %e, "collector receive failed");
                    continue;
                }
            };

            summary.datagrams += 1;
            metrics::counter!(m::COLLECTOR_DATAGRAMS_TOTAL).increment(1);

            if !is_hit(&buf[..len], &self.filter) {
                continue;
            }

            match sender.submit_now().await {
                Ok(()) => {
                    summary.hits += 1;
                    metrics::counter!(m::COLLECTOR_HITS_SUBMITTED_TOTAL).increment(1);
                }
                Err(WatchdogError::BufferFull { capacity }) => {
                    summary.dropped += 1;
                    metrics::counter!(m::COLLECTOR_HITS_DROPPED_TOTAL).increment(1);
                    tracing::debug!(capacity, "watchdog buffer full, hit dropped");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "watchdog no longer accepts hits");
                    break;
                }
            }
        }

        tracing::info!(
            datagrams = summary.datagrams,
            hits = summary.hits,
            dropped = summary.dropped,
            "collector stopped"
        );
        summary
    }
}
