use crate::{metrics::ServerMetrics, network::Registry};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Outcome of one operator broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions with a known reply address at the time of the broadcast.
    pub targets: usize,
    /// Datagrams the socket accepted.
    pub sent: usize,
}

/// Fans a payload out by datagram to every session that has pinged.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: Arc<Registry>,
    socket: Arc<UdpSocket>,
    metrics: Arc<ServerMetrics>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<Registry>, socket: Arc<UdpSocket>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            registry,
            socket,
            metrics,
        }
    }

    /// Best effort: failures are logged and counted out of the report, never
    /// retried.
    pub async fn broadcast(&self, payload: &str) -> BroadcastReport {
        // Targets are copied out so no send happens under the registry lock.
        let targets = self.registry.reply_targets();
        let mut report = BroadcastReport {
            targets: targets.len(),
            sent: 0,
        };

        for (identity, addr) in targets {
            match self.socket.send_to(payload.as_bytes(), addr).await {
                Ok(_) => {
                    report.sent += 1;
                    ServerMetrics::incr(&self.metrics.broadcast_datagrams);
                }
                Err(e) => {
                    tracing::warn!("Failed to send broadcast to {} at {}: {}", identity, addr, e);
                }
            }
        }

        tracing::info!(
            "Broadcast sent to {}/{} clients: {}",
            report.sent,
            report.targets,
            payload
        );
        report
    }
}
