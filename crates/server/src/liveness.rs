use crate::{
    config::ProtocolLimits,
    metrics::ServerMetrics,
    network::Registry,
    protocol::{LivenessPing, SessionIdentity},
};
use chrono::{DateTime, Local};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::UdpSocket;

/// Room for the separator, trailing whitespace and a clipping marker.
const PING_HEADROOM: usize = 64;

/// Receives `campus|department` pings and records where each session can be
/// reached by datagram.
pub struct LivenessListener {
    socket: Arc<UdpSocket>,
    registry: Arc<Registry>,
    limits: ProtocolLimits,
    metrics: Arc<ServerMetrics>,
}

impl LivenessListener {
    pub fn new(
        socket: Arc<UdpSocket>,
        registry: Arc<Registry>,
        limits: ProtocolLimits,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            socket,
            registry,
            limits,
            metrics,
        }
    }

    pub async fn run(self) {
        // Field lengths are checked by the parser; a datagram that fills the
        // whole buffer may have been clipped and is dropped.
        let mut buf = vec![0u8; self.limits.max_name_len * 2 + PING_HEADROOM];

        loop {
            let (n, source) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!("Liveness receive error: {}", e);
                    continue;
                }
            };

            if n == buf.len() {
                tracing::warn!("Dropping oversized ping from {}", source);
                continue;
            }
            self.handle_datagram(&buf[..n], source, Local::now());
        }
    }

    /// Applies one ping. Returns the session it was attributed to, if any.
    pub fn handle_datagram(
        &self,
        data: &[u8],
        source: SocketAddr,
        at: DateTime<Local>,
    ) -> Option<SessionIdentity> {
        ServerMetrics::incr(&self.metrics.pings_received);

        let ping = match LivenessPing::parse(data, &self.limits) {
            Ok(ping) => ping,
            Err(e) => {
                tracing::warn!("Malformed ping from {}: {}", source, e);
                return None;
            }
        };

        match self
            .registry
            .record_ping(&ping.campus, &ping.department, source, at)
        {
            Some((identity, true)) => {
                tracing::debug!("Heartbeat from {} at {}", identity, source);
                Some(identity)
            }
            Some((identity, false)) => {
                tracing::debug!(
                    "Heartbeat for {} {} attributed to {} at {}",
                    ping.campus,
                    ping.department,
                    identity,
                    source
                );
                Some(identity)
            }
            None => {
                ServerMetrics::incr(&self.metrics.unresolved_pings);
                tracing::info!(
                    "Heartbeat from {} {} ({}) but no session found",
                    ping.campus,
                    ping.department,
                    source
                );
                None
            }
        }
    }
}
