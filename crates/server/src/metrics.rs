use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Server metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub active_sessions: AtomicU64,
    pub connections_accepted: AtomicU64,
    pub auth_failures: AtomicU64,
    pub rejected_sessions: AtomicU64,
    pub messages_routed: AtomicU64,
    pub fallback_routes: AtomicU64,
    pub unroutable_messages: AtomicU64,
    pub pings_received: AtomicU64,
    pub unresolved_pings: AtomicU64,
    pub broadcast_datagrams: AtomicU64,
}

impl ServerMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.store(count as u64, Ordering::Relaxed);
    }

    /// Print metrics to the log
    pub fn print_stats(&self) {
        tracing::info!(
            "Sessions: {} | Accepted: {} | Auth failed: {} | Rejected: {} | Routed: {} (fallback {}) | Unroutable: {} | Pings: {} (unresolved {}) | Broadcast datagrams: {}",
            self.active_sessions.load(Ordering::Relaxed),
            self.connections_accepted.load(Ordering::Relaxed),
            self.auth_failures.load(Ordering::Relaxed),
            self.rejected_sessions.load(Ordering::Relaxed),
            self.messages_routed.load(Ordering::Relaxed),
            self.fallback_routes.load(Ordering::Relaxed),
            self.unroutable_messages.load(Ordering::Relaxed),
            self.pings_received.load(Ordering::Relaxed),
            self.unresolved_pings.load(Ordering::Relaxed),
            self.broadcast_datagrams.load(Ordering::Relaxed),
        );
    }
}

/// Start metrics reporting task
pub async fn start_metrics_reporter(metrics: Arc<ServerMetrics>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        metrics.print_stats();
    }
}
