use crate::{
    config::ProtocolLimits,
    listing::render_listing,
    metrics::ServerMetrics,
    network::{session::deliver, Registry},
    protocol::{request_error_reply, ClientRequest, RoutingEnvelope, SessionIdentity},
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("target campus {campus} not connected")]
    CampusNotConnected { campus: String },
}

impl RoutingError {
    /// Text sent back to the session whose message could not be routed.
    pub fn reply_text(&self) -> String {
        match self {
            Self::CampusNotConnected { campus } => {
                format!("[SERVER] Target campus {campus} not connected.")
            }
        }
    }
}

/// Where a routed message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Exact(SessionIdentity),
    /// The requested department was absent; another session of the same
    /// campus received the message.
    Fallback(SessionIdentity),
}

/// Interprets request lines from authenticated sessions.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<Registry>,
    limits: ProtocolLimits,
    notify_fallback: bool,
    metrics: Arc<ServerMetrics>,
}

impl Router {
    pub fn new(
        registry: Arc<Registry>,
        limits: ProtocolLimits,
        notify_fallback: bool,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            registry,
            limits,
            notify_fallback,
            metrics,
        }
    }

    /// Handles one line from `origin` and returns the reply owed to it, if
    /// any. Forwards to other sessions happen as a side effect.
    pub fn dispatch(&self, origin: &SessionIdentity, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }

        match ClientRequest::parse(line, &self.limits) {
            Ok(ClientRequest::List) => {
                let listing = render_listing(&self.registry.snapshot());
                tracing::info!("Sent campus list to {}", origin);
                Some(listing)
            }
            Ok(ClientRequest::Route(envelope)) => match self.route(origin, &envelope) {
                Ok(Delivery::Exact(_)) => None,
                Ok(Delivery::Fallback(actual)) => self.notify_fallback.then(|| {
                    format!(
                        "[SERVER] Department {} not connected at {}; delivered to {}.",
                        envelope.target_department, envelope.target_campus, actual
                    )
                }),
                Err(err) => Some(err.reply_text()),
            },
            Err(err) => {
                tracing::warn!("Invalid request from {}: {}", origin, err);
                Some(request_error_reply(&err))
            }
        }
    }

    /// Resolves the envelope's target and queues the annotated message for
    /// it. The registry lock is released before the line is handed over.
    pub fn route(
        &self,
        origin: &SessionIdentity,
        envelope: &RoutingEnvelope,
    ) -> Result<Delivery, RoutingError> {
        let Some(target) = self
            .registry
            .resolve(&envelope.target_campus, &envelope.target_department)
        else {
            ServerMetrics::incr(&self.metrics.unroutable_messages);
            tracing::info!(
                "Could not route message from {} to {} {} (not connected)",
                origin,
                envelope.target_campus,
                envelope.target_department
            );
            return Err(RoutingError::CampusNotConnected {
                campus: envelope.target_campus.clone(),
            });
        };

        deliver(&target.outbound, target.handle, envelope.forward_line(origin));
        ServerMetrics::incr(&self.metrics.messages_routed);

        if target.exact {
            tracing::info!("Routed message from {} to {}", origin, target.identity);
            Ok(Delivery::Exact(target.identity))
        } else {
            ServerMetrics::incr(&self.metrics.fallback_routes);
            tracing::info!(
                "Routed message from {} to {} (department {} not found, sent to campus)",
                origin,
                target.identity,
                envelope.target_department
            );
            Ok(Delivery::Fallback(target.identity))
        }
    }
}
