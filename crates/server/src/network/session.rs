use chrono::{DateTime, Local};
use std::{fmt, net::SocketAddr};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Stable identifier issued to every registered session. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Queue feeding a session's writer task.
pub type Outbound = mpsc::Sender<String>;

pub fn outbound_channel(capacity: usize) -> (Outbound, mpsc::Receiver<String>) {
    mpsc::channel(capacity)
}

/// Queues `line` for a session without waiting. A full or closed queue drops
/// the line; the originator is never told.
pub fn deliver(outbound: &Outbound, handle: SessionHandle, line: String) -> bool {
    match outbound.try_send(line) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Outbound queue for session {} is full, dropping line", handle);
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Session {} writer already gone, dropping line", handle);
            false
        }
    }
}

/// What the liveness datagrams have told us about a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Liveness {
    pub last_seen: Option<DateTime<Local>>,
    pub reply_addr: Option<SocketAddr>,
}

impl Liveness {
    /// Whether a ping has revealed an address broadcasts can be sent to.
    pub fn is_known(&self) -> bool {
        self.reply_addr.is_some()
    }

    pub fn record(&mut self, source: SocketAddr, at: DateTime<Local>) {
        self.last_seen = Some(at);
        self.reply_addr = Some(source);
    }

    /// `last_seen` rendered with `format`, or `never`.
    pub fn last_seen_display(&self, format: &str) -> String {
        self.last_seen
            .map(|at| at.format(format).to_string())
            .unwrap_or_else(|| "never".to_string())
    }
}
