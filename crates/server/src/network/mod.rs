pub mod io;
pub mod registry;
pub mod session;

pub use io::{LineReader, LineWriter};
pub use registry::{Registry, RegistryError, Resolved, SessionSnapshot};
pub use session::{Liveness, Outbound, SessionHandle};

use crate::{auth::AuthError, protocol::ParseError};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors emitted by the networking layer.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),
    #[error("line codec error: {0}")]
    Codec(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("no data from {0} before the deadline")]
    Timeout(SocketAddr),
}

pub type Result<T> = std::result::Result<T, ServerError>;
