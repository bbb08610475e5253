//! Campus relay server crate.
//!
//! A rendezvous point for campus/department endpoints: sessions authenticate
//! over a line-oriented TCP stream, exchange addressed messages through the
//! router, report liveness with periodic UDP pings, and receive operator
//! broadcasts on the address those pings revealed.

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod console;
pub mod listing;
pub mod liveness;
pub mod metrics;
pub mod network;
pub mod protocol;
pub mod router;
pub mod server;

pub use auth::{AuthConfig, Authenticator, Credential};
pub use broadcast::{BroadcastDispatcher, BroadcastReport};
pub use config::{ProtocolLimits, ServerConfig};
pub use console::{ConsoleCommand, OperatorConsole};
pub use network::{Registry, RegistryError, ServerError, SessionHandle};
pub use protocol::{
    AuthReply, ClientRequest, HandshakeRequest, LivenessPing, ParseError, RoutingEnvelope,
    SessionIdentity,
};
pub use router::{Delivery, Router, RoutingError};
pub use server::{RelayServer, RelayState};
