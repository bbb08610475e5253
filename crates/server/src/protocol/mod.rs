pub mod handshake;
pub mod messages;

pub use handshake::{AuthReply, HandshakeRequest, SessionIdentity};
pub use messages::*;

use thiserror::Error;

/// Errors produced while parsing handshake lines, session requests or pings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected two `{delimiter}` delimiters")]
    MissingDelimiter { delimiter: char },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Rejects empty or oversized fields instead of truncating them.
pub(crate) fn check_field(field: &'static str, value: &str, max: usize) -> Result<(), ParseError> {
    if value.is_empty() {
        return Err(ParseError::EmptyField { field });
    }
    if value.len() > max {
        return Err(ParseError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}
