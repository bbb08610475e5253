use super::{check_field, ParseError};
use crate::config::ProtocolLimits;
use std::fmt;

/// The (campus, department) pair a session is known by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    pub campus: String,
    pub department: String,
}

impl SessionIdentity {
    pub fn new(campus: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            campus: campus.into(),
            department: department.into(),
        }
    }

    pub fn matches(&self, campus: &str, department: &str) -> bool {
        self.campus == campus && self.department == department
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.campus, self.department)
    }
}

/// Client -> Server credentials line: `CAMPUS:DEPARTMENT:PASSWORD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub identity: SessionIdentity,
    pub password: String,
}

impl HandshakeRequest {
    /// Splits on the first two colons; the password keeps any further colons.
    pub fn parse(line: &str, limits: &ProtocolLimits) -> Result<Self, ParseError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut parts = line.splitn(3, ':');
        let (Some(campus), Some(department), Some(password)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::MissingDelimiter { delimiter: ':' });
        };

        check_field("campus", campus, limits.max_name_len)?;
        check_field("department", department, limits.max_name_len)?;
        check_field("password", password, limits.max_name_len)?;

        Ok(Self {
            identity: SessionIdentity::new(campus, department),
            password: password.to_string(),
        })
    }
}

/// Server -> Client reply to the credentials line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReply {
    Ok,
    Failed,
    ServerFull,
    BadFormat,
    AlreadyConnected,
}

impl AuthReply {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "AUTH_OK",
            Self::Failed => "AUTH_FAILED",
            Self::ServerFull => "SERVER_FULL",
            Self::BadFormat => "BAD_FORMAT: Use Campus:Dept:Password",
            Self::AlreadyConnected => "ALREADY_CONNECTED",
        }
    }
}

impl fmt::Display for AuthReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
