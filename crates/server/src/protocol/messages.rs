use super::{check_field, ParseError, SessionIdentity};
use crate::config::ProtocolLimits;

/// Literal request for the connected-campus listing.
pub const LIST_REQUEST: &str = "LIST_REQUEST";

/// Department assumed for legacy pings that carry only a campus.
pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// Requests an authenticated session can send on its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    List,
    Route(RoutingEnvelope),
}

impl ClientRequest {
    pub fn parse(line: &str, limits: &ProtocolLimits) -> Result<Self, ParseError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line == LIST_REQUEST {
            return Ok(Self::List);
        }
        RoutingEnvelope::parse(line, limits).map(Self::Route)
    }
}

/// Parsed `<targetCampus>,<targetDept>,<message>` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEnvelope {
    pub target_campus: String,
    pub target_department: String,
    pub payload: String,
}

impl RoutingEnvelope {
    /// Splits on the first two commas; the payload may contain more.
    pub fn parse(line: &str, limits: &ProtocolLimits) -> Result<Self, ParseError> {
        let mut parts = line.splitn(3, ',');
        let (Some(campus), Some(department), Some(payload)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::MissingDelimiter { delimiter: ',' });
        };

        check_field("target campus", campus, limits.max_name_len)?;
        check_field("target department", department, limits.max_name_len)?;
        if payload.len() > limits.max_message_len {
            return Err(ParseError::FieldTooLong {
                field: "message",
                len: payload.len(),
                max: limits.max_message_len,
            });
        }

        Ok(Self {
            target_campus: campus.to_string(),
            target_department: department.to_string(),
            payload: payload.to_string(),
        })
    }

    /// `[srcCampus srcDept -> dstCampus dstDept] message`, naming the
    /// requested target even when delivery fell back to another department.
    pub fn forward_line(&self, origin: &SessionIdentity) -> String {
        format!(
            "[{} {} -> {} {}] {}",
            origin.campus,
            origin.department,
            self.target_campus,
            self.target_department,
            self.payload
        )
    }
}

/// Reply sent to a session whose request line could not be parsed.
pub fn request_error_reply(err: &ParseError) -> String {
    match err {
        ParseError::MissingDelimiter { .. } => {
            "[SERVER] Error: Use format TargetCampus,Dept,Message".to_string()
        }
        ParseError::LineTooLong { .. } => "[SERVER] Error: Message too long".to_string(),
        other => format!("[SERVER] Error: {other}"),
    }
}

/// Liveness datagram: `campus|department`, or a bare `campus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessPing {
    pub campus: String,
    pub department: String,
}

impl LivenessPing {
    pub fn parse(data: &[u8], limits: &ProtocolLimits) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(data).map_err(|_| ParseError::InvalidUtf8)?;
        let text = text.trim_end();

        let (campus, department) = match text.split_once('|') {
            Some((campus, department)) => (campus, department),
            None => (text, UNKNOWN_DEPARTMENT),
        };

        check_field("campus", campus, limits.max_name_len)?;
        check_field("department", department, limits.max_name_len)?;

        Ok(Self {
            campus: campus.to_string(),
            department: department.to_string(),
        })
    }
}
