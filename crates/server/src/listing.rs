use crate::network::SessionSnapshot;
use std::fmt::Write;

/// Time-of-day shown to sessions for each peer's last ping.
pub const LAST_SEEN_FORMAT: &str = "%H:%M:%S";

const HEADER: &str = "[SERVER] Connected Campuses:";
const FOOTER: &str = "----------------------------";

/// Renders the block sent in answer to `LIST_REQUEST`.
pub fn render_listing(snapshot: &[SessionSnapshot]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    if snapshot.is_empty() {
        out.push_str("  No campuses connected.\n");
    }
    for session in snapshot {
        let _ = writeln!(
            out,
            "  {}. {} - {} (Last seen: {})",
            session.ordinal,
            session.identity.campus,
            session.identity.department,
            session.liveness.last_seen_display(LAST_SEEN_FORMAT)
        );
    }

    out.push_str(FOOTER);
    out
}
