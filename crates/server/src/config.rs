use crate::auth::AuthConfig;
use std::{env, time::Duration};

/// Configuration for the campus relay binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the session stream listener binds to (e.g. `0.0.0.0:5000`).
    pub tcp_bind: String,
    /// Address the liveness/broadcast datagram socket binds to.
    pub udp_bind: String,
    /// Maximum number of concurrently registered sessions.
    pub max_sessions: usize,
    /// Field and line limits applied by the protocol parsers.
    pub limits: ProtocolLimits,
    /// Lines buffered per session before forwards to it are dropped.
    pub outbound_queue: usize,
    /// How long a fresh connection may take to send its credentials.
    pub handshake_timeout: Duration,
    /// Optional bound on how long a session may stay silent.
    pub idle_timeout: Option<Duration>,
    /// Tell the sender when a message was delivered to another department.
    pub notify_fallback: bool,
    /// Interval between metrics log lines; `None` disables the reporter.
    pub stats_interval: Option<Duration>,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Builds a configuration from `CAMPUS_RELAY_*` environment variables,
    /// falling back to the defaults of the reference deployment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tcp_bind = lookup("CAMPUS_RELAY_TCP_BIND").unwrap_or(defaults.tcp_bind);
        let udp_bind = lookup("CAMPUS_RELAY_UDP_BIND").unwrap_or(defaults.udp_bind);
        let max_sessions =
            parse_or(&lookup, "CAMPUS_RELAY_MAX_SESSIONS", defaults.max_sessions);
        let max_name_len = parse_or(
            &lookup,
            "CAMPUS_RELAY_MAX_NAME",
            defaults.limits.max_name_len,
        );
        let max_message_len = parse_or(
            &lookup,
            "CAMPUS_RELAY_MAX_MESSAGE",
            defaults.limits.max_message_len,
        );
        let outbound_queue =
            parse_or(&lookup, "CAMPUS_RELAY_OUTBOUND_QUEUE", defaults.outbound_queue);
        let handshake_timeout = Duration::from_secs(parse_or(
            &lookup,
            "CAMPUS_RELAY_HANDSHAKE_TIMEOUT_SECS",
            defaults.handshake_timeout.as_secs(),
        ));
        let idle_timeout = lookup("CAMPUS_RELAY_IDLE_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let notify_fallback = lookup("CAMPUS_RELAY_NOTIFY_FALLBACK")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.notify_fallback);
        let stats_secs: u64 = parse_or(&lookup, "CAMPUS_RELAY_STATS_INTERVAL_SECS", 60);
        let stats_interval = (stats_secs > 0).then(|| Duration::from_secs(stats_secs));

        let auth = AuthConfig::from_lookup(&lookup)?;

        anyhow::ensure!(max_sessions >= 1, "max sessions must be >= 1");
        anyhow::ensure!(max_name_len >= 1, "max name length must be >= 1");
        anyhow::ensure!(max_message_len >= 1, "max message length must be >= 1");
        anyhow::ensure!(outbound_queue >= 1, "outbound queue must be >= 1");

        Ok(Self {
            tcp_bind,
            udp_bind,
            max_sessions,
            limits: ProtocolLimits {
                max_name_len,
                max_message_len,
            },
            outbound_queue,
            handshake_timeout,
            idle_timeout,
            notify_fallback,
            stats_interval,
            auth,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_bind: "0.0.0.0:5000".to_string(),
            udp_bind: "0.0.0.0:6000".to_string(),
            max_sessions: 10,
            limits: ProtocolLimits::default(),
            outbound_queue: 64,
            handshake_timeout: Duration::from_secs(30),
            idle_timeout: None,
            notify_fallback: false,
            stats_interval: Some(Duration::from_secs(60)),
            auth: AuthConfig::default(),
        }
    }
}

/// Length limits shared by the handshake, request and ping parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    /// Longest accepted campus or department name, in bytes.
    pub max_name_len: usize,
    /// Longest accepted message payload, in bytes.
    pub max_message_len: usize,
}

impl ProtocolLimits {
    /// Longest line a session may send: two names, two commas and a payload.
    pub fn max_line_len(&self) -> usize {
        self.max_name_len * 2 + self.max_message_len + 2
    }
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_name_len: 40,
            max_message_len: 1024,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
