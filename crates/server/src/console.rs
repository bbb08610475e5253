use crate::{
    broadcast::BroadcastDispatcher,
    network::{Registry, SessionSnapshot},
};
use std::{fmt::Write as _, sync::Arc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const CONSOLE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const USAGE: &str = "Admin commands: 'list' or 'broadcast <message>'";

/// Commands accepted on the operator console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Broadcast(String),
    Help,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == "list" {
            return Self::List;
        }
        match line.strip_prefix("broadcast ") {
            Some(message) if !message.trim().is_empty() => Self::Broadcast(message.to_string()),
            _ => Self::Help,
        }
    }
}

/// Local operator console: inspects the registry and triggers broadcasts.
#[derive(Clone)]
pub struct OperatorConsole {
    registry: Arc<Registry>,
    dispatcher: BroadcastDispatcher,
}

impl OperatorConsole {
    pub fn new(registry: Arc<Registry>, dispatcher: BroadcastDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Serves commands from `input` until it ends, writing results to `output`.
    pub async fn run<R, W>(&self, mut input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output.write_all(format!("{USAGE}\n").as_bytes()).await?;
        output.flush().await?;

        let mut raw = Vec::new();
        loop {
            raw.clear();
            if input.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            let Ok(line) = std::str::from_utf8(&raw) else {
                tracing::warn!("Ignoring console line that is not valid UTF-8");
                continue;
            };

            let response = self.execute(ConsoleCommand::parse(line)).await;
            output.write_all(response.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }

        tracing::info!("Operator console input closed");
        Ok(())
    }

    pub async fn execute(&self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::List => render_console_listing(&self.registry.snapshot()),
            ConsoleCommand::Broadcast(message) => {
                let report = self.dispatcher.broadcast(&message).await;
                format!(
                    "[ADMIN] Broadcast sent to {}/{} clients: {}",
                    report.sent, report.targets, message
                )
            }
            ConsoleCommand::Help => USAGE.to_string(),
        }
    }
}

pub fn render_console_listing(snapshot: &[SessionSnapshot]) -> String {
    let mut out = format!("---- Connected campuses ({}) ----\n", snapshot.len());
    for session in snapshot {
        let _ = writeln!(
            out,
            "{}) {} | Dept: {} | Session: {} | UDP known={} | lastSeen={}",
            session.ordinal,
            session.identity.campus,
            session.identity.department,
            session.handle,
            u8::from(session.liveness.is_known()),
            session.liveness.last_seen_display(CONSOLE_TIME_FORMAT)
        );
    }
    out.push_str("------------------------------");
    out
}
