use campus_relay::{config::ServerConfig, server::RelayServer};
use std::time::Duration;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run());
    // The console's stdin read occupies a blocking thread that never returns
    // on its own; don't wait for it.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    tracing::info!(
        "Campus relay v{} (max {} sessions)",
        env!("CARGO_PKG_VERSION"),
        config.max_sessions
    );

    let server = RelayServer::bind(config).await?;

    let console = server.console();
    tokio::spawn(async move {
        let input = BufReader::new(tokio::io::stdin());
        if let Err(e) = console.run(input, tokio::io::stdout()).await {
            tracing::warn!("Operator console stopped: {}", e);
        }
    });

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    Ok(())
}
