use anyhow::{bail, Context, Result};
use campus_relay::network::{LineReader, LineWriter, ServerError};
use campus_relay::protocol::{AuthReply, LIST_REQUEST};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "test-client")]
#[command(about = "Scripted test client for the campus relay", long_about = None)]
struct Args {
    /// Relay host
    #[arg(long, default_value = "127.0.0.1")]
    server: String,

    /// Relay session (TCP) port
    #[arg(long, default_value = "5000")]
    tcp_port: u16,

    /// Relay liveness (UDP) port
    #[arg(long, default_value = "6000")]
    udp_port: u16,

    /// Local UDP port pings are sent from and broadcasts arrive on
    #[arg(long, default_value = "7000")]
    local_udp_port: u16,

    /// Campus to authenticate as
    #[arg(long, default_value = "Lahore")]
    campus: String,

    /// Department within the campus
    #[arg(long, default_value = "IT")]
    department: String,

    /// Campus password
    #[arg(long, default_value = "NU-LHR-123")]
    password: String,

    /// Seconds between liveness pings
    #[arg(long, default_value = "10")]
    heartbeat_secs: u64,

    /// Message to send, as `TargetCampus,Dept,Message` (repeatable)
    #[arg(long = "send")]
    messages: Vec<String>,

    /// Request the connected-campus listing after sending messages
    #[arg(long)]
    list: bool,

    /// Stop after this many seconds; 0 runs until Ctrl-C
    #[arg(long, default_value = "0")]
    duration_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("test_client={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Campus relay test client v{}", env!("CARGO_PKG_VERSION"));

    let tcp_addr = format!("{}:{}", args.server, args.tcp_port);
    let udp_addr: SocketAddr = tokio::net::lookup_host(format!("{}:{}", args.server, args.udp_port))
        .await?
        .next()
        .context("relay host did not resolve")?;

    let stream = TcpStream::connect(&tcp_addr)
        .await
        .with_context(|| format!("Failed to connect to {tcp_addr}"))?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = LineReader::new(read_half, 64 * 1024);
    let mut writer = LineWriter::new(write_half);

    writer
        .write_line(&format!("{}:{}:{}", args.campus, args.department, args.password))
        .await?;
    let reply = reader.read_line().await?;
    if reply != AuthReply::Ok.as_str() {
        bail!("Relay refused credentials: {reply}");
    }
    tracing::info!("Authenticated as {} {}", args.campus, args.department);

    let socket = Arc::new(
        UdpSocket::bind(("0.0.0.0", args.local_udp_port))
            .await
            .with_context(|| format!("Failed to bind UDP port {}", args.local_udp_port))?,
    );

    let ping = format!("{}|{}", args.campus, args.department);
    tokio::spawn(send_heartbeats(
        socket.clone(),
        udp_addr,
        ping,
        Duration::from_secs(args.heartbeat_secs.max(1)),
    ));
    tokio::spawn(receive_broadcasts(socket));
    let stream_task = tokio::spawn(receive_stream(reader));

    for message in &args.messages {
        writer.write_line(message).await?;
        tracing::info!("Sent: {}", message);
    }
    if args.list {
        writer.write_line(LIST_REQUEST).await?;
    }

    let until = async {
        if args.duration_secs == 0 {
            std::future::pending::<()>().await
        } else {
            tokio::time::sleep(Duration::from_secs(args.duration_secs)).await
        }
    };

    tokio::select! {
        _ = until => tracing::info!("Run time elapsed"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
        _ = stream_task => tracing::warn!("Relay closed the session"),
    }

    tracing::info!("Test client finished");
    Ok(())
}

/// Send `campus|department` pings at a fixed interval
async fn send_heartbeats(socket: Arc<UdpSocket>, relay: SocketAddr, ping: String, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = socket.send_to(ping.as_bytes(), relay).await {
            tracing::warn!("Failed to send heartbeat: {}", e);
        }
    }
}

/// Log operator broadcasts arriving by datagram
async fn receive_broadcasts(socket: Arc<UdpSocket>) {
    let mut buf = vec![0u8; 2048];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, from)) => {
                tracing::info!(
                    "[BROADCAST from {}] {}",
                    from,
                    String::from_utf8_lossy(&buf[..n])
                );
            }
            Err(e) => tracing::warn!("Broadcast receive error: {}", e),
        }
    }
}

/// Log forwarded messages, listings and errors from the session stream
async fn receive_stream(mut reader: LineReader<tokio::net::tcp::OwnedReadHalf>) {
    loop {
        match reader.read_line().await {
            Ok(line) => tracing::info!("<< {}", line),
            Err(ServerError::ConnectionClosed) => break,
            Err(e) => {
                tracing::warn!("Stream error: {}", e);
                break;
            }
        }
    }
}
