use crate::{
    auth::Authenticator,
    broadcast::BroadcastDispatcher,
    config::ServerConfig,
    console::OperatorConsole,
    liveness::LivenessListener,
    metrics::{start_metrics_reporter, ServerMetrics},
    network::{Registry, Result, ServerError},
    router::Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::{TcpListener, UdpSocket};

/// State shared by every connection task.
pub struct RelayState {
    pub config: ServerConfig,
    pub registry: Arc<Registry>,
    pub auth: Authenticator,
    pub router: Router,
    pub metrics: Arc<ServerMetrics>,
}

impl RelayState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(config.max_sessions));
        let metrics = Arc::new(ServerMetrics::default());
        let router = Router::new(
            registry.clone(),
            config.limits,
            config.notify_fallback,
            metrics.clone(),
        );

        Self {
            auth: Authenticator::new(config.auth.clone()),
            registry,
            router,
            metrics,
            config,
        }
    }
}

/// Bound listeners plus the shared state; `run` drives the accept loop.
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
    socket: Arc<UdpSocket>,
}

impl RelayServer {
    /// Binds both endpoints. Failure here is the only fatal server error.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.tcp_bind)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.tcp_bind.clone(),
                source,
            })?;
        let socket = UdpSocket::bind(&config.udp_bind)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.udp_bind.clone(),
                source,
            })?;

        Ok(Self {
            state: Arc::new(RelayState::new(config)),
            listener,
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn datagram_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn state(&self) -> Arc<RelayState> {
        self.state.clone()
    }

    /// Broadcasts go out from the liveness socket, the address clients ping.
    pub fn dispatcher(&self) -> BroadcastDispatcher {
        BroadcastDispatcher::new(
            self.state.registry.clone(),
            self.socket.clone(),
            self.state.metrics.clone(),
        )
    }

    pub fn console(&self) -> OperatorConsole {
        OperatorConsole::new(self.state.registry.clone(), self.dispatcher())
    }

    pub async fn run(self) -> Result<()> {
        let state = self.state;

        tracing::info!("TCP listening on {}", self.listener.local_addr()?);
        tracing::info!("UDP listening on {}", self.socket.local_addr()?);

        let listener = LivenessListener::new(
            self.socket.clone(),
            state.registry.clone(),
            state.config.limits,
            state.metrics.clone(),
        );
        tokio::spawn(listener.run());

        if let Some(period) = state.config.stats_interval {
            tokio::spawn(start_metrics_reporter(state.metrics.clone(), period));
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            ServerMetrics::incr(&state.metrics.connections_accepted);
            tracing::info!("New TCP client {} connected, awaiting credentials", peer);

            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = RelayState::handle_connection(state, stream, peer).await {
                    tracing::info!("Connection from {} ended: {}", peer, e);
                }
            });
        }
    }
}
