use crate::{
    metrics::ServerMetrics,
    network::{
        session::{deliver, outbound_channel, SessionHandle},
        LineReader, LineWriter, RegistryError, Result, ServerError,
    },
    protocol::{request_error_reply, AuthReply, HandshakeRequest, SessionIdentity},
    server::RelayState,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};

impl RelayState {
    /// Runs the credentials handshake for a fresh connection and, on success,
    /// serves the session until its stream ends.
    ///
    /// Returns `Err` only for connections that never became a session; a
    /// registered session's disconnect is a normal `Ok(())`.
    pub async fn handle_connection<S>(
        state: Arc<RelayState>,
        stream: S,
        peer: SocketAddr,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = LineReader::new(read_half, state.config.limits.max_line_len());
        let mut writer = LineWriter::new(write_half);

        let line = match reader
            .read_line_within(Some(state.config.handshake_timeout))
            .await
        {
            Ok(Some(line)) => line,
            Ok(None) => return Err(ServerError::Timeout(peer)),
            Err(ServerError::Protocol(err)) => {
                writer.write_line(AuthReply::BadFormat.as_str()).await?;
                return Err(err.into());
            }
            Err(err) => return Err(err),
        };

        let handshake = match HandshakeRequest::parse(&line, &state.config.limits) {
            Ok(handshake) => handshake,
            Err(err) => {
                tracing::warn!("Bad credentials line from {}: {}", peer, err);
                writer.write_line(AuthReply::BadFormat.as_str()).await?;
                return Err(err.into());
            }
        };

        if let Err(err) = state.auth.verify_handshake(&handshake) {
            ServerMetrics::incr(&state.metrics.auth_failures);
            tracing::warn!("Authentication FAILED for {}", handshake.identity);
            writer.write_line(AuthReply::Failed.as_str()).await?;
            return Err(err.into());
        }

        let identity = handshake.identity;
        let (outbound, rx) = outbound_channel(state.config.outbound_queue);
        let replies = outbound.clone();

        let handle = match state.registry.register(identity.clone(), outbound) {
            Ok(handle) => handle,
            Err(err) => {
                ServerMetrics::incr(&state.metrics.rejected_sessions);
                let reply = match err {
                    RegistryError::CapacityExceeded { .. } => AuthReply::ServerFull,
                    RegistryError::DuplicateIdentity(_) => AuthReply::AlreadyConnected,
                };
                tracing::warn!("Rejecting {}: {}", identity, err);
                writer.write_line(reply.as_str()).await?;
                return Err(err.into());
            }
        };
        state.metrics.set_active_sessions(state.registry.len());

        // AUTH_OK goes out before the writer task starts draining forwards.
        if let Err(err) = writer.write_line(AuthReply::Ok.as_str()).await {
            state.registry.remove(handle);
            state.metrics.set_active_sessions(state.registry.len());
            return Err(err);
        }
        tracing::info!(
            "{} authenticated and session {} started ({})",
            identity,
            handle,
            peer
        );

        let writer_task = tokio::spawn(run_writer(writer, rx, handle));
        let reason = serve_session(&state, &mut reader, &replies, handle, &identity, peer).await;

        state.registry.remove(handle);
        state.metrics.set_active_sessions(state.registry.len());
        writer_task.abort();

        match reason {
            ServerError::ConnectionClosed => {
                tracing::info!("{} disconnected", identity)
            }
            other => tracing::info!("{} removed: {}", identity, other),
        }
        Ok(())
    }
}

/// Reads request lines until the stream fails; returns why it stopped.
async fn serve_session<R>(
    state: &RelayState,
    reader: &mut LineReader<R>,
    replies: &mpsc::Sender<String>,
    handle: SessionHandle,
    identity: &SessionIdentity,
    peer: SocketAddr,
) -> ServerError
where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.read_line_within(state.config.idle_timeout).await {
            Ok(Some(line)) => {
                tracing::debug!("[{}] >> {}", identity, line);
                if let Some(reply) = state.router.dispatch(identity, &line) {
                    deliver(replies, handle, reply);
                }
            }
            Ok(None) => return ServerError::Timeout(peer),
            Err(ServerError::Protocol(err)) => {
                tracing::warn!("Rejected line from {}: {}", identity, err);
                deliver(replies, handle, request_error_reply(&err));
            }
            Err(err) => return err,
        }
    }
}

async fn run_writer<W>(
    mut writer: LineWriter<W>,
    mut rx: mpsc::Receiver<String>,
    handle: SessionHandle,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_line(&line).await {
            tracing::debug!("Write to session {} failed: {}", handle, e);
            break;
        }
    }
}
