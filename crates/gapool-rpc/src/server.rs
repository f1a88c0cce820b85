// crates/gapool-rpc/src/server.rs
//
// DispatchServer and ServerConfig.
//
// Accepts TCP connections and gives each one a session: an Outbox
// registered with the broadcaster, a writer task draining it into the
// socket, and a SessionHandler reading requests. Listener failures end the
// server; connection failures end only their session.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use gapool_core::GapoolError;

use crate::outbox::Outbox;
use crate::session::{self, SessionHandler};
use crate::shared::DispatchState;

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for the dispatch server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "127.0.0.1" or "0.0.0.0").
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Pending items allowed in each session's outbound queue.
    pub outbound_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2000,
            outbound_queue_capacity: 8,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// DispatchServer
// ---------------------------------------------------------------------------

/// The line-delimited JSON-RPC server miners connect to.
#[derive(Debug, Clone)]
pub struct DispatchServer {
    config: ServerConfig,
    state: Arc<DispatchState>,
}

impl DispatchServer {
    /// Create a new server over the shared dispatch state.
    pub fn new(config: ServerConfig, state: Arc<DispatchState>) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<DispatchState> {
        &self.state
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GapoolError> {
        let addr = self.config.addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| GapoolError::ListenerFatal(format!("cannot bind {}: {}", addr, e)))
    }

    /// Bind and serve until the listener fails.
    pub async fn start(&self) -> Result<(), GapoolError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` indefinitely.
    ///
    /// Returns only on a listener-level failure.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GapoolError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Gapool dispatch server listening on {}", addr);
        }

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let state = self.state.clone();
                    let capacity = self.config.outbound_queue_capacity;
                    tokio::spawn(async move {
                        handle_connection(state, stream, peer, capacity).await;
                    });
                }
                Err(e) if is_per_connection(&e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                }
                Err(e) => {
                    tracing::error!("Listener failed: {}", e);
                    return Err(GapoolError::ListenerFatal(e.to_string()));
                }
            }
        }
    }
}

/// Accept errors that concern one incoming connection, not the listener.
fn is_per_connection(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Run one session from registration to teardown.
async fn handle_connection(
    state: Arc<DispatchState>,
    stream: TcpStream,
    peer: SocketAddr,
    capacity: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
    }

    let id = Uuid::now_v7();
    let outbox = Arc::new(Outbox::new(capacity));
    state.broadcaster().register(id, outbox.clone()).await;
    tracing::info!(
        session = %id,
        sessions = state.broadcaster().session_count(),
        "New connection from {}",
        peer
    );

    let (reader, writer) = stream.into_split();
    let writer_task = tokio::spawn(session::run_writer(outbox.clone(), writer));

    let handler = SessionHandler::new(id, peer.to_string(), state, outbox);
    if let Err(e) = handler.run(BufReader::new(reader)).await {
        tracing::debug!(session = %id, "Read side ended: {}", e);
    }

    match writer_task.await {
        Ok(Err(e)) => tracing::debug!(session = %id, "Write side ended: {}", e),
        Err(e) => tracing::warn!(session = %id, "Writer task failed: {}", e),
        Ok(Ok(())) => {}
    }
}
