//! TCP listener for the relay.
//!
//! The server:
//! - Binds one TCP socket at startup (failure is fatal to the caller)
//! - Spawns a session task for each accepted connection
//! - Stops accepting when its CancellationToken is cancelled
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │  (per client)   │     └────────┬────────┘
//! └───────┬─────────┘              │ Outbound lines
//!         │                        ▼
//!         │               ┌─────────────────┐
//!         └──────────────▶│  writer task    │
//!                         │  (per client)   │
//!                         └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop keeps accepting

mod connection;

pub use connection::{
    serve_connection, spawn_writer, ConnectionError, ConnectionHandler, SessionExit,
    DEFAULT_MAX_LINE_LENGTH,
};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use relay_core::SessionId;

use crate::registry::RegistryHandle;

/// Default bind address (all interfaces, the relay's well-known port).
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:12345";

/// TCP server for the relay.
pub struct RelayServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Handle to the name registry
    registry: RegistryHandle,

    /// Cancellation token for shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating session IDs
    connection_counter: AtomicU64,

    /// Maximum accepted line length for every session
    max_line_length: usize,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to listen on (port 0 picks a free port)
    /// * `registry` - Handle to the name registry
    /// * `cancel_token` - Token for shutdown
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let bind_error = |e: std::io::Error| ServerError::Bind {
            addr,
            error: e.to_string(),
        };

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        })
    }

    /// Overrides the maximum accepted line length.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop until the cancellation token is triggered.
    ///
    /// Sessions already running are not drained; they end with the process.
    pub async fn run(&self) {
        info!(addr = %self.local_addr, "Relay server listening");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, SessionId::new(conn_num));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Spawns the session task for a new connection.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, session_id: SessionId) {
        info!(session_id = %session_id, peer = %peer, "Accepted connection");

        let registry = self.registry.clone();
        let max_line_length = self.max_line_length;

        tokio::spawn(serve_connection(stream, session_id, registry, max_line_length));
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },
}
