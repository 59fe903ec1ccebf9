//! Parley chat server.
//!
//! Multiplexes many polling clients onto one shared message log.
//!
//! ## Architecture
//!
//! ```text
//! parley-server
//!   ├─ Server            (TCP accept loop, one task per connection)
//!   ├─ transport         (frame decode, blocking-pool dispatch)
//!   ├─ handler           (Request -> Gateway -> Response)
//!   ├─ Gateway           (session policy: auth, limits, cooldown)
//!   ├─ SessionRegistry   (session keys -> per-session state)
//!   └─ MessageStore      (parley-core: ordered, persistent log)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod gateway;
mod handler;
mod registry;
mod session;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use error::ServerError;
pub use gateway::{
    DEFAULT_MAX_USERNAME_CHARS, DEFAULT_POLL_INTERVAL, Gateway, GatewayConfig, GatewayError,
};
pub use handler::{Flow, handle_request};
use parley_core::{Backend, Clock, MessageStore, Storage, StorageConfig, SystemClock};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{Session, SessionId, SessionState};
use tokio::net::TcpListener;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "127.0.0.1:7878")
    pub bind_address: String,
    /// Where messages are persisted
    pub storage: StorageConfig,
    /// Gateway limits and cadence
    pub gateway: GatewayConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7878".to_string(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Production Parley server.
///
/// Wraps a [`Gateway`] with a TCP listener.
#[derive(Debug)]
pub struct Server<S, C> {
    gateway: Arc<Gateway<S, C>>,
    listener: TcpListener,
}

impl Server<Backend, SystemClock> {
    /// Open the configured storage and bind a new server.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The storage backend cannot be opened
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let storage = config.storage.open()?;
        let store = Arc::new(MessageStore::new(storage));
        let gateway = Gateway::new(store, SystemClock::new(), config.gateway);
        Self::with_gateway(&config.bind_address, gateway).await
    }
}

impl<S, C> Server<S, C>
where
    S: Storage + 'static,
    C: Clock,
{
    /// Bind a server around an existing gateway.
    pub async fn with_gateway(
        bind_address: &str,
        gateway: Gateway<S, C>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| ServerError::Config(format!("cannot bind {bind_address}: {e}")))?;
        Ok(Self { gateway: Arc::new(gateway), listener })
    }

    /// The gateway serving this listener.
    pub fn gateway(&self) -> &Arc<Gateway<S, C>> {
        &self.gateway
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections until an error stops the
    /// listener.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Server starting on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Server shutting down");
                    return Ok(());
                },
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("New connection from {}", peer);
                        let gateway = Arc::clone(&self.gateway);

                        tokio::spawn(async move {
                            if let Err(e) = transport::serve_connection(stream, gateway).await {
                                tracing::debug!("Connection {} ended with error: {}", peer, e);
                            }
                        });
                    },
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
            }
        }
    }
}
