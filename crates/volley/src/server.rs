//! `VolleyServer` builder and server loop.
//!
//! This is the entry point for running a Volley server. It ties together
//! all the layers: transport → protocol → router → rooms, plus the
//! liveness reaper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use volley_protocol::JsonCodec;
use volley_room::{RoomConfig, SessionRegistry};
use volley_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Reaper, Router, ServerConfig, VolleyError};

/// Builder for configuring and starting a Volley server.
///
/// # Example
///
/// ```rust,no_run
/// use volley::prelude::*;
///
/// # async fn start() -> Result<(), VolleyError> {
/// let server = VolleyServer::builder()
///     .bind("0.0.0.0:8080")
///     .tick_rate(20)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct VolleyServerBuilder {
    config: ServerConfig,
}

impl VolleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets the per-room settings.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Sets the room simulation rate; 0 keeps rooms event-driven.
    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.config.room.tick_rate_hz = hz;
        self
    }

    pub fn reaper_interval(mut self, interval: Duration) -> Self {
        self.config.reaper_interval = interval;
        self
    }

    pub fn player_timeout(mut self, timeout: Duration) -> Self {
        self.config.player_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// [`VolleyError::Transport`] if the address can't be bound.
    pub async fn build(self) -> Result<VolleyServer, VolleyError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        let registry = Arc::new(SessionRegistry::new(self.config.room.clone()));
        let router = Arc::new(Router::new(Arc::clone(&registry)));

        Ok(VolleyServer {
            transport,
            router,
            config: self.config,
        })
    }
}

impl Default for VolleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Volley server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct VolleyServer {
    transport: WebSocketTransport,
    router: Arc<Router<JsonCodec>>,
    config: ServerConfig,
}

impl VolleyServer {
    /// Creates a new builder.
    pub fn builder() -> VolleyServerBuilder {
        VolleyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry, shared with the running server.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(self.router.registry())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the reaper and the accept loop.
    ///
    /// Spawns a handler task for each connection. Runs until the process
    /// is terminated.
    pub async fn run(self) -> Result<(), VolleyError> {
        let reaper = Reaper::new(
            self.registry(),
            self.config.reaper_interval,
            self.config.player_timeout,
        );
        let reaper_task = tokio::spawn(reaper.run());

        tracing::info!(bind = %self.config.bind, "Volley server running");
        let result = accept_loop(self.transport, self.router).await;
        reaper_task.abort();
        result
    }
}

/// Accepts connections forever, one handler task each. A failed accept
/// (a bad WebSocket handshake, say) is logged and skipped.
async fn accept_loop<T, C>(mut transport: T, router: Arc<Router<C>>) -> Result<(), VolleyError>
where
    T: Transport,
    C: volley_protocol::Codec,
{
    loop {
        match transport.accept().await {
            Ok(conn) => {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(conn, router).await {
                        tracing::debug!(error = %e, "connection ended with error");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}
