//! # Volley
//!
//! Authoritative real-time session server for two-player ball games.
//!
//! Clients connect over WebSocket and exchange JSON messages. Each game id
//! names a room with two paddles and one ball; the server runs the
//! physics, keeps score, and broadcasts the authoritative state to both
//! players after every change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), VolleyError> {
//!     volley::init_tracing();
//!     let server = VolleyServer::builder()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```

mod config;
mod error;
mod handler;
mod reaper;
mod router;
mod server;

pub use config::ServerConfig;
pub use error::VolleyError;
pub use reaper::Reaper;
pub use router::{ClientLink, Membership, Router};
pub use server::{VolleyServer, VolleyServerBuilder};

/// Installs a `tracing` subscriber that honours `RUST_LOG` and falls back
/// to `info`. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}

pub mod prelude {
    pub use crate::{Reaper, Router, ServerConfig, VolleyError, VolleyServer, VolleyServerBuilder};
    pub use volley_physics::PhysicsConfig;
    pub use volley_protocol::{
        Ball, ClientMessage, GameId, LeaveReason, PlayerId, Role, Scores, ServerMessage, Side,
        Snapshot, Vec2,
    };
    pub use volley_room::{RoomConfig, RoomError, SessionRegistry};
    pub use volley_session::Outbox;
}
