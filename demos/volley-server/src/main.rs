//! Volley server binary.
//!
//! ```text
//! VOLLEY_BIND=0.0.0.0:8080 VOLLEY_TICK_RATE=20 RUST_LOG=volley=debug cargo run -p volley-server
//! ```
//!
//! See [`ServerConfig::from_env`] for every variable read at startup.

use volley::prelude::*;

#[tokio::main]
async fn main() -> Result<(), VolleyError> {
    volley::init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind,
        tick_rate_hz = config.room.tick_rate_hz,
        win_score = config.room.win_score,
        player_timeout = ?config.player_timeout,
        "starting"
    );

    let server = VolleyServer::builder().config(config).build().await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening for WebSocket clients");
    }
    server.run().await
}
