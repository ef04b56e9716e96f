//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use volley_room::RoomConfig;

use crate::VolleyError;

/// Everything needed to start a [`VolleyServer`](crate::VolleyServer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// Settings applied to every room.
    pub room: RoomConfig,

    /// How often the liveness reaper sweeps the rooms.
    pub reaper_interval: Duration,

    /// Players silent for longer than this are evicted.
    pub player_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_owned(),
            room: RoomConfig::default(),
            reaper_interval: Duration::from_secs(10),
            player_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `VOLLEY_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `VOLLEY_BIND` | `bind` |
    /// | `VOLLEY_TICK_RATE` | `room.tick_rate_hz` |
    /// | `VOLLEY_WIN_SCORE` | `room.win_score` |
    /// | `VOLLEY_PLAYER_TIMEOUT_SECS` | `player_timeout` |
    ///
    /// # Errors
    /// [`VolleyError::Config`] if a numeric variable doesn't parse.
    pub fn from_env() -> Result<Self, VolleyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VolleyError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("VOLLEY_BIND") {
            config.bind = bind;
        }
        if let Some(hz) = parse(&lookup, "VOLLEY_TICK_RATE")? {
            config.room.tick_rate_hz = hz;
        }
        if let Some(score) = parse(&lookup, "VOLLEY_WIN_SCORE")? {
            config.room.win_score = score;
        }
        if let Some(secs) = parse(&lookup, "VOLLEY_PLAYER_TIMEOUT_SECS")? {
            config.player_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, VolleyError> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| VolleyError::Config(format!("{key}={raw:?} is not a valid number")))
        })
        .transpose()
}
