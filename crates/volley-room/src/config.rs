//! Room configuration.

use serde::{Deserialize, Serialize};
use volley_physics::PhysicsConfig;

/// Default command channel size for room actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Settings shared by every room the registry creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Field geometry and ball behaviour.
    pub physics: PhysicsConfig,

    /// Goals needed to win. Once a side reaches it the match is over.
    pub win_score: u32,

    /// Simulation rate in Hz. 0 means event-driven: the ball only moves
    /// when a player sends an update.
    pub tick_rate_hz: u32,

    /// Capacity of each room actor's command queue. Senders wait when it
    /// is full.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            win_score: 5,
            tick_rate_hz: 0,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}
