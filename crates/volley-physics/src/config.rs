//! Simulation constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Vec2;

/// Tunable constants for one room's simulation.
///
/// The defaults describe an 800×600 field with a slightly inelastic,
/// slightly damped ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Playfield width. Goal lines sit at `x = 0` and `x = width`.
    pub width: f64,

    /// Playfield height. Side walls sit at `y = 0` and `y = height`.
    pub height: f64,

    pub ball_radius: f64,

    pub player_radius: f64,

    /// Per-tick velocity damping, just under 1.
    pub friction: f64,

    /// Velocity retained after bouncing off a wall or paddle (< 1).
    pub restitution: f64,

    /// Scale applied to the player→ball vector on a shot.
    pub shoot_factor: f64,

    /// Horizontal speed of the ball when it is served after a goal.
    pub serve_speed: f64,

    /// The serve's vertical component is drawn from `[-serve_spread, serve_spread]`.
    pub serve_spread: f64,

    /// Minimum time between two goals. Crossings inside this window bounce.
    pub goal_cooldown: Duration,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            ball_radius: 10.0,
            player_radius: 20.0,
            friction: 0.99,
            restitution: 0.9,
            shoot_factor: 0.15,
            serve_speed: 5.0,
            serve_spread: 3.0,
            goal_cooldown: Duration::from_secs(1),
        }
    }
}

impl PhysicsConfig {
    /// Centre of the playfield.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Whether `pos` lies inside the playfield, edges included.
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.is_finite()
            && (0.0..=self.width).contains(&pos.x)
            && (0.0..=self.height).contains(&pos.y)
    }

    /// Clamps `pos` into the playfield rectangle.
    pub fn clamp(&self, pos: Vec2) -> Vec2 {
        Vec2::new(pos.x.clamp(0.0, self.width), pos.y.clamp(0.0, self.height))
    }

    /// Distance at which a player touches the ball.
    pub fn reach(&self) -> f64 {
        self.player_radius + self.ball_radius
    }
}
