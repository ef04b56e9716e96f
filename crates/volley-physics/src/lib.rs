//! Ball physics for Volley rooms.
//!
//! Everything here is pure: a tick takes the current [`Ball`], the
//! players' positions, and a [`PhysicsConfig`], and returns the next ball
//! plus an optional goal. Randomness (the serve angle after a goal) comes
//! from a caller-supplied RNG so simulations can be replayed from a seed.
//!
//! ```rust
//! use rand::SeedableRng;
//! use volley_physics::{advance, Ball, PhysicsConfig, Vec2};
//!
//! let config = PhysicsConfig::default();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let ball = Ball { position: config.center(), velocity: Vec2::new(3.0, 0.0) };
//!
//! let step = advance(&ball, &[], &config, true, &mut rng);
//! assert!(step.goal.is_none());
//! assert!(step.ball.position.x > ball.position.x);
//! ```

mod ball;
mod config;
mod vec2;

pub use ball::{Ball, Side, Step, advance, serve, shoot};
pub use config::PhysicsConfig;
pub use vec2::Vec2;
