//! Ball state and the per-tick integration step.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{PhysicsConfig, Vec2};

/// A team, and the goal line it defends.
///
/// Red defends the left line (`x = 0`), blue the right line (`x = width`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    /// The other team.
    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

/// Position and velocity of the ball.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Ball {
    /// A motionless ball at the centre of the field.
    pub fn at_rest(config: &PhysicsConfig) -> Self {
        Self {
            position: config.center(),
            velocity: Vec2::ZERO,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }
}

/// Result of one [`advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub ball: Ball,
    /// The side that scored during this tick, if any.
    pub goal: Option<Side>,
}

/// Puts the ball back at the centre, moving away from `conceded`'s goal line.
///
/// The horizontal speed is fixed; the vertical component is drawn
/// uniformly from `[-serve_spread, serve_spread]`.
pub fn serve<R: Rng + ?Sized>(
    conceded: Side,
    config: &PhysicsConfig,
    rng: &mut R,
) -> Ball {
    let vx = match conceded {
        Side::Red => config.serve_speed,
        Side::Blue => -config.serve_speed,
    };
    let spread = config.serve_spread.abs();
    let vy = if spread > 0.0 {
        rng.random_range(-spread..=spread)
    } else {
        0.0
    };
    Ball {
        position: config.center(),
        velocity: Vec2::new(vx, vy),
    }
}

/// Advances the ball by one tick.
///
/// `paddles` are the current player positions; a paddle within reach of
/// the ball when it crosses a goal line blocks the goal. While
/// `goals_armed` is `false` (goal cooldown) crossings bounce as well, so a
/// single shot can never be counted twice.
pub fn advance<R: Rng + ?Sized>(
    ball: &Ball,
    paddles: &[Vec2],
    config: &PhysicsConfig,
    goals_armed: bool,
    rng: &mut R,
) -> Step {
    let mut next = *ball;
    next.position += next.velocity;

    if next.position.y <= 0.0 {
        next.position.y = -next.position.y;
        next.velocity.y = next.velocity.y.abs();
        next.velocity = next.velocity * config.restitution;
    } else if next.position.y >= config.height {
        next.position.y = 2.0 * config.height - next.position.y;
        next.velocity.y = -next.velocity.y.abs();
        next.velocity = next.velocity * config.restitution;
    }

    let mut goal = None;
    let conceded = if next.position.x <= 0.0 {
        Some(Side::Red)
    } else if next.position.x >= config.width {
        Some(Side::Blue)
    } else {
        None
    };

    if let Some(conceded) = conceded {
        let intercepted = paddles
            .iter()
            .any(|p| p.distance(next.position) <= config.reach());

        if goals_armed && !intercepted {
            goal = Some(conceded.opponent());
            next = serve(conceded, config, rng);
        } else {
            match conceded {
                Side::Red => {
                    next.position.x = -next.position.x;
                    next.velocity.x = next.velocity.x.abs();
                }
                Side::Blue => {
                    next.position.x = 2.0 * config.width - next.position.x;
                    next.velocity.x = -next.velocity.x.abs();
                }
            }
            next.velocity = next.velocity * config.restitution;
        }
    }

    next.velocity = next.velocity * config.friction;
    next.position = config.clamp(next.position);

    Step { ball: next, goal }
}

/// Applies a shot from a player standing at `shooter`.
///
/// Returns `None` when the ball is out of reach; the caller treats that
/// as a no-op.
pub fn shoot(ball: &Ball, shooter: Vec2, config: &PhysicsConfig) -> Option<Ball> {
    let offset = ball.position - shooter;
    if offset.length() > config.reach() {
        return None;
    }
    let mut next = *ball;
    next.velocity += offset * config.shoot_factor;
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_side_opponent_and_display() {
        assert_eq!(Side::Red.opponent(), Side::Blue);
        assert_eq!(Side::Blue.opponent(), Side::Red);
        assert_eq!(Side::Blue.to_string(), "blue");
    }

    #[test]
    fn test_side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Red).unwrap(), "\"red\"");
    }

    #[test]
    fn test_serve_without_spread_is_purely_horizontal() {
        let cfg = PhysicsConfig {
            serve_spread: 0.0,
            ..PhysicsConfig::default()
        };
        let ball = serve(Side::Blue, &cfg, &mut rng());
        assert_eq!(ball.position, cfg.center());
        assert_eq!(ball.velocity, Vec2::new(-cfg.serve_speed, 0.0));
    }

    #[test]
    fn test_advance_integrates_then_damps() {
        let cfg = PhysicsConfig::default();
        let ball = Ball {
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::new(2.0, -1.0),
        };
        let step = advance(&ball, &[], &cfg, true, &mut rng());
        assert_eq!(step.goal, None);
        assert_eq!(step.ball.position, Vec2::new(102.0, 99.0));
        assert_eq!(step.ball.velocity, Vec2::new(2.0 * 0.99, -1.0 * 0.99));
    }
}
