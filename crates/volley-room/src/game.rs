//! One match: two players, a ball, a score.
//!
//! [`GameSession`] is plain synchronous state. The room actor owns it and
//! calls into it one command at a time, so nothing here locks or awaits.
//! Every method that changes what clients can see also queues the
//! resulting messages on the members' outboxes before returning.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;
use tracing::{debug, info};
use volley_physics::{Ball, Side, Vec2, advance, shoot};
use volley_protocol::{
    GameId, LeaveReason, PlayerId, Role, SYSTEM_SENDER, Scores, ServerMessage, Snapshot,
    unix_millis,
};
use volley_session::{Outbox, PlayerRegistry, PlayerState};

use crate::{RoomConfig, RoomError};

/// Reply to a successful join.
#[derive(Debug, Clone)]
pub struct Joined {
    pub assigned_role: Role,
    pub snapshot: Snapshot,
}

/// Player actions understood by the room. Anything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shoot,
    NoOp,
}

impl Action {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "shoot" => Self::Shoot,
            _ => Self::NoOp,
        }
    }
}

/// What an action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The ball was kicked.
    Shot,
    /// A shot that didn't connect: out of reach, or the match is over.
    Missed,
    /// An action kind the room doesn't know.
    Ignored,
}

/// Authoritative state of one room.
pub struct GameSession {
    id: GameId,
    config: RoomConfig,
    players: PlayerRegistry,
    ball: Ball,
    scores: Scores,
    outcome: Option<Side>,
    last_goal_at: Option<Instant>,
    rng: StdRng,
}

impl GameSession {
    pub fn new(id: GameId, config: RoomConfig) -> Self {
        Self::with_rng(id, config, StdRng::seed_from_u64(rand::random()))
    }

    /// Like [`new`](Self::new) with a caller-supplied RNG, so serves are
    /// reproducible.
    pub fn with_rng(id: GameId, config: RoomConfig, rng: StdRng) -> Self {
        let ball = Ball::at_rest(&config.physics);
        Self {
            id,
            config,
            players: PlayerRegistry::new(),
            ball,
            scores: Scores::default(),
            outcome: None,
            last_goal_at: None,
            rng,
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Adds a player.
    ///
    /// The joiner gets `joined`, everyone else `user_joined`, then the whole
    /// room a `state_update`.
    ///
    /// # Errors
    /// [`RoomError::DuplicatePlayer`] or [`RoomError::RoomFull`].
    pub fn join(
        &mut self,
        player_id: PlayerId,
        role: Option<Role>,
        name: Option<&str>,
        outbox: Outbox,
    ) -> Result<Joined, RoomError> {
        let (width, height) = (self.config.physics.width, self.config.physics.height);
        // Each side starts in the middle of its own half; red defends x = 0.
        let spawn = |role: Role| match role.side() {
            Side::Red => Vec2::new(width / 4.0, height / 2.0),
            Side::Blue => Vec2::new(3.0 * width / 4.0, height / 2.0),
        };
        let player = self
            .players
            .register(player_id.clone(), role, name, spawn, outbox)
            .map_err(|e| RoomError::from_session(&self.id, e))?;
        let (assigned_role, display_name) = (player.role, player.display_name.clone());

        info!(
            game_id = %self.id,
            %player_id,
            role = %assigned_role,
            side = %assigned_role.side(),
            players = self.players.len(),
            "player joined"
        );

        let snapshot = self.snapshot();
        self.send(
            &player_id,
            ServerMessage::Joined {
                player_id: player_id.clone(),
                assigned_role,
                snapshot: snapshot.clone(),
            },
        );
        self.players.broadcast_except(
            &player_id,
            &ServerMessage::UserJoined {
                game_id: self.id.clone(),
                player_id: player_id.clone(),
                name: display_name,
                role: assigned_role,
            },
        );
        self.players.broadcast(&ServerMessage::StateUpdate(snapshot.clone()));

        Ok(Joined {
            assigned_role,
            snapshot,
        })
    }

    /// Moves a player's paddle, then runs one simulation step.
    ///
    /// Out-of-field and non-finite positions are rejected, never clamped;
    /// the stored position stays as it was.
    ///
    /// # Errors
    /// [`RoomError::UnknownPlayer`] or [`RoomError::InvalidPosition`].
    pub fn update_position(&mut self, player_id: &PlayerId, position: Vec2) -> Result<(), RoomError> {
        self.ensure_member(player_id)?;
        if !self.config.physics.contains(position) {
            debug!(game_id = %self.id, %player_id, ?position, "rejected position");
            return Err(RoomError::InvalidPosition(position));
        }
        self.players
            .set_position(player_id, position)
            .map_err(|e| RoomError::from_session(&self.id, e))?;
        self.touch(player_id)?;

        self.step();
        self.broadcast_state();
        Ok(())
    }

    /// Applies a player action.
    ///
    /// # Errors
    /// [`RoomError::UnknownPlayer`] if the sender isn't in the room.
    pub fn action(
        &mut self,
        player_id: &PlayerId,
        kind: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<ActionOutcome, RoomError> {
        self.touch(player_id)?;

        let outcome = match Action::parse(kind) {
            Action::NoOp => ActionOutcome::Ignored,
            Action::Shoot => self.shoot_from(player_id),
        };
        debug!(
            game_id = %self.id,
            %player_id,
            kind,
            has_payload = payload.is_some(),
            ?outcome,
            "action"
        );

        if outcome == ActionOutcome::Shot {
            self.broadcast_state();
        }
        Ok(outcome)
    }

    fn shoot_from(&mut self, player_id: &PlayerId) -> ActionOutcome {
        if self.outcome.is_some() {
            return ActionOutcome::Missed;
        }
        let Some(shooter) = self.players.get(player_id).map(|p| p.position) else {
            return ActionOutcome::Missed;
        };
        match shoot(&self.ball, shooter, &self.config.physics) {
            Some(ball) => {
                self.ball = ball;
                ActionOutcome::Shot
            }
            None => ActionOutcome::Missed,
        }
    }

    /// Relays a chat line to every member, sender included.
    ///
    /// # Errors
    /// [`RoomError::UnknownPlayer`] if the sender isn't in the room; nothing
    /// is relayed in that case.
    pub fn chat(&mut self, player_id: &PlayerId, message: String) -> Result<(), RoomError> {
        self.touch(player_id)?;
        let sender = self
            .players
            .get(player_id)
            .map(|p| p.display_name.clone())
            .ok_or_else(|| RoomError::UnknownPlayer(player_id.clone()))?;

        self.players.broadcast(&ServerMessage::Chat {
            game_id: self.id.clone(),
            sender,
            player_id: Some(player_id.clone()),
            message,
            system: false,
            timestamp: unix_millis(),
        });
        Ok(())
    }

    /// Removes a player and tells the rest of the room. Returns how many
    /// members remain.
    ///
    /// # Errors
    /// [`RoomError::UnknownPlayer`] if the player isn't in the room.
    pub fn leave(&mut self, player_id: &PlayerId, reason: LeaveReason) -> Result<usize, RoomError> {
        let player = self
            .players
            .remove(player_id)
            .ok_or_else(|| RoomError::UnknownPlayer(player_id.clone()))?;
        self.announce_departure(&player, reason);
        Ok(self.players.len())
    }

    /// Like [`leave`](Self::leave), but only if the player is still reached
    /// through `owner`. Used when a connection goes away: a player id that
    /// has since rejoined over another connection is left alone.
    ///
    /// # Errors
    /// [`RoomError::UnknownPlayer`] if the player isn't in the room under
    /// that connection.
    pub fn leave_owned(
        &mut self,
        player_id: &PlayerId,
        owner: &Outbox,
        reason: LeaveReason,
    ) -> Result<usize, RoomError> {
        if !self.players.owned_by(player_id, owner) {
            return Err(RoomError::UnknownPlayer(player_id.clone()));
        }
        self.leave(player_id, reason)
    }

    /// Refreshes a player's activity clock.
    ///
    /// # Errors
    /// [`RoomError::UnknownPlayer`] if the player isn't in the room.
    pub fn touch(&mut self, player_id: &PlayerId) -> Result<(), RoomError> {
        self.players
            .touch(player_id)
            .map_err(|e| RoomError::from_session(&self.id, e))
    }

    /// Evicts every player idle for longer than `timeout`.
    ///
    /// The remaining members first see a system chat line naming the
    /// evicted player, then the usual `user_left` and `state_update`.
    pub fn sweep(&mut self, timeout: Duration) -> Vec<PlayerState> {
        let stale = self.players.stale(Instant::now(), timeout);
        let mut evicted = Vec::with_capacity(stale.len());

        for id in stale {
            let Some(player) = self.players.remove(&id) else {
                continue;
            };
            info!(game_id = %self.id, player_id = %id, "player timed out");
            self.players.broadcast(&ServerMessage::Chat {
                game_id: self.id.clone(),
                sender: SYSTEM_SENDER.to_owned(),
                player_id: None,
                message: format!("{} timed out", player.display_name),
                system: true,
                timestamp: unix_millis(),
            });
            self.announce_departure(&player, LeaveReason::Timeout);
            evicted.push(player);
        }
        evicted
    }

    /// One autonomous simulation step, for rooms with a tick loop.
    ///
    /// Broadcasts only if the ball moved or someone scored. Returns whether
    /// it broadcast.
    pub fn tick(&mut self) -> bool {
        if self.players.is_empty() || self.outcome.is_some() {
            return false;
        }
        let before = self.ball;
        let goal = self.step();
        let changed = goal.is_some() || self.ball != before;
        if changed {
            self.broadcast_state();
        }
        changed
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// Advances the ball once and applies any goal. No-op after the match
    /// is decided.
    fn step(&mut self) -> Option<Side> {
        if self.outcome.is_some() {
            return None;
        }
        let now = Instant::now();
        let armed = self.goals_armed(now);
        let paddles = self.players.positions();
        let step = advance(&self.ball, &paddles, &self.config.physics, armed, &mut self.rng);
        self.ball = step.ball;
        if let Some(side) = step.goal {
            self.record_goal(side, now);
        }
        step.goal
    }

    fn goals_armed(&self, now: Instant) -> bool {
        self.last_goal_at
            .is_none_or(|at| now.saturating_duration_since(at) >= self.config.physics.goal_cooldown)
    }

    fn record_goal(&mut self, side: Side, now: Instant) {
        let total = self.scores.record_goal(side);
        self.last_goal_at = Some(now);
        info!(
            game_id = %self.id,
            %side,
            red = self.scores.red,
            blue = self.scores.blue,
            "goal"
        );
        if self.outcome.is_none() && total >= self.config.win_score {
            self.outcome = Some(side);
            info!(game_id = %self.id, winner = %side, "match decided");
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn announce_departure(&self, player: &PlayerState, reason: LeaveReason) {
        info!(
            game_id = %self.id,
            player_id = %player.id,
            %reason,
            remaining = self.players.len(),
            "player left"
        );
        self.players.broadcast(&ServerMessage::UserLeft {
            game_id: self.id.clone(),
            player_id: player.id.clone(),
            name: player.display_name.clone(),
            reason,
        });
        self.broadcast_state();
    }

    fn broadcast_state(&self) {
        self.players
            .broadcast(&ServerMessage::StateUpdate(self.snapshot()));
    }

    fn send(&self, player_id: &PlayerId, msg: ServerMessage) {
        if let Err(e) = self.players.send_to(player_id, msg) {
            debug!(game_id = %self.id, %player_id, error = %e, "direct send failed");
        }
    }

    fn ensure_member(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.players.contains(player_id) {
            Ok(())
        } else {
            Err(RoomError::UnknownPlayer(player_id.clone()))
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            game_id: self.id.clone(),
            players: self.players.views(),
            ball: self.ball,
            scores: self.scores,
            outcome: self.outcome,
            timestamp: unix_millis(),
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn outcome(&self) -> Option<Side> {
        self.outcome
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
