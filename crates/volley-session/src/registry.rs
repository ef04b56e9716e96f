//! The per-room player map.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use volley_protocol::{PlayerId, PlayerView, Role, ServerMessage, Vec2};

use crate::{Outbox, PlayerState, SessionError, display_name};

struct Member {
    state: PlayerState,
    outbox: Outbox,
}

/// Tracks the (at most two) players of one room.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ touch() / set_position() ──→ remove()
///                        │                       ↑
///                        └──── stale(timeout) ───┘  (liveness reaper)
/// ```
#[derive(Default)]
pub struct PlayerRegistry {
    members: HashMap<PlayerId, Member>,
}

impl PlayerRegistry {
    /// Number of roles, and so the room capacity.
    pub const CAPACITY: usize = Role::ALL.len();

    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player and gives them a role.
    ///
    /// `requested` is honoured when free; otherwise the remaining role is
    /// assigned. `spawn` supplies the starting position for the role.
    ///
    /// # Errors
    /// - [`SessionError::DuplicatePlayer`] if `id` is already registered
    /// - [`SessionError::RoomFull`] if both roles are taken
    pub fn register(
        &mut self,
        id: PlayerId,
        requested: Option<Role>,
        name: Option<&str>,
        spawn: impl FnOnce(Role) -> Vec2,
        outbox: Outbox,
    ) -> Result<&PlayerState, SessionError> {
        if self.members.contains_key(&id) {
            return Err(SessionError::DuplicatePlayer(id));
        }
        let role = self.assign_role(requested)?;

        let state = PlayerState {
            id: id.clone(),
            display_name: display_name(name),
            role,
            position: spawn(role),
            last_activity: Instant::now(),
        };
        tracing::debug!(player_id = %id, %role, "player registered");

        let member = self.members.entry(id).or_insert(Member { state, outbox });
        Ok(&member.state)
    }

    fn assign_role(&self, requested: Option<Role>) -> Result<Role, SessionError> {
        let free = |role: &Role| !self.members.values().any(|m| m.state.role == *role);
        match requested {
            Some(role) if free(&role) => Ok(role),
            _ => Role::ALL
                .into_iter()
                .find(|r| free(r))
                .ok_or(SessionError::RoomFull),
        }
    }

    /// Removes a player, returning their last state.
    pub fn remove(&mut self, id: &PlayerId) -> Option<PlayerState> {
        self.members.remove(id).map(|m| m.state)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.members.get(id).map(|m| &m.state)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.members.contains_key(id)
    }

    /// `true` if `id` is registered and reached through `outbox`'s
    /// connection. A player id rejoined from another connection is not
    /// owned by the old one.
    pub fn owned_by(&self, id: &PlayerId, outbox: &Outbox) -> bool {
        self.members
            .get(id)
            .is_some_and(|m| m.outbox.same_channel(outbox))
    }

    /// Refreshes a player's activity clock.
    ///
    /// # Errors
    /// [`SessionError::UnknownPlayer`] if the player is not registered.
    pub fn touch(&mut self, id: &PlayerId) -> Result<(), SessionError> {
        let member = self.member_mut(id)?;
        member.state.last_activity = Instant::now();
        Ok(())
    }

    /// Stores a new paddle position. Bounds are the caller's concern.
    ///
    /// # Errors
    /// [`SessionError::UnknownPlayer`] if the player is not registered.
    pub fn set_position(&mut self, id: &PlayerId, position: Vec2) -> Result<(), SessionError> {
        self.member_mut(id)?.state.position = position;
        Ok(())
    }

    fn member_mut(&mut self, id: &PlayerId) -> Result<&mut Member, SessionError> {
        self.members
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownPlayer(id.clone()))
    }

    /// Players not heard from for longer than `timeout` as of `now`.
    pub fn stale(&self, now: Instant, timeout: Duration) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self
            .members
            .values()
            .filter(|m| now.saturating_duration_since(m.state.last_activity) > timeout)
            .map(|m| m.state.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Everyone's public state, player1 first.
    pub fn views(&self) -> Vec<PlayerView> {
        let mut views: Vec<PlayerView> = self.members.values().map(|m| m.state.view()).collect();
        views.sort_by_key(|v| Role::ALL.iter().position(|r| *r == v.role));
        views
    }

    /// Current paddle positions.
    pub fn positions(&self) -> Vec<Vec2> {
        self.members.values().map(|m| m.state.position).collect()
    }

    /// Sends a message to one player.
    ///
    /// # Errors
    /// - [`SessionError::UnknownPlayer`] if the player is not registered
    /// - [`SessionError::RecipientUnreachable`] if their connection is gone
    pub fn send_to(&self, id: &PlayerId, msg: ServerMessage) -> Result<(), SessionError> {
        self.members
            .get(id)
            .ok_or_else(|| SessionError::UnknownPlayer(id.clone()))?
            .outbox
            .deliver(msg)
    }

    /// Sends a message to every member. Returns how many accepted it.
    ///
    /// A member whose connection is gone is skipped; the others still
    /// receive the message.
    pub fn broadcast(&self, msg: &ServerMessage) -> usize {
        self.broadcast_filtered(msg, |_| true)
    }

    /// Like [`broadcast`](Self::broadcast) but skips `except`.
    pub fn broadcast_except(&self, except: &PlayerId, msg: &ServerMessage) -> usize {
        self.broadcast_filtered(msg, |id| id != except)
    }

    fn broadcast_filtered(&self, msg: &ServerMessage, include: impl Fn(&PlayerId) -> bool) -> usize {
        let mut delivered = 0;
        for (id, member) in &self.members {
            if !include(id) {
                continue;
            }
            match member.outbox.deliver(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!(player_id = %id, error = %e, "skipping recipient"),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= Self::CAPACITY
    }
}

// =========================================================================
// Tests
// =========================================================================
