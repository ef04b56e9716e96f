//! Session registry: the one shared map from game id to room actor.

use std::collections::HashMap;

use tokio::sync::Mutex;
use volley_protocol::{GameId, PlayerId, Role};
use volley_session::Outbox;

use crate::room::spawn_room;
use crate::{Joined, RoomConfig, RoomError, RoomHandle};

/// Creates, tracks, and hands out room actors by game id.
///
/// The map sits behind a Tokio mutex that is held only for lookup, create
/// and remove. It is never held while waiting on a room, so a slow room
/// can't block access to the others.
pub struct SessionRegistry {
    rooms: Mutex<HashMap<GameId, RoomHandle>>,
    config: RoomConfig,
}

impl SessionRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the live room for `game_id`, spawning one if there is none.
    ///
    /// Lookup and spawn happen under one lock, so concurrent callers for
    /// the same id always get the same actor. A retired actor still in
    /// the map is replaced.
    pub async fn get_or_create(&self, game_id: &GameId) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(game_id).filter(|h| !h.is_closed()) {
            return handle.clone();
        }
        let handle = spawn_room(game_id.clone(), self.config.clone());
        rooms.insert(game_id.clone(), handle.clone());
        tracing::info!(%game_id, rooms = rooms.len(), "room created");
        handle
    }

    /// Looks up an existing room. Retired rooms count as absent.
    pub async fn get(&self, game_id: &GameId) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .await
            .get(game_id)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// Like [`get`](Self::get) but fails with [`RoomError::UnknownGame`].
    pub async fn require(&self, game_id: &GameId) -> Result<RoomHandle, RoomError> {
        self.get(game_id)
            .await
            .ok_or_else(|| RoomError::UnknownGame(game_id.clone()))
    }

    /// Joins a player to a room, creating the room if needed.
    ///
    /// If the room retired between lookup and join, the stale entry is
    /// dropped and the join is retried once on a fresh room.
    ///
    /// # Errors
    /// Whatever the room's join returns; [`RoomError::Unavailable`] if the
    /// retry also lands on a retired room.
    pub async fn join(
        &self,
        game_id: &GameId,
        player_id: PlayerId,
        role: Option<Role>,
        name: Option<String>,
        outbox: Outbox,
    ) -> Result<(RoomHandle, Joined), RoomError> {
        let handle = self.get_or_create(game_id).await;
        match handle
            .join(player_id.clone(), role, name.clone(), outbox.clone())
            .await
        {
            Err(RoomError::Unavailable(_)) => {
                tracing::debug!(%game_id, %player_id, "room retired during join, retrying");
                self.remove_if_retired(game_id, &handle).await;
                let handle = self.get_or_create(game_id).await;
                let joined = handle.join(player_id, role, name, outbox).await?;
                Ok((handle, joined))
            }
            result => result.map(|joined| (handle, joined)),
        }
    }

    /// Drops the entry for `game_id` unconditionally.
    pub async fn remove(&self, game_id: &GameId) -> Option<RoomHandle> {
        let removed = self.rooms.lock().await.remove(game_id);
        if removed.is_some() {
            tracing::info!(%game_id, "room removed");
        }
        removed
    }

    /// Drops the entry only if it still points at `handle`'s actor and that
    /// actor has retired. Returns whether anything was removed.
    pub async fn remove_if_retired(&self, game_id: &GameId, handle: &RoomHandle) -> bool {
        let mut rooms = self.rooms.lock().await;
        let stale = rooms
            .get(game_id)
            .is_some_and(|current| current.same_room(handle) && current.is_closed());
        if stale {
            rooms.remove(game_id);
            tracing::info!(%game_id, rooms = rooms.len(), "retired room removed");
        }
        stale
    }

    /// Clones of every handle, for callers that need to talk to rooms
    /// without holding the lock.
    pub async fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.lock().await.values().cloned().collect()
    }

    pub async fn game_ids(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.rooms.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
