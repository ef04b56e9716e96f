//! Message router: turns decoded client messages into room commands.
//!
//! The router is shared by every connection. Per-connection state (the
//! outbox and the rooms this connection joined) lives in [`ClientLink`],
//! which the connection handler owns.
//!
//! Every reply the router produces, including errors and pongs, goes out
//! through the connection's outbox. That keeps it in order with the room
//! broadcasts queued on the same channel.

use std::sync::Arc;

use tracing::debug;
use volley_protocol::{
    ClientMessage, Codec, GameId, JsonCodec, LeaveReason, PlayerId, ProtocolError, ServerMessage,
    unix_millis,
};
use volley_room::{RoomError, RoomHandle, SessionRegistry};
use volley_session::Outbox;
use volley_transport::Inbound;

use crate::VolleyError;

/// A `(game, player)` pair joined over one connection.
#[derive(Clone)]
pub struct Membership {
    pub game_id: GameId,
    pub player_id: PlayerId,
    handle: RoomHandle,
    /// The joining connection's outbox; identifies it to the room.
    owner: Outbox,
}

/// Per-connection routing state.
pub struct ClientLink {
    outbox: Outbox,
    memberships: Vec<Membership>,
}

impl ClientLink {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            outbox,
            memberships: Vec::new(),
        }
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    fn forget(&mut self, game_id: &GameId, player_id: &PlayerId) {
        self.memberships
            .retain(|m| !(m.game_id == *game_id && m.player_id == *player_id));
    }

    /// Empties the membership list, for cleanup that outlives the link.
    pub(crate) fn take_memberships(&mut self) -> Vec<Membership> {
        std::mem::take(&mut self.memberships)
    }
}

/// Routes client messages to rooms.
pub struct Router<C: Codec = JsonCodec> {
    registry: Arc<SessionRegistry>,
    codec: C,
}

impl Router<JsonCodec> {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_codec(registry, JsonCodec)
    }
}

impl<C: Codec> Router<C> {
    pub fn with_codec(registry: Arc<SessionRegistry>, codec: C) -> Self {
        Self { registry, codec }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Handles one raw inbound text message.
    ///
    /// Failures become an `error` message on the sender's outbox; the
    /// connection stays open.
    pub async fn handle_text(&self, link: &mut ClientLink, text: &str) {
        let result = match self.decode(text) {
            Ok(msg) => self.dispatch(link, msg).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            reject(link, &e);
        }
    }

    /// Handles one frame from the transport. A frame that isn't text is
    /// answered like any other malformed message.
    pub async fn handle_frame(&self, link: &mut ClientLink, frame: Inbound) {
        match frame {
            Inbound::Text(text) => self.handle_text(link, &text).await,
            Inbound::Malformed(why) => reject(link, &ProtocolError::InvalidMessage(why).into()),
        }
    }

    fn decode(&self, text: &str) -> Result<ClientMessage, VolleyError> {
        let msg: ClientMessage = self.codec.decode(text)?;
        msg.validate()?;
        Ok(msg)
    }

    /// Applies one decoded client message.
    ///
    /// # Errors
    /// Whatever the target room rejects the message with, or
    /// [`RoomError::UnknownGame`] if no such room exists.
    pub async fn dispatch(&self, link: &mut ClientLink, msg: ClientMessage) -> Result<(), VolleyError> {
        match msg {
            ClientMessage::Join {
                game_id,
                player_id,
                role,
                name,
            } => {
                let (handle, joined) = self
                    .registry
                    .join(&game_id, player_id.clone(), role, name, link.outbox.clone())
                    .await?;
                debug!(%game_id, %player_id, role = %joined.assigned_role, "join routed");
                link.memberships.push(Membership {
                    game_id,
                    player_id,
                    handle,
                    owner: link.outbox.clone(),
                });
            }

            ClientMessage::Update {
                game_id,
                player_id,
                position,
            } => {
                self.registry
                    .require(&game_id)
                    .await?
                    .update_position(player_id, position)
                    .await?;
            }

            ClientMessage::Action {
                game_id,
                player_id,
                action,
                payload,
            } => {
                let outcome = self
                    .registry
                    .require(&game_id)
                    .await?
                    .action(player_id, action, payload)
                    .await?;
                debug!(%game_id, ?outcome, "action routed");
            }

            ClientMessage::Chat {
                game_id,
                player_id,
                message,
            } => {
                self.registry
                    .require(&game_id)
                    .await?
                    .chat(player_id, message)
                    .await?;
            }

            ClientMessage::Leave { game_id, player_id } => {
                let handle = self.registry.require(&game_id).await?;
                let result = handle.leave(player_id.clone(), LeaveReason::Left).await;
                link.forget(&game_id, &player_id);
                self.after_leave(&handle, result?).await;
            }

            ClientMessage::Ping {
                game_id,
                player_id,
                client_time,
            } => {
                if let (Some(game_id), Some(player_id)) = (game_id, player_id) {
                    self.touch(&game_id, player_id).await;
                }
                let pong = ServerMessage::Pong {
                    client_time,
                    server_time: unix_millis(),
                };
                link.outbox.deliver(pong)?;
            }
        }
        Ok(())
    }

    /// Refreshes a member's activity clock. Unknown games or players are
    /// not an error for a ping.
    async fn touch(&self, game_id: &GameId, player_id: PlayerId) {
        let Some(handle) = self.registry.get(game_id).await else {
            return;
        };
        if let Err(e) = handle.touch(player_id).await {
            debug!(%game_id, error = %e, "ping did not touch a member");
        }
    }

    /// Drops the room from the registry once its last member is gone.
    async fn after_leave(&self, handle: &RoomHandle, remaining: usize) {
        if remaining == 0 {
            self.registry
                .remove_if_retired(handle.game_id(), handle)
                .await;
        }
    }

    /// Leaves every room the connection joined, as if the client had sent
    /// `leave` for each with reason `disconnected`.
    pub async fn disconnect(&self, link: &mut ClientLink) {
        leave_all(&self.registry, link.take_memberships()).await;
    }
}

/// Sends `e` back to the client as an `error` message.
fn reject(link: &ClientLink, e: &VolleyError) {
    debug!(error = %e, code = e.code(), "rejected client message");
    let reply = ServerMessage::Error {
        code: e.code(),
        message: e.to_string(),
    };
    if link.outbox.deliver(reply).is_err() {
        debug!("error reply dropped, connection gone");
    }
}

/// Removes each membership from its room. Players already gone (evicted
/// by the reaper, say) are skipped, and so is a player id that has since
/// rejoined over a different connection.
pub(crate) async fn leave_all(registry: &SessionRegistry, memberships: Vec<Membership>) {
    for m in memberships {
        match m
            .handle
            .leave_owned(m.player_id.clone(), m.owner.clone(), LeaveReason::Disconnected)
            .await
        {
            Ok(0) => {
                registry.remove_if_retired(&m.game_id, &m.handle).await;
            }
            Ok(_) => {}
            Err(RoomError::UnknownPlayer(_) | RoomError::Unavailable(_)) => {
                debug!(game_id = %m.game_id, player_id = %m.player_id, "already gone");
                registry.remove_if_retired(&m.game_id, &m.handle).await;
            }
            Err(e) => debug!(game_id = %m.game_id, error = %e, "leave on disconnect failed"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::Receiver;
    use volley_protocol::{Role, Vec2};
    use volley_room::RoomConfig;

    use super::*;

    fn router() -> Router {
        Router::new(Arc::new(SessionRegistry::new(RoomConfig::default())))
    }

    fn link() -> (ClientLink, Receiver<ServerMessage>) {
        let (outbox, rx) = Outbox::channel();
        (ClientLink::new(outbox), rx)
    }

    fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn last_error(rx: &mut Receiver<ServerMessage>) -> Option<(u16, String)> {
        drain(rx).into_iter().rev().find_map(|m| match m {
            ServerMessage::Error { code, message } => Some((code, message)),
            _ => None,
        })
    }

    async fn join(router: &Router, link: &mut ClientLink, game: &str, player: &str) {
        router
            .handle_text(
                link,
                &format!(r#"{{"type":"join","gameId":"{game}","playerId":"{player}"}}"#),
            )
            .await;
    }

    #[tokio::test]
    async fn test_garbage_gets_400_and_connection_state_survives() {
        let r = router();
        let (mut l, mut rx) = link();

        r.handle_text(&mut l, "{not json").await;
        assert_eq!(last_error(&mut rx).map(|e| e.0), Some(400));

        r.handle_text(&mut l, r#"{"type":"teleport","gameId":"g"}"#).await;
        assert_eq!(last_error(&mut rx).map(|e| e.0), Some(400));

        r.handle_text(&mut l, r#"{"type":"join","gameId":"","playerId":"p"}"#).await;
        assert_eq!(last_error(&mut rx).map(|e| e.0), Some(400));

        join(&r, &mut l, "g", "p").await;
        assert!(matches!(drain(&mut rx).first(), Some(ServerMessage::Joined { .. })));
    }

    #[tokio::test]
    async fn test_non_text_frame_gets_400_and_nothing_is_relayed() {
        let r = router();
        let (mut member, mut member_rx) = link();
        join(&r, &mut member, "g", "a").await;
        drain(&mut member_rx);

        r.handle_frame(&mut member, Inbound::Malformed("binary frame is not UTF-8".into()))
            .await;

        let msgs = drain(&mut member_rx);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::Error { code: 400, message }] if message.contains("UTF-8")
        ));

        r.handle_frame(&mut member, Inbound::Text(r#"{"type":"ping"}"#.into()))
            .await;
        assert!(matches!(drain(&mut member_rx).as_slice(), [ServerMessage::Pong { .. }]));
    }

    #[tokio::test]
    async fn test_join_records_membership() {
        let r = router();
        let (mut l, _rx) = link();

        join(&r, &mut l, "g", "p").await;

        assert_eq!(l.memberships().len(), 1);
        assert_eq!(l.memberships()[0].game_id, GameId::from("g"));
    }

    #[tokio::test]
    async fn test_update_to_unknown_game_is_404() {
        let r = router();
        let (mut l, mut rx) = link();

        r.handle_text(
            &mut l,
            r#"{"type":"update","gameId":"nope","playerId":"p","position":{"x":1,"y":1}}"#,
        )
        .await;

        let (code, message) = last_error(&mut rx).unwrap();
        assert_eq!(code, 404);
        assert!(message.contains("nope"));
    }

    #[tokio::test]
    async fn test_invalid_position_is_400() {
        let r = router();
        let (mut l, mut rx) = link();
        join(&r, &mut l, "g", "p").await;
        drain(&mut rx);

        r.handle_text(
            &mut l,
            r#"{"type":"update","gameId":"g","playerId":"p","position":{"x":-5,"y":10}}"#,
        )
        .await;

        assert_eq!(last_error(&mut rx).map(|e| e.0), Some(400));
    }

    #[tokio::test]
    async fn test_third_join_is_409() {
        let r = router();
        let (mut l, mut rx) = link();
        join(&r, &mut l, "g", "a").await;
        join(&r, &mut l, "g", "b").await;
        drain(&mut rx);

        join(&r, &mut l, "g", "c").await;

        assert_eq!(last_error(&mut rx).map(|e| e.0), Some(409));
        assert_eq!(l.memberships().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_from_stranger_errors_only_to_sender() {
        let r = router();
        let (mut member, mut member_rx) = link();
        let (mut stranger, mut stranger_rx) = link();
        join(&r, &mut member, "g", "a").await;
        drain(&mut member_rx);

        r.handle_text(
            &mut stranger,
            r#"{"type":"chat","gameId":"g","playerId":"x","message":"hi"}"#,
        )
        .await;

        assert_eq!(last_error(&mut stranger_rx).map(|e| e.0), Some(404));
        assert!(drain(&mut member_rx).is_empty());
    }

    #[tokio::test]
    async fn test_ping_always_pongs() {
        let r = router();
        let (mut l, mut rx) = link();

        r.handle_text(&mut l, r#"{"type":"ping","clientTime":42}"#).await;
        r.handle_text(&mut l, r#"{"type":"ping","gameId":"nope","playerId":"p"}"#)
            .await;

        let msgs = drain(&mut rx);
        assert!(matches!(
            msgs.as_slice(),
            [
                ServerMessage::Pong { client_time: Some(42), .. },
                ServerMessage::Pong { client_time: None, .. },
            ]
        ));
    }

    #[tokio::test]
    async fn test_leave_forgets_membership_and_drops_empty_room() {
        let r = router();
        let (mut l, _rx) = link();
        join(&r, &mut l, "g", "p").await;

        r.handle_text(&mut l, r#"{"type":"leave","gameId":"g","playerId":"p"}"#)
            .await;

        assert!(l.memberships().is_empty());
        assert!(r.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_disconnect_leaves_every_room() {
        let r = router();
        let (mut l, _rx) = link();
        let (mut other, mut other_rx) = link();
        join(&r, &mut other, "g1", "friend").await;
        join(&r, &mut l, "g1", "p").await;
        join(&r, &mut l, "g2", "p").await;
        drain(&mut other_rx);

        r.disconnect(&mut l).await;

        assert!(l.memberships().is_empty());
        assert_eq!(r.registry().game_ids().await, vec![GameId::from("g1")]);
        let msgs = drain(&mut other_rx);
        assert!(matches!(
            &msgs[0],
            ServerMessage::UserLeft { reason: LeaveReason::Disconnected, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_connection_disconnect_spares_rejoined_player() {
        let r = router();
        let (mut friend, mut friend_rx) = link();
        let (mut old, _old_rx) = link();
        join(&r, &mut friend, "g", "friend").await;
        join(&r, &mut old, "g", "alice").await;

        // Only friend stays active; the reaper evicts alice.
        tokio::time::advance(Duration::from_secs(35)).await;
        r.handle_text(&mut friend, r#"{"type":"ping","gameId":"g","playerId":"friend"}"#)
            .await;
        let reaper = crate::Reaper::new(
            Arc::clone(r.registry()),
            Duration::from_secs(10),
            Duration::from_secs(30),
        );
        let reports = reaper.sweep_once().await;
        assert_eq!(reports[0].evicted, vec![PlayerId::from("alice")]);

        let (mut fresh, mut fresh_rx) = link();
        join(&r, &mut fresh, "g", "alice").await;
        assert!(matches!(drain(&mut fresh_rx).first(), Some(ServerMessage::Joined { .. })));
        drain(&mut friend_rx);

        r.disconnect(&mut old).await;

        let snap = r.registry().require(&"g".into()).await.unwrap().snapshot().await.unwrap();
        let ids: Vec<&str> = snap.players.iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["friend", "alice"]);
        assert!(
            !drain(&mut friend_rx)
                .iter()
                .any(|m| matches!(m, ServerMessage::UserLeft { .. }))
        );

        r.disconnect(&mut fresh).await;
        let snap = r.registry().require(&"g".into()).await.unwrap().snapshot().await.unwrap();
        assert_eq!(snap.players.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_update_moves_player() {
        let r = router();
        let (mut l, _rx) = link();
        join(&r, &mut l, "g", "p").await;

        r.dispatch(
            &mut l,
            ClientMessage::Update {
                game_id: "g".into(),
                player_id: "p".into(),
                position: Vec2::new(50.0, 60.0),
            },
        )
        .await
        .unwrap();

        let snap = r.registry().require(&"g".into()).await.unwrap().snapshot().await.unwrap();
        assert_eq!(snap.players[0].position, Vec2::new(50.0, 60.0));
        assert_eq!(snap.players[0].role, Role::Player1);
    }
}
