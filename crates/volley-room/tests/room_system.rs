//! Integration tests for room actors and the session registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use volley_protocol::{GameId, LeaveReason, PlayerId, Role, ServerMessage, Vec2};
use volley_room::{ActionOutcome, RoomConfig, RoomError, SessionRegistry};
use volley_session::Outbox;

fn registry() -> SessionRegistry {
    SessionRegistry::new(RoomConfig::default())
}

fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test]
async fn test_first_join_creates_room() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, mut rx) = Outbox::channel();

    let (handle, joined) = reg
        .join(&game, "alice".into(), None, Some("Alice".into()), outbox)
        .await
        .unwrap();

    assert_eq!(handle.game_id(), &game);
    assert_eq!(joined.assigned_role, Role::Player1);
    assert_eq!(joined.snapshot.players.len(), 1);
    assert_eq!(reg.len().await, 1);
    assert!(matches!(rx.recv().await, Some(ServerMessage::Joined { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_get_distinct_roles_and_third_is_rejected() {
    let reg = Arc::new(registry());
    let game = GameId::from("race");

    let mut tasks = Vec::new();
    let mut receivers = Vec::new();
    for i in 0..3 {
        let reg = Arc::clone(&reg);
        let game = game.clone();
        let (outbox, rx) = Outbox::channel();
        receivers.push(rx);
        tasks.push(tokio::spawn(async move {
            reg.join(&game, PlayerId(format!("p{i}")), None, None, outbox)
                .await
                .map(|(_, joined)| joined.assigned_role)
        }));
    }

    let mut roles = Vec::new();
    let mut full = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(role) => roles.push(role),
            Err(RoomError::RoomFull(_)) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    roles.sort_by_key(|r| *r == Role::Player2);
    assert_eq!(roles, vec![Role::Player1, Role::Player2]);
    assert_eq!(full, 1);
    assert_eq!(reg.len().await, 1, "exactly one room for the id");
}

#[tokio::test]
async fn test_duplicate_player_is_rejected() {
    let reg = registry();
    let game = GameId::from("g1");
    let (o1, _r1) = Outbox::channel();
    let (o2, _r2) = Outbox::channel();

    reg.join(&game, "a".into(), None, None, o1).await.unwrap();
    let err = reg.join(&game, "a".into(), None, None, o2).await.unwrap_err();

    assert!(matches!(err, RoomError::DuplicatePlayer(_)));
}

// =========================================================================
// Operations through the handle
// =========================================================================

#[tokio::test]
async fn test_invalid_position_leaves_stored_position_unchanged() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, _rx) = Outbox::channel();
    let (handle, joined) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();
    let before = joined.snapshot.players[0].position;

    let err = handle
        .update_position("a".into(), Vec2::new(-5.0, 10.0))
        .await
        .unwrap_err();

    assert!(matches!(err, RoomError::InvalidPosition(_)));
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.players[0].position, before);
}

#[tokio::test]
async fn test_valid_update_is_broadcast() {
    let reg = registry();
    let game = GameId::from("g1");
    let (oa, mut ra) = Outbox::channel();
    let (ob, mut rb) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, oa).await.unwrap();
    reg.join(&game, "b".into(), None, None, ob).await.unwrap();
    drain(&mut ra);
    drain(&mut rb);

    handle
        .update_position("a".into(), Vec2::new(100.0, 120.0))
        .await
        .unwrap();

    for rx in [&mut ra, &mut rb] {
        let msgs = drain(rx);
        let [ServerMessage::StateUpdate(snap)] = msgs.as_slice() else {
            panic!("expected one state update, got {msgs:?}");
        };
        assert_eq!(snap.players[0].position, Vec2::new(100.0, 120.0));
    }
}

#[tokio::test]
async fn test_out_of_range_shoot_is_noop() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, mut rx) = Outbox::channel();
    let (handle, joined) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();
    drain(&mut rx);

    let outcome = handle.action("a".into(), "shoot".into(), None).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Missed);
    assert_eq!(handle.snapshot().await.unwrap().ball, joined.snapshot.ball);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_chat_from_unregistered_sender_reaches_nobody() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, mut rx) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();
    drain(&mut rx);

    let err = handle.chat("intruder".into(), "hi".into()).await.unwrap_err();

    assert!(matches!(err, RoomError::UnknownPlayer(_)));
    assert!(drain(&mut rx).is_empty());
}

// =========================================================================
// Leaving and retirement
// =========================================================================

#[tokio::test]
async fn test_last_leave_retires_room() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, _rx) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();

    let remaining = handle.leave("a".into(), LeaveReason::Left).await.unwrap();

    assert_eq!(remaining, 0);
    assert!(handle.is_closed());
    assert!(reg.remove_if_retired(&game, &handle).await);
    assert!(reg.get(&game).await.is_none());
    assert!(reg.is_empty().await);
}

#[tokio::test]
async fn test_join_after_retirement_gets_fresh_room() {
    let reg = registry();
    let game = GameId::from("g1");
    let (o1, _r1) = Outbox::channel();
    let (old, _) = reg.join(&game, "a".into(), None, None, o1).await.unwrap();
    old.leave("a".into(), LeaveReason::Left).await.unwrap();

    // The retired entry is still in the map; join must not land on it.
    let (o2, _r2) = Outbox::channel();
    let (fresh, joined) = reg.join(&game, "b".into(), None, None, o2).await.unwrap();

    assert!(!fresh.same_room(&old));
    assert_eq!(joined.assigned_role, Role::Player1);
    assert_eq!(reg.len().await, 1);
}

#[tokio::test]
async fn test_remove_if_retired_keeps_live_room() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, _rx) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();

    assert!(!reg.remove_if_retired(&game, &handle).await);
    assert!(reg.get(&game).await.is_some());
}

#[tokio::test]
async fn test_operations_on_unknown_game() {
    let reg = registry();
    let err = reg.require(&"nope".into()).await.err().unwrap();
    assert!(matches!(err, RoomError::UnknownGame(_)));
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let reg = registry();
    let game = GameId::from("g1");
    let (outbox, _rx) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();

    handle.shutdown().await.unwrap();
    let err = handle.touch("a".into()).await.unwrap_err();

    assert!(matches!(err, RoomError::Unavailable(_)));
}

// =========================================================================
// Sweeps
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_evicts_idle_player_and_retires_empty_room() {
    let reg = registry();
    let game = GameId::from("g1");
    let (oa, mut ra) = Outbox::channel();
    let (ob, _rb) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, oa).await.unwrap();
    reg.join(&game, "b".into(), None, None, ob).await.unwrap();

    tokio::time::advance(Duration::from_secs(20)).await;
    handle.touch("a".into()).await.unwrap();
    tokio::time::advance(Duration::from_secs(15)).await;
    drain(&mut ra);

    let report = handle.sweep(Duration::from_secs(30)).await.unwrap();
    assert_eq!(report.evicted, vec![PlayerId::from("b")]);
    assert_eq!(report.remaining, 1);
    let msgs = drain(&mut ra);
    assert!(matches!(&msgs[0], ServerMessage::Chat { system: true, .. }));
    assert!(matches!(
        &msgs[1],
        ServerMessage::UserLeft { reason: LeaveReason::Timeout, .. }
    ));

    tokio::time::advance(Duration::from_secs(31)).await;
    let report = handle.sweep(Duration::from_secs(30)).await.unwrap();
    assert_eq!(report.remaining, 0);
    assert!(handle.is_closed());
    assert!(reg.remove_if_retired(&game, &handle).await);
}

// =========================================================================
// Tick loop
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticking_room_moves_ball_without_updates() {
    let reg = SessionRegistry::new(RoomConfig {
        tick_rate_hz: 20,
        ..RoomConfig::default()
    });
    let game = GameId::from("g1");
    let (outbox, mut rx) = Outbox::channel();
    let (handle, _) = reg.join(&game, "a".into(), None, None, outbox).await.unwrap();

    // Put the paddle next to the ball and kick it.
    handle
        .update_position("a".into(), Vec2::new(380.0, 300.0))
        .await
        .unwrap();
    handle.action("a".into(), "shoot".into(), None).await.unwrap();
    let kicked = handle.snapshot().await.unwrap().ball.position;
    drain(&mut rx);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let moved = handle.snapshot().await.unwrap().ball.position;
    assert!(moved.x > kicked.x);
    assert!(!drain(&mut rx).is_empty(), "ticks broadcast state");
}
