//! Room actor: an isolated Tokio task that owns a [`GameSession`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Message handlers and reaper sweeps all become
//! commands on the same queue, so one room's state is only ever touched
//! by one command at a time while different rooms run in parallel.
//!
//! A room retires (its task exits) as soon as a removal leaves it empty.
//! Commands still queued at that point are dropped, and their callers see
//! [`RoomError::Unavailable`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use volley_protocol::{GameId, LeaveReason, PlayerId, Role, Snapshot, Vec2};
use volley_session::Outbox;
use volley_tick::{TickConfig, TickScheduler};

use crate::{ActionOutcome, GameSession, Joined, RoomConfig, RoomError};

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel: the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        role: Option<Role>,
        name: Option<String>,
        outbox: Outbox,
        reply: oneshot::Sender<Result<Joined, RoomError>>,
    },

    Update {
        player_id: PlayerId,
        position: Vec2,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Action {
        player_id: PlayerId,
        action: String,
        payload: Option<serde_json::Value>,
        reply: oneshot::Sender<Result<ActionOutcome, RoomError>>,
    },

    Chat {
        player_id: PlayerId,
        message: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Leave {
        player_id: PlayerId,
        reason: LeaveReason,
        /// When set, only leave if the player is reached through this outbox.
        owner: Option<Outbox>,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    Touch {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Sweep {
        timeout: Duration,
        reply: oneshot::Sender<SweepReport>,
    },

    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },

    Shutdown,
}

/// Result of a liveness sweep over one room.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub game_id: GameId,
    /// Players removed for inactivity.
    pub evicted: Vec<PlayerId>,
    /// Members left after the sweep.
    pub remaining: usize,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The
/// [`SessionRegistry`](crate::SessionRegistry) holds one per room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    game_id: GameId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    /// `true` once the actor has retired or shut down.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// `true` if both handles point at the same actor.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.game_id.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        role: Option<Role>,
        name: Option<String>,
        outbox: Outbox,
    ) -> Result<Joined, RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            role,
            name,
            outbox,
            reply,
        })
        .await?
    }

    pub async fn update_position(&self, player_id: PlayerId, position: Vec2) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Update {
            player_id,
            position,
            reply,
        })
        .await?
    }

    pub async fn action(
        &self,
        player_id: PlayerId,
        action: String,
        payload: Option<serde_json::Value>,
    ) -> Result<ActionOutcome, RoomError> {
        self.request(|reply| RoomCommand::Action {
            player_id,
            action,
            payload,
            reply,
        })
        .await?
    }

    pub async fn chat(&self, player_id: PlayerId, message: String) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Chat {
            player_id,
            message,
            reply,
        })
        .await?
    }

    /// Removes a player. Returns the number of members left; at zero the
    /// room has retired.
    pub async fn leave(&self, player_id: PlayerId, reason: LeaveReason) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave {
            player_id,
            reason,
            owner: None,
            reply,
        })
        .await?
    }

    /// Removes a player only if it is still reached through `owner`, the
    /// outbox of the connection that joined it.
    pub async fn leave_owned(
        &self,
        player_id: PlayerId,
        owner: Outbox,
        reason: LeaveReason,
    ) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave {
            player_id,
            reason,
            owner: Some(owner),
            reply,
        })
        .await?
    }

    pub async fn touch(&self, player_id: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Touch { player_id, reply })
            .await?
    }

    pub async fn sweep(&self, timeout: Duration) -> Result<SweepReport, RoomError> {
        self.request(|reply| RoomCommand::Sweep { timeout, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Tells the room to stop without notifying its members.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    session: GameSession,
    receiver: mpsc::Receiver<RoomCommand>,
    scheduler: TickScheduler,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or retirement.
    async fn run(mut self) {
        let game_id = self.session.id().clone();
        tracing::info!(%game_id, tick_period = ?self.scheduler.period(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd) {
                        break;
                    }
                }
                _ = self.scheduler.wait_for_tick() => {
                    self.session.tick();
                    self.scheduler.record_tick_end();
                    if self.session.outcome().is_some() {
                        self.scheduler.pause();
                    }
                }
            }
        }

        tracing::info!(%game_id, "room actor stopped");
    }

    /// Handles one command. Returns `true` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                player_id,
                role,
                name,
                outbox,
                reply,
            } => {
                let result = self.session.join(player_id, role, name.as_deref(), outbox);
                let _ = reply.send(result);
            }
            RoomCommand::Update {
                player_id,
                position,
                reply,
            } => {
                let result = self.session.update_position(&player_id, position);
                let _ = reply.send(result);
            }
            RoomCommand::Action {
                player_id,
                action,
                payload,
                reply,
            } => {
                let result = self.session.action(&player_id, &action, payload.as_ref());
                let _ = reply.send(result);
            }
            RoomCommand::Chat {
                player_id,
                message,
                reply,
            } => {
                let result = self.session.chat(&player_id, message);
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                player_id,
                reason,
                owner,
                reply,
            } => {
                let result = match owner {
                    Some(owner) => self.session.leave_owned(&player_id, &owner, reason),
                    None => self.session.leave(&player_id, reason),
                };
                let retire = matches!(result, Ok(0));
                return self.reply_and_maybe_retire(reply, result, retire);
            }
            RoomCommand::Touch { player_id, reply } => {
                let _ = reply.send(self.session.touch(&player_id));
            }
            RoomCommand::Sweep { timeout, reply } => {
                let evicted = self.session.sweep(timeout);
                let report = SweepReport {
                    game_id: self.session.id().clone(),
                    evicted: evicted.into_iter().map(|p| p.id).collect(),
                    remaining: self.session.players().len(),
                };
                let retire = !report.evicted.is_empty() && report.remaining == 0;
                return self.reply_and_maybe_retire(reply, report, retire);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            RoomCommand::Shutdown => {
                tracing::info!(game_id = %self.session.id(), "room shutting down");
                return true;
            }
        }
        false
    }

    /// Closes the queue before replying when retiring, so by the time the
    /// caller sees the reply, [`RoomHandle::is_closed`] is already `true`.
    fn reply_and_maybe_retire<T>(&mut self, reply: oneshot::Sender<T>, value: T, retire: bool) -> bool {
        if retire {
            tracing::info!(game_id = %self.session.id(), "room empty, retiring");
            self.receiver.close();
        }
        let _ = reply.send(value);
        retire
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `config.channel_size` controls backpressure: when the queue fills up,
/// senders wait.
pub(crate) fn spawn_room(game_id: GameId, config: RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let scheduler = TickScheduler::new(TickConfig::with_rate(config.tick_rate_hz));

    let actor = RoomActor {
        session: GameSession::new(game_id.clone(), config),
        receiver: rx,
        scheduler,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        game_id,
        sender: tx,
    }
}
