//! XMPP session worker with the tokio mpsc command/notification pattern.
//!
//! The session runs in a dedicated tokio task. The rest of the bridge talks
//! to it through an [`XmppHandle`] (commands in) and a notification receiver
//! (inbound room messages out). Session failures never leave the task: they
//! are logged and the connect sequence restarts after a backoff delay.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use dcxmpp_shared::constants::PRESENCE_STATUS;
use dcxmpp_shared::MessageKind;
use dcxmpp_store::SharedDatabase;

use crate::backoff::{Backoff, BackoffConfig};
use crate::error::NetError;
use crate::session::{XmppClient, XmppEvent};

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the session task.
#[derive(Debug)]
pub enum XmppCommand {
    /// Join a MUC room under the bridge nick.
    JoinRoom(String),
    /// Leave a MUC room.
    LeaveRoom(String),
    /// Send a groupchat message to a room.
    SendGroupMessage { room: String, body: String },
    /// Request the occupant nicks of a room.
    RoomMembers {
        room: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Stop the worker for good.
    Shutdown,
}

/// Notifications sent *from* the session task to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmppNotification {
    Message {
        room: String,
        nick: String,
        kind: MessageKind,
        body: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    SessionActive,
}

/// Settings for the session worker.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jid: String,
    pub password: String,
    /// Nick used in every joined room.
    pub nick: String,
    pub reconnect: BackoffConfig,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable access to the session task.
#[derive(Clone)]
pub struct XmppHandle {
    cmd_tx: mpsc::Sender<XmppCommand>,
    state: watch::Receiver<SessionState>,
    nick: String,
}

impl XmppHandle {
    /// The nick the bridge uses in rooms.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolve once the session reaches `target`.
    pub async fn wait_for_state(&self, target: SessionState) -> Result<(), NetError> {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| NetError::WorkerGone)
    }

    pub async fn join_channel(&self, room: &str) -> Result<(), NetError> {
        self.send(XmppCommand::JoinRoom(room.to_string())).await
    }

    pub async fn leave_channel(&self, room: &str) -> Result<(), NetError> {
        self.send(XmppCommand::LeaveRoom(room.to_string())).await
    }

    pub async fn send_group_message(&self, room: &str, body: &str) -> Result<(), NetError> {
        self.send(XmppCommand::SendGroupMessage {
            room: room.to_string(),
            body: body.to_string(),
        })
        .await
    }

    /// Occupant nicks of `room`; empty while the session is down.
    pub async fn list_room_members(&self, room: &str) -> Result<Vec<String>, NetError> {
        let (reply, rx) = oneshot::channel();
        self.send(XmppCommand::RoomMembers {
            room: room.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NetError::WorkerGone)
    }

    pub async fn shutdown(&self) -> Result<(), NetError> {
        self.send(XmppCommand::Shutdown).await
    }

    async fn send(&self, cmd: XmppCommand) -> Result<(), NetError> {
        self.cmd_tx.send(cmd).await.map_err(|_| NetError::WorkerGone)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the session worker.
///
/// `build` runs inside the worker to construct the client. The call returns
/// only after the worker has done so, so nothing can be relayed before the
/// handle exists.
///
/// # Returns
///
/// `(handle, notification_rx)`
pub async fn spawn_supervisor<C, F>(
    build: F,
    config: SessionConfig,
    store: SharedDatabase,
) -> Result<(XmppHandle, mpsc::Receiver<XmppNotification>), NetError>
where
    C: XmppClient,
    F: FnOnce(&SessionConfig) -> C + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel::<XmppCommand>(256);
    let (notif_tx, notif_rx) = mpsc::channel::<XmppNotification>(256);
    let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
    let (ready_tx, ready_rx) = oneshot::channel::<()>();

    let nick = config.nick.clone();

    tokio::spawn(async move {
        let client = build(&config);
        let _ = ready_tx.send(());

        let supervisor = Supervisor {
            backoff: Backoff::new(config.reconnect),
            client,
            config,
            store,
            cmd_rx,
            notif_tx,
            state_tx,
        };
        supervisor.run().await;
    });

    ready_rx.await.map_err(|_| NetError::WorkerGone)?;

    Ok((
        XmppHandle {
            cmd_tx,
            state: state_rx,
            nick,
        },
        notif_rx,
    ))
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

enum SessionEnd {
    Disconnected,
    Shutdown,
}

enum Step {
    Command(Option<XmppCommand>),
    Event(Result<XmppEvent, NetError>),
}

struct Supervisor<C> {
    client: C,
    config: SessionConfig,
    store: SharedDatabase,
    cmd_rx: mpsc::Receiver<XmppCommand>,
    notif_tx: mpsc::Sender<XmppNotification>,
    state_tx: watch::Sender<SessionState>,
    backoff: Backoff,
}

impl<C: XmppClient> Supervisor<C> {
    async fn run(mut self) {
        loop {
            self.set_state(SessionState::Connecting);
            info!(jid = %self.config.jid, "Starting XMPP bridge");

            let outcome = self.run_session().await;
            self.set_state(SessionState::Disconnected);
            self.client.disconnect().await;

            match outcome {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Disconnected) => info!("XMPP bridge disconnected"),
                Err(e) => error!(error = %e, "XMPP session failed"),
            }

            let delay = self.backoff.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
            if let SessionEnd::Shutdown = self.wait_offline(delay).await {
                break;
            }
        }

        info!("XMPP session worker terminated");
    }

    async fn run_session(&mut self) -> Result<SessionEnd, NetError> {
        self.client
            .connect(&self.config.jid, &self.config.password)
            .await?;

        // Connected but not yet started: commands get the offline treatment.
        let mut active = false;

        loop {
            let step = tokio::select! {
                cmd = self.cmd_rx.recv() => Step::Command(cmd),
                event = self.client.next_event() => Step::Event(event),
            };

            match step {
                Step::Command(None) | Step::Command(Some(XmppCommand::Shutdown)) => {
                    info!("XMPP worker shutdown requested");
                    return Ok(SessionEnd::Shutdown);
                }
                Step::Command(Some(cmd)) if active => self.handle_online(cmd).await,
                Step::Command(Some(cmd)) => self.handle_offline(cmd),
                Step::Event(event) => match event? {
                    XmppEvent::SessionStarted => {
                        self.on_session_start().await?;
                        active = true;
                    }
                    XmppEvent::Message {
                        room,
                        nick,
                        kind,
                        body,
                    } => {
                        debug!(room = %room, nick = %nick, kind = kind.as_attr(), "Incoming XMPP message");
                        let _ = self
                            .notif_tx
                            .send(XmppNotification::Message {
                                room,
                                nick,
                                kind,
                                body,
                            })
                            .await;
                    }
                    XmppEvent::Disconnected => return Ok(SessionEnd::Disconnected),
                },
            }
        }
    }

    /// Announce presence and re-join every known channel.
    async fn on_session_start(&mut self) -> Result<(), NetError> {
        debug!("XMPP session started");
        self.client.send_presence(PRESENCE_STATUS).await?;
        self.client.fetch_roster().await?;

        let rooms = match self.store.with(|db| db.channel_names()) {
            Ok(rooms) => rooms,
            Err(e) => {
                error!(error = %e, "Failed to read channels, skipping rejoin");
                Vec::new()
            }
        };

        for room in &rooms {
            debug!(room = %room, "Joining XMPP channel");
            if let Err(e) = self.client.join_muc(room, &self.config.nick).await {
                warn!(room = %room, error = %e, "Failed to rejoin channel");
            }
        }

        info!(count = rooms.len(), "XMPP session active");
        self.backoff.reset();
        self.set_state(SessionState::SessionActive);
        Ok(())
    }

    async fn handle_online(&mut self, cmd: XmppCommand) {
        let nick = self.config.nick.as_str();
        match cmd {
            XmppCommand::JoinRoom(room) => {
                debug!(room = %room, "Joining XMPP channel");
                if let Err(e) = self.client.join_muc(&room, nick).await {
                    error!(room = %room, error = %e, "Join failed");
                }
            }
            XmppCommand::LeaveRoom(room) => {
                debug!(room = %room, "Leaving XMPP channel");
                if let Err(e) = self.client.leave_muc(&room, nick).await {
                    error!(room = %room, error = %e, "Leave failed");
                }
            }
            XmppCommand::SendGroupMessage { room, body } => {
                if let Err(e) = self
                    .client
                    .send_message(&room, &body, MessageKind::Groupchat)
                    .await
                {
                    error!(room = %room, error = %e, "Send failed");
                }
            }
            XmppCommand::RoomMembers { room, reply } => {
                let members = match self.client.room_roster(&room).await {
                    Ok(members) => members.into_iter().filter(|m| !m.is_empty()).collect(),
                    Err(e) => {
                        warn!(room = %room, error = %e, "Roster query failed");
                        Vec::new()
                    }
                };
                let _ = reply.send(members);
            }
            XmppCommand::Shutdown => {}
        }
    }

    /// Sleep out the backoff delay while still answering commands.
    async fn wait_offline(&mut self, delay: Duration) -> SessionEnd {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            let cmd = tokio::select! {
                _ = &mut sleep => return SessionEnd::Disconnected,
                cmd = self.cmd_rx.recv() => cmd,
            };

            match cmd {
                None | Some(XmppCommand::Shutdown) => return SessionEnd::Shutdown,
                Some(cmd) => self.handle_offline(cmd),
            }
        }
    }

    fn handle_offline(&self, cmd: XmppCommand) {
        match cmd {
            // Rooms are re-joined from the store on the next session start.
            XmppCommand::JoinRoom(_) | XmppCommand::LeaveRoom(_) => {}
            XmppCommand::SendGroupMessage { room, .. } => {
                warn!(room = %room, "XMPP session not active, dropping message");
            }
            XmppCommand::RoomMembers { reply, .. } => {
                let _ = reply.send(Vec::new());
            }
            XmppCommand::Shutdown => {}
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }
}
