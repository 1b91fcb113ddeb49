//! ChatServer actor implementation
//!
//! The central actor that owns all shared state: the session set, the
//! nickname index and the room map. It is reached only through
//! `ServerHandle`, which feeds one `mpsc` queue, so every registry
//! mutation and every fan-out happens in submission order on this task.
//!
//! Ownership: `sessions` holds the only strong `Arc` per session. The
//! nickname index and rooms hold `Weak`s and treat an expired or
//! stopped target as absent.

mod command;
mod handle;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use command::{HistoryRequest, ServerCommand, ServerStatus, UserSummary};
pub use handle::ServerHandle;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::history::MessageHistory;
use crate::message::ServerMessage;
use crate::room::Room;
use crate::session::Session;
use crate::shutdown::{ShutdownBarrier, ShutdownWaiter};
use crate::types::{validate_name, NameKind, SessionId};

/// Start the orchestrator and return a handle to it
pub fn spawn(config: ServerConfig, history: Option<MessageHistory>) -> ServerHandle {
    let config = Arc::new(config);
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
    let server = ChatServer::new(cmd_rx, Arc::clone(&config), history);
    tokio::spawn(server.run());
    ServerHandle::new(cmd_tx, config)
}

/// The main ChatServer actor
pub struct ChatServer {
    config: Arc<ServerConfig>,
    /// All admitted sessions: SessionId -> Session (sole strong owner)
    sessions: HashMap<SessionId, Arc<dyn Session>>,
    /// Nickname -> session, non-owning
    nicknames: HashMap<String, Weak<dyn Session>>,
    /// Room name -> Room; only rooms with live members
    rooms: HashMap<String, Room>,
    history: Option<MessageHistory>,
    /// Set once shutdown begins; new admissions are rejected
    stopped: bool,
    barrier: Option<ShutdownBarrier>,
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(
        receiver: mpsc::Receiver<ServerCommand>,
        config: Arc<ServerConfig>,
        history: Option<MessageHistory>,
    ) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            nicknames: HashMap::new(),
            rooms: HashMap::new(),
            history,
            stopped: false,
            barrier: None,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until every handle has been dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.sessions.len(), "ChatServer stopped");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Join {
                session,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_join(session));
            }
            ServerCommand::Leave { id, respond_to } => {
                self.handle_leave(id);
                let _ = respond_to.send(());
            }
            ServerCommand::RegisterNickname {
                id,
                nickname,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_register_nickname(id, nickname));
            }
            ServerCommand::JoinRoom {
                id,
                room,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_join_room(id, room));
            }
            ServerCommand::LeaveRoom {
                id,
                room,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_leave_room(id, &room));
            }
            ServerCommand::Broadcast { message, sender } => {
                if !self.stopped {
                    self.broadcast_all(&message, sender);
                }
            }
            ServerCommand::BroadcastToRoom {
                room,
                message,
                sender,
            } => {
                if self.stopped {
                    return;
                }
                if let Some(room) = self.rooms.get(&room) {
                    room.broadcast(&message, sender);
                }
            }
            ServerCommand::Chat { id, body } => {
                self.handle_chat(id, body);
            }
            ServerCommand::PrivateMessage {
                id,
                target,
                body,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_private_message(id, &target, &body));
            }
            ServerCommand::History {
                id,
                limit,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_history(id, limit));
            }
            ServerCommand::ListUsers { id, respond_to } => {
                let _ = respond_to.send(self.list_users(id));
            }
            ServerCommand::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            ServerCommand::Shutdown { respond_to } => {
                let _ = respond_to.send(self.handle_shutdown());
            }
        }
    }

    /// Admit a session and announce it
    fn handle_join(&mut self, session: Arc<dyn Session>) -> Result<(), AppError> {
        if self.stopped {
            return Err(AppError::ShuttingDown);
        }

        let id = session.id();
        let remote_id = session.remote_id().to_string();
        info!(session = %id, peer = %remote_id, transport = %session.transport(), "Session joined");

        for line in ServerMessage::welcome(&remote_id) {
            let _ = session.send(&line);
        }
        self.sessions.insert(id, session);
        self.broadcast_all(&ServerMessage::Arrived { name: remote_id }, None);

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
        Ok(())
    }

    /// Remove a session from every registry. Safe to call more than once.
    fn handle_leave(&mut self, id: SessionId) {
        let Some(session) = self.sessions.remove(&id) else {
            return;
        };
        let name = session.display_name();

        if let Some(room) = session.current_room() {
            self.remove_from_room(&session, &room);
        }

        if let Some(nickname) = session.nickname() {
            let owned_by_leaver = self
                .nicknames
                .get(&nickname)
                .map(|weak| weak.upgrade().map_or(true, |holder| holder.id() == id))
                .unwrap_or(false);
            if owned_by_leaver {
                self.nicknames.remove(&nickname);
            }
        }

        info!(session = %id, name = %name, "Session left");

        if !self.stopped {
            self.broadcast_all(&ServerMessage::Departed { name }, None);
        }

        if let Some(barrier) = &self.barrier {
            barrier.arrive();
        }

        debug!(
            "Total sessions: {}, Total rooms: {}",
            self.sessions.len(),
            self.rooms.len()
        );
    }

    /// Validate and claim a nickname as one step
    fn handle_register_nickname(&mut self, id: SessionId, nickname: String) -> Result<(), AppError> {
        if self.stopped {
            return Err(AppError::ShuttingDown);
        }
        let session = self.session(id)?;
        validate_name(NameKind::Nickname, &nickname, self.config.max_name_len)?;

        match self.live_holder(&nickname) {
            Some(holder) if holder.id() == id => return Ok(()),
            Some(_) => return Err(AppError::NicknameTaken(nickname)),
            None => {}
        }

        let old_name = session.display_name();
        if let Some(old) = session.nickname() {
            self.nicknames.remove(&old);
        }
        self.nicknames
            .insert(nickname.clone(), Arc::downgrade(&session));
        session.set_nickname(Some(nickname.clone()));
        session.set_authenticated(true);

        info!(session = %id, "Nickname '{}' -> '{}'", old_name, nickname);

        self.broadcast_all(
            &ServerMessage::NicknameAnnounced {
                old: old_name,
                new: nickname,
            },
            Some(id),
        );
        Ok(())
    }

    /// Join or create a room. Returns the roster for the joiner.
    fn handle_join_room(&mut self, id: SessionId, name: String) -> Result<Vec<String>, AppError> {
        if self.stopped {
            return Err(AppError::ShuttingDown);
        }
        let session = self.session(id)?;
        validate_name(NameKind::Room, &name, self.config.max_name_len)?;

        if let Some(current) = session.current_room() {
            return Err(AppError::AlreadyInRoom(current));
        }

        let max_members = self.config.max_room_members;
        let room = self
            .rooms
            .entry(name.clone())
            .or_insert_with(|| Room::new(name.clone(), max_members));

        if let Err(e) = room.add(&session) {
            if room.is_empty() {
                self.rooms.remove(&name);
            }
            return Err(e);
        }
        session.set_current_room(Some(name.clone()));

        room.broadcast(
            &ServerMessage::MemberJoined {
                name: session.display_name(),
            },
            Some(id),
        );
        let roster = room.roster(id);

        info!(session = %id, room = %name, members = roster.len(), "Joined room");
        Ok(roster)
    }

    fn handle_leave_room(&mut self, id: SessionId, name: &str) -> Result<(), AppError> {
        if self.stopped {
            return Err(AppError::ShuttingDown);
        }
        let session = self.session(id)?;
        if session.current_room().as_deref() != Some(name) {
            return Err(AppError::NotInRoom);
        }

        self.remove_from_room(&session, name);
        info!(session = %id, room = %name, "Left room");
        Ok(())
    }

    /// Route a chat payload to the sender's room, or to everyone
    fn handle_chat(&mut self, id: SessionId, body: String) {
        if self.stopped {
            return;
        }
        let Some(session) = self.sessions.get(&id) else {
            return;
        };
        let from = session.display_name();

        match session.current_room() {
            Some(room_name) => {
                let Some(room) = self.rooms.get(&room_name) else {
                    warn!(session = %id, room = %room_name, "Chat for a room that no longer exists");
                    return;
                };
                if let Some(history) = &self.history {
                    history.log_room(&room_name, &from, &body);
                }
                room.broadcast(
                    &ServerMessage::RoomChat {
                        from,
                        room: room_name.clone(),
                        body,
                    },
                    Some(id),
                );
            }
            None => {
                if let Some(history) = &self.history {
                    history.log_global(&from, &body);
                }
                self.broadcast_all(&ServerMessage::Chat { from, body }, Some(id));
            }
        }
    }

    fn handle_private_message(
        &mut self,
        id: SessionId,
        target: &str,
        body: &str,
    ) -> Result<(), AppError> {
        if self.stopped {
            return Err(AppError::ShuttingDown);
        }
        let session = self.session(id)?;
        let Some(receiver) = self.live_holder(target) else {
            return Err(AppError::UserNotFound(target.to_string()));
        };

        let from = session.display_name();
        if let Err(e) = receiver.send(&ServerMessage::PrivateFrom {
            from: from.clone(),
            body: body.to_string(),
        }) {
            debug!(session = %id, "Private message to '{}' not delivered: {}", target, e);
        }
        if let Some(history) = &self.history {
            history.log_private(&from, target, body);
        }
        Ok(())
    }

    /// Queue a history load for the session's current scope
    fn handle_history(&self, id: SessionId, limit: usize) -> Result<HistoryRequest, AppError> {
        let history = self.history.as_ref().ok_or(AppError::HistoryDisabled)?;
        let session = self.session(id)?;
        let room = session.current_room();
        let pending = match &room {
            Some(room) => history.queue_room(room, limit)?,
            None => history.queue_global(limit)?,
        };
        Ok(HistoryRequest { room, pending })
    }

    fn list_users(&self, id: SessionId) -> Vec<UserSummary> {
        let mut users: Vec<UserSummary> = self
            .sessions
            .values()
            .map(|s| UserSummary {
                name: s.display_name(),
                is_self: s.id() == id,
            })
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    fn status(&self) -> ServerStatus {
        ServerStatus {
            sessions: self.sessions.len(),
            identified: self
                .nicknames
                .values()
                .filter(|weak| weak.strong_count() > 0)
                .count(),
            rooms: self.rooms.len(),
            stopped: self.stopped,
        }
    }

    /// Flip to stopped, stop every session and arm the drain barrier
    fn handle_shutdown(&mut self) -> ShutdownWaiter {
        if let Some(barrier) = &self.barrier {
            return barrier.waiter();
        }

        self.stopped = true;
        let barrier = ShutdownBarrier::new(self.sessions.len());
        info!(sessions = self.sessions.len(), "Shutdown started");

        for session in self.sessions.values() {
            session.stop();
        }

        let waiter = barrier.waiter();
        self.barrier = Some(barrier);
        waiter
    }

    /// Take a session out of `room_name`, announce it, drop the room if empty
    fn remove_from_room(&mut self, session: &Arc<dyn Session>, room_name: &str) {
        session.set_current_room(None);
        let Some(room) = self.rooms.get_mut(room_name) else {
            return;
        };
        // A room recreated under the same name never held this session
        if !room.remove(session.id()) {
            return;
        }

        if !self.stopped {
            room.broadcast(
                &ServerMessage::MemberLeft {
                    name: session.display_name(),
                    room: room_name.to_string(),
                },
                Some(session.id()),
            );
        }

        if room.is_empty() {
            self.rooms.remove(room_name);
            debug!("Room {} deleted (empty)", room_name);
        }
    }

    /// Deliver to every session except `sender`. Best effort.
    fn broadcast_all(&self, message: &ServerMessage, sender: Option<SessionId>) -> usize {
        let text = message.to_string();
        let mut delivered = 0;
        for (id, session) in &self.sessions {
            if Some(*id) == sender {
                continue;
            }
            match session.deliver(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(session = %id, "Broadcast delivery skipped: {}", e),
            }
        }
        debug!(delivered, "Global broadcast");
        delivered
    }

    fn session(&self, id: SessionId) -> Result<Arc<dyn Session>, AppError> {
        self.sessions
            .get(&id)
            .cloned()
            .ok_or(AppError::UnknownSession)
    }

    /// Current owner of a nickname, if it is still live
    fn live_holder(&self, nickname: &str) -> Option<Arc<dyn Session>> {
        self.nicknames
            .get(nickname)?
            .upgrade()
            .filter(|session| !session.is_stopped())
    }
}
