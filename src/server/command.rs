//! Orchestrator commands and reply types.
//!
//! Request/response commands carry a `oneshot` sender for the result.
//! Fan-out commands are fire-and-forget.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::AppError;
use crate::history::PendingLoad;
use crate::message::ServerMessage;
use crate::session::Session;
use crate::shutdown::ShutdownWaiter;
use crate::types::SessionId;

/// Commands sent from sessions (through `ServerHandle`) to the `ChatServer` actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Admit a freshly handshaken session
    Join {
        session: Arc<dyn Session>,
        respond_to: oneshot::Sender<Result<(), AppError>>,
    },
    /// A session finished; remove it from every registry
    Leave {
        id: SessionId,
        respond_to: oneshot::Sender<()>,
    },
    /// Claim a nickname
    RegisterNickname {
        id: SessionId,
        nickname: String,
        respond_to: oneshot::Sender<Result<(), AppError>>,
    },
    /// Enter (or create) a room; replies with the decorated roster
    JoinRoom {
        id: SessionId,
        room: String,
        respond_to: oneshot::Sender<Result<Vec<String>, AppError>>,
    },
    /// Leave the named room
    LeaveRoom {
        id: SessionId,
        room: String,
        respond_to: oneshot::Sender<Result<(), AppError>>,
    },
    /// Deliver to every session except `sender`
    Broadcast {
        message: ServerMessage,
        sender: Option<SessionId>,
    },
    /// Deliver to every member of `room` except `sender`
    BroadcastToRoom {
        room: String,
        message: ServerMessage,
        sender: Option<SessionId>,
    },
    /// Chat payload, routed to the sender's room or globally
    Chat { id: SessionId, body: String },
    /// `/pm`
    PrivateMessage {
        id: SessionId,
        target: String,
        body: String,
        respond_to: oneshot::Sender<Result<(), AppError>>,
    },
    /// `/history`; the load is queued behind earlier chat appends
    History {
        id: SessionId,
        limit: usize,
        respond_to: oneshot::Sender<Result<HistoryRequest, AppError>>,
    },
    /// `/users`
    ListUsers {
        id: SessionId,
        respond_to: oneshot::Sender<Vec<UserSummary>>,
    },
    /// Registry counts for the health endpoint
    Status {
        respond_to: oneshot::Sender<ServerStatus>,
    },
    /// Begin shutdown; replies with a waiter on the drain barrier
    Shutdown {
        respond_to: oneshot::Sender<ShutdownWaiter>,
    },
}

/// One `/users` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub name: String,
    pub is_self: bool,
}

/// A `/history` load queued by the orchestrator
#[derive(Debug)]
pub struct HistoryRequest {
    /// Room the history was taken from, `None` for the global log
    pub room: Option<String>,
    pub pending: PendingLoad,
}

/// Snapshot of the registries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    /// Sessions in the session set
    pub sessions: usize,
    /// Sessions holding a live nickname
    pub identified: usize,
    pub rooms: usize,
    /// Shutdown has begun
    pub stopped: bool,
}
