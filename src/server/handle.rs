//! Client interface for the `ChatServer` actor.
//!
//! `ServerHandle` is cheap to clone and is what listeners and sessions
//! hold. Every method funnels into the actor's single command queue, so
//! registry mutations happen in submission order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use super::command::{ServerCommand, ServerStatus, UserSummary};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::session::Session;
use crate::shutdown::ShutdownReport;
use crate::types::SessionId;

/// Handle for interacting with the orchestrator
#[derive(Debug, Clone)]
pub struct ServerHandle {
    sender: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
}

impl ServerHandle {
    pub(crate) fn new(sender: mpsc::Sender<ServerCommand>, config: Arc<ServerConfig>) -> Self {
        Self { sender, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Recent history for the session's room, or the global log.
    ///
    /// Goes through the actor so that every chat line the session sent
    /// before is already appended. Returns the room (if any) and the lines.
    pub async fn recent_history(
        &self,
        id: SessionId,
        limit: usize,
    ) -> Result<(Option<String>, Vec<String>), AppError> {
        let request = self
            .request(|respond_to| ServerCommand::History {
                id,
                limit,
                respond_to,
            })
            .await??;
        let lines = request.pending.lines().await?;
        Ok((request.room, lines))
    }

    /// Send a request and wait for the actor's reply
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ServerCommand,
    ) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| AppError::ChannelSend)?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    async fn notify(&self, cmd: ServerCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }

    /// Admit a session: welcome sequence plus global arrival notice.
    ///
    /// # Errors
    /// - `AppError::ShuttingDown` once shutdown has begun
    pub async fn join(&self, session: Arc<dyn Session>) -> Result<(), AppError> {
        self.request(|respond_to| ServerCommand::Join {
            session,
            respond_to,
        })
        .await?
    }

    /// Remove a session from every registry. Returns once it is done.
    pub async fn leave(&self, id: SessionId) -> Result<(), AppError> {
        self.request(|respond_to| ServerCommand::Leave { id, respond_to })
            .await
    }

    /// Validate and claim `nickname` in one step
    pub async fn register_nickname(
        &self,
        id: SessionId,
        nickname: String,
    ) -> Result<(), AppError> {
        self.request(|respond_to| ServerCommand::RegisterNickname {
            id,
            nickname,
            respond_to,
        })
        .await?
    }

    /// Join or create `room`. Returns the roster with the caller last.
    pub async fn join_room(&self, id: SessionId, room: String) -> Result<Vec<String>, AppError> {
        self.request(|respond_to| ServerCommand::JoinRoom {
            id,
            room,
            respond_to,
        })
        .await?
    }

    pub async fn leave_room(&self, id: SessionId, room: String) -> Result<(), AppError> {
        self.request(|respond_to| ServerCommand::LeaveRoom {
            id,
            room,
            respond_to,
        })
        .await?
    }

    pub async fn broadcast(
        &self,
        message: ServerMessage,
        sender: Option<SessionId>,
    ) -> Result<(), AppError> {
        self.notify(ServerCommand::Broadcast { message, sender })
            .await
    }

    pub async fn broadcast_to_room(
        &self,
        room: String,
        message: ServerMessage,
        sender: Option<SessionId>,
    ) -> Result<(), AppError> {
        self.notify(ServerCommand::BroadcastToRoom {
            room,
            message,
            sender,
        })
        .await
    }

    /// Route a chat payload to the sender's room, or globally
    pub async fn chat(&self, id: SessionId, body: String) -> Result<(), AppError> {
        self.notify(ServerCommand::Chat { id, body }).await
    }

    pub async fn private_message(
        &self,
        id: SessionId,
        target: String,
        body: String,
    ) -> Result<(), AppError> {
        self.request(|respond_to| ServerCommand::PrivateMessage {
            id,
            target,
            body,
            respond_to,
        })
        .await?
    }

    /// Connected users sorted by display name
    pub async fn list_users(&self, id: SessionId) -> Result<Vec<UserSummary>, AppError> {
        self.request(|respond_to| ServerCommand::ListUsers { id, respond_to })
            .await
    }

    pub async fn status(&self) -> Result<ServerStatus, AppError> {
        self.request(|respond_to| ServerCommand::Status { respond_to })
            .await
    }

    /// Stop accepting sessions, stop every active one, and wait for them
    /// to finish leaving.
    ///
    /// With a `timeout`, returns once it elapses even if sessions are
    /// still draining; the report says how many.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<ShutdownReport, AppError> {
        let mut waiter = self
            .request(|respond_to| ServerCommand::Shutdown { respond_to })
            .await?;

        let report = match timeout {
            Some(timeout) => waiter.wait_timeout(timeout).await,
            None => waiter.wait().await,
        };
        info!(
            total = report.total,
            remaining = report.remaining,
            timed_out = report.timed_out,
            "Shutdown drain finished"
        );
        Ok(report)
    }
}
