//! Error types for the chat server
//!
//! Defines application-level errors and message delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::{NameError, NameKind};

/// Application-level errors
///
/// Covers both fatal errors (connection termination or startup failure)
/// and business errors (rendered as a reply to the requesting session).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Line codec error, e.g. an over-long line (fatal)
    #[error("Line codec error: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS credential or handshake error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Invalid command-line configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// The server has begun shutting down and rejects the request
    #[error("Server is shutting down")]
    ShuttingDown,

    /// The requesting session is not (or no longer) registered
    #[error("Session not registered")]
    UnknownSession,

    /// Nickname or room name failed validation
    #[error("Invalid {kind:?} '{name}': {reason:?}")]
    InvalidName {
        kind: NameKind,
        name: String,
        reason: NameError,
    },

    /// Nickname is held by another live session
    #[error("Nickname already taken: {0}")]
    NicknameTaken(String),

    /// Session is not in the room it referred to
    #[error("Not in room")]
    NotInRoom,

    /// Session is already in a room
    #[error("Already in room: {0}")]
    AlreadyInRoom(String),

    /// Room has reached its member limit
    #[error("Room is full: {0}")]
    RoomFull(String),

    /// No live session holds the given nickname
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The server runs without a history sink
    #[error("Message history is disabled")]
    HistoryDisabled,

    /// The history task is gone or its queue is full
    #[error("Message history is unavailable")]
    HistoryUnavailable,
}

/// Message send errors
///
/// Returned by `Session::deliver`. Fan-out callers log and move on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The outbound queue is at capacity; the message was dropped
    #[error("Outbound queue full")]
    QueueFull,

    /// The session has stopped and no longer accepts messages
    #[error("Channel closed")]
    ChannelClosed,
}
