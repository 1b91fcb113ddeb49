//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers and small shared enums:
//! - `SessionId`: UUID-based unique session identifier
//! - `Transport`: which listener a session arrived through
//! - `NameKind` + `validate_name`: shared nickname/room name rules

use uuid::Uuid;

use crate::error::AppError;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4. Registries key on this rather than on the
/// peer address, which can be reused after a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The transport a session is connected over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Newline-delimited text over plain TCP
    Line,
    /// WebSocket messages over plain TCP
    WebSocket,
    /// WebSocket messages over TLS
    SecureWebSocket,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Transport::Line => "tcp",
            Transport::WebSocket => "ws",
            Transport::SecureWebSocket => "wss",
        };
        f.write_str(name)
    }
}

/// What a validated name is used for. Drives the wording of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Nickname,
    Room,
}

/// Why a name was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    Empty,
    Whitespace,
    TooLong(usize),
    Reserved,
}

/// Names nobody may claim as a nickname
pub const RESERVED_NICKNAMES: [&str; 2] = ["Server", "system"];

/// Validate a nickname or room name.
///
/// Length is counted in characters so that Hangul names get the same
/// budget as ASCII ones.
pub fn validate_name(kind: NameKind, name: &str, max_len: usize) -> Result<(), AppError> {
    let reason = if name.is_empty() {
        Some(NameError::Empty)
    } else if name.chars().any(char::is_whitespace) {
        Some(NameError::Whitespace)
    } else if name.chars().count() > max_len {
        Some(NameError::TooLong(max_len))
    } else if kind == NameKind::Nickname && RESERVED_NICKNAMES.contains(&name) {
        Some(NameError::Reserved)
    } else {
        None
    };

    match reason {
        Some(reason) => Err(AppError::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
