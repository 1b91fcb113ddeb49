//! Session abstraction
//!
//! A session is one client's live connection plus its identity state,
//! regardless of transport. The orchestrator only ever talks to the
//! `Session` trait; `SessionHandle` is the shared implementation that
//! every transport variant is built on, with the transport-specific
//! part living in [`framing`] and the listener handshake.
//!
//! Ownership: the orchestrator's session set holds the lifetime-owning
//! `Arc`. Nickname index and room membership only hold `Weak`s.

pub mod framing;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{SessionId, Transport};

/// Capability contract every connection type fulfils
pub trait Session: Send + Sync + fmt::Debug {
    /// Registry key
    fn id(&self) -> SessionId;

    /// Connection-derived address string, also the temporary identity
    fn remote_id(&self) -> &str;

    fn transport(&self) -> Transport;

    fn nickname(&self) -> Option<String>;

    fn set_nickname(&self, nickname: Option<String>);

    fn current_room(&self) -> Option<String>;

    fn set_current_room(&self, room: Option<String>);

    fn is_authenticated(&self) -> bool;

    fn set_authenticated(&self, authenticated: bool);

    /// Queue a message for this session. Never blocks the caller.
    fn deliver(&self, message: String) -> Result<(), SendError>;

    /// Request the session to stop. Idempotent: only the first call has
    /// any effect. The stop is observed by the session's own task, in
    /// order with its pending read and write completions.
    fn stop(&self);

    fn is_stopped(&self) -> bool;

    /// Nickname if set, otherwise the temporary identity
    fn display_name(&self) -> String {
        self.nickname()
            .unwrap_or_else(|| self.remote_id().to_string())
    }

    /// Render and queue a server message
    fn send(&self, message: &ServerMessage) -> Result<(), SendError> {
        self.deliver(message.to_string())
    }
}

/// Item on a session's outbound queue
#[derive(Debug)]
pub enum Outgoing {
    /// One unit of text to write
    Text(String),
    /// Flush everything queued before this, then close the transport
    Close,
}

/// Mutable identity state. Written only from the orchestrator task.
#[derive(Debug, Default, Clone)]
struct Profile {
    nickname: Option<String>,
    current_room: Option<String>,
    authenticated: bool,
}

/// Shared session state used by every transport
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    remote_id: String,
    transport: Transport,
    profile: RwLock<Profile>,
    outbox: mpsc::Sender<Outgoing>,
    stopped: AtomicBool,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Create a session with an outbound queue of `queue_capacity`.
    ///
    /// The returned receiver is drained by the session's writer.
    pub fn new(
        remote_id: String,
        transport: Transport,
        queue_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Outgoing>) {
        let (outbox, outbox_rx) = mpsc::channel(queue_capacity.max(1));
        let session = Arc::new(Self {
            id: SessionId::new(),
            remote_id,
            transport,
            profile: RwLock::new(Profile::default()),
            outbox,
            stopped: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });
        (session, outbox_rx)
    }

    /// Token cancelled by `stop()`; the session task selects on it
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close once everything already queued has been written.
    ///
    /// Falls back to an immediate stop when the queue has no room for
    /// the close marker.
    pub fn close_after_flush(&self) {
        if self.outbox.try_send(Outgoing::Close).is_err() {
            self.stop();
        }
    }

    fn read_profile<T>(&self, f: impl FnOnce(&Profile) -> T) -> T {
        let profile = self.profile.read().unwrap_or_else(PoisonError::into_inner);
        f(&profile)
    }

    fn write_profile(&self, f: impl FnOnce(&mut Profile)) {
        let mut profile = self.profile.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut profile);
    }
}

impl Session for SessionHandle {
    fn id(&self) -> SessionId {
        self.id
    }

    fn remote_id(&self) -> &str {
        &self.remote_id
    }

    fn transport(&self) -> Transport {
        self.transport
    }

    fn nickname(&self) -> Option<String> {
        self.read_profile(|p| p.nickname.clone())
    }

    fn set_nickname(&self, nickname: Option<String>) {
        self.write_profile(|p| p.nickname = nickname);
    }

    fn current_room(&self) -> Option<String> {
        self.read_profile(|p| p.current_room.clone())
    }

    fn set_current_room(&self, room: Option<String>) {
        self.write_profile(|p| p.current_room = room);
    }

    fn is_authenticated(&self) -> bool {
        self.read_profile(|p| p.authenticated)
    }

    fn set_authenticated(&self, authenticated: bool) {
        self.write_profile(|p| p.authenticated = authenticated);
    }

    fn deliver(&self, message: String) -> Result<(), SendError> {
        if self.is_stopped() {
            return Err(SendError::ChannelClosed);
        }
        match self.outbox.try_send(Outgoing::Text(message)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session = %self.id, peer = %self.remote_id, "Outbound queue full, dropping message");
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(session = %self.id, peer = %self.remote_id, "Stopping session");
        self.cancel.cancel();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Drain everything currently queued, for tests
#[cfg(test)]
pub(crate) fn drain(outbox: &mut mpsc::Receiver<Outgoing>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(item) = outbox.try_recv() {
        if let Outgoing::Text(text) = item {
            lines.push(text);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(capacity: usize) -> (Arc<SessionHandle>, mpsc::Receiver<Outgoing>) {
        SessionHandle::new("127.0.0.1:40000".to_string(), Transport::Line, capacity)
    }

    #[test]
    fn test_session_creation() {
        let (session, _rx) = session(8);

        assert!(session.nickname().is_none());
        assert!(session.current_room().is_none());
        assert!(!session.is_authenticated());
        assert!(!session.is_stopped());
        assert_eq!(session.display_name(), "127.0.0.1:40000");
    }

    #[test]
    fn test_session_nickname() {
        let (session, _rx) = session(8);

        session.set_nickname(Some("Alice".to_string()));

        assert_eq!(session.nickname().as_deref(), Some("Alice"));
        assert_eq!(session.display_name(), "Alice");
    }

    #[test]
    fn test_deliver_preserves_order() {
        let (session, mut rx) = session(8);
        session.deliver("one".to_string()).unwrap();
        session.send(&ServerMessage::Goodbye).unwrap();

        assert_eq!(drain(&mut rx), vec!["one", "* 연결을 종료합니다..."]);
    }

    #[test]
    fn test_deliver_rejects_when_queue_full() {
        let (session, mut rx) = session(2);
        assert!(session.deliver("a".to_string()).is_ok());
        assert!(session.deliver("b".to_string()).is_ok());
        assert_eq!(session.deliver("c".to_string()), Err(SendError::QueueFull));

        // The oldest messages survive, the new one was dropped
        assert_eq!(drain(&mut rx), vec!["a", "b"]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (session, _rx) = session(2);
        let token = session.cancel_token();

        session.stop();
        session.stop();

        assert!(session.is_stopped());
        assert!(token.is_cancelled());
        assert_eq!(session.deliver("late".to_string()), Err(SendError::ChannelClosed));
    }

    #[test]
    fn test_close_after_flush_queues_marker() {
        let (session, mut rx) = session(4);
        session.deliver("bye".to_string()).unwrap();
        session.close_after_flush();

        assert!(matches!(rx.try_recv(), Ok(Outgoing::Text(t)) if t == "bye"));
        assert!(matches!(rx.try_recv(), Ok(Outgoing::Close)));
        assert!(!session.is_stopped());
    }
}
