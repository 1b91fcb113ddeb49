//! Room struct definition
//!
//! A named broadcast scope. Members are held as `Weak` references so
//! that room membership never keeps a disconnected session alive.
//! Rooms are only ever touched from the orchestrator task.

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::error::AppError;
use crate::message::ServerMessage;
use crate::session::Session;
use crate::types::SessionId;

#[derive(Debug)]
struct Member {
    id: SessionId,
    session: Weak<dyn Session>,
}

impl Member {
    fn is_live(&self) -> bool {
        self.session
            .upgrade()
            .is_some_and(|session| !session.is_stopped())
    }
}

/// Chat room
///
/// Members are kept in join order.
#[derive(Debug)]
pub struct Room {
    /// Room name, validated before construction
    pub name: String,
    members: Vec<Member>,
    max_members: usize,
}

impl Room {
    /// Create an empty room
    pub fn new(name: String, max_members: usize) -> Self {
        Self {
            name,
            members: Vec::new(),
            max_members,
        }
    }

    /// Add a member.
    ///
    /// Returns `Ok(false)` if the session was already a member.
    pub fn add(&mut self, session: &Arc<dyn Session>) -> Result<bool, AppError> {
        self.purge_expired();
        let id = session.id();
        if self.contains(id) {
            return Ok(false);
        }
        if self.members.len() >= self.max_members {
            return Err(AppError::RoomFull(self.name.clone()));
        }
        self.members.push(Member {
            id,
            session: Arc::downgrade(session),
        });
        Ok(true)
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove(&mut self, id: SessionId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.id != id);
        let removed = self.members.len() != before;
        self.purge_expired();
        removed
    }

    /// Check if a session is listed in this room
    pub fn contains(&self, id: SessionId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Number of live members
    pub fn len(&self) -> usize {
        self.members.iter().filter(|m| m.is_live()).count()
    }

    /// True when no live member remains
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display names of live members in join order, `viewer` marked `(You)`
    pub fn roster(&self, viewer: SessionId) -> Vec<String> {
        self.live_members()
            .map(|(id, session)| {
                if id == viewer {
                    format!("{} (You)", session.display_name())
                } else {
                    session.display_name()
                }
            })
            .collect()
    }

    /// Deliver `message` to every live member except `sender`.
    ///
    /// Best effort: a failed delivery is logged and skipped. Returns the
    /// number of members the message was queued for.
    pub fn broadcast(&self, message: &ServerMessage, sender: Option<SessionId>) -> usize {
        let text = message.to_string();
        let mut delivered = 0;
        for (id, session) in self.live_members() {
            if Some(id) == sender {
                continue;
            }
            match session.deliver(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(room = %self.name, session = %id, "Room delivery skipped: {}", e),
            }
        }
        debug!(room = %self.name, delivered, "Room broadcast");
        delivered
    }

    fn live_members(&self) -> impl Iterator<Item = (SessionId, Arc<dyn Session>)> + '_ {
        self.members.iter().filter_map(|m| {
            let session = m.session.upgrade()?;
            (!session.is_stopped()).then_some((m.id, session))
        })
    }

    fn purge_expired(&mut self) {
        self.members.retain(|m| m.session.strong_count() > 0);
    }
}
