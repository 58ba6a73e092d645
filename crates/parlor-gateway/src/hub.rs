use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use parlor_types::events::ServerEvent;
use parlor_types::models::{Message, RoomId};

/// Opaque per-session identity used as the key in the subscriber index.
pub type SessionId = Uuid;

/// Write capability of a subscribed session. The session's writer task owns
/// the receiving end and forwards events to its transport.
pub type EventSender = mpsc::UnboundedSender<Arc<ServerEvent>>;

/// Room → subscriber index shared by every session.
///
/// Joins and leaves take the write lock; broadcasts take the read lock and
/// deliver while holding it, so a broadcast sees exactly the membership at the
/// moment it acquired the lock. Sends are unbounded and never block, which
/// keeps the critical section short.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    rooms: RwLock<HashMap<RoomId, HashMap<SessionId, EventSender>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under a room. Joining again with the same session id
    /// replaces the previous sender, so there is never more than one delivery
    /// per session.
    pub fn join(&self, room_id: RoomId, session_id: SessionId, tx: EventSender) {
        self.inner
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room_id)
            .or_default()
            .insert(session_id, tx);
    }

    /// Remove a session. Unknown sessions are ignored; an emptied room entry is
    /// dropped.
    pub fn leave(&self, room_id: RoomId, session_id: SessionId) {
        let mut rooms = self
            .inner
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = rooms.get_mut(&room_id) {
            subscribers.remove(&session_id);
            if subscribers.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Join and return a guard that leaves when dropped.
    pub fn subscribe(&self, room_id: RoomId, session_id: SessionId, tx: EventSender) -> Subscription {
        self.join(room_id, session_id, tx);
        Subscription {
            hub: self.clone(),
            room_id,
            session_id,
        }
    }

    /// Deliver a persisted message to every session currently in its room.
    ///
    /// Best effort: a subscriber whose receiver is gone is skipped. Returns the
    /// number of sessions the event was handed to.
    pub fn broadcast(&self, message: &Message) -> usize {
        let event = Arc::new(ServerEvent::message_create(message.clone()));

        let rooms = self
            .inner
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = rooms.get(&message.room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (session_id, tx) in subscribers {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    "Delivery of message {} to session {} failed, receiver closed",
                    message.id, session_id
                );
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.inner
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&room_id)
            .map_or(0, HashMap::len)
    }

    /// Number of rooms with at least one subscriber.
    pub fn room_count(&self) -> usize {
        self.inner
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Hub membership of one session. Dropping it leaves the room, which makes
/// deregistration unconditional on every exit path, unwinding included.
pub struct Subscription {
    hub: BroadcastHub,
    room_id: RoomId,
    session_id: SessionId,
}

impl Subscription {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.leave(self.room_id, self.session_id);
    }
}
