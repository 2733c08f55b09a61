//! In-memory room state, shared by the poller (writer) and the API (reader).

use conffree_shared::Room;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::RoomConfig;

/// Last known state of every configured room.
///
/// Cheap to clone; all clones share the same state. Each room is held as an
/// immutable snapshot that a poll replaces whole, so readers see either the
/// previous poll's result or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct RoomStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Lower-cased email -> slot, fixed at construction
    index: HashMap<String, usize>,
    /// Snapshots in configuration order
    slots: RwLock<Vec<Arc<Room>>>,
}

impl RoomStore {
    pub fn new(rooms: &[RoomConfig]) -> Self {
        let index = rooms
            .iter()
            .enumerate()
            .map(|(slot, room)| (room.email.to_ascii_lowercase(), slot))
            .collect();
        let slots = rooms
            .iter()
            .map(|room| Arc::new(Room::unpolled(&room.email, &room.label)))
            .collect();

        Self {
            inner: Arc::new(Inner {
                index,
                slots: RwLock::new(slots),
            }),
        }
    }

    /// Swap in a freshly computed snapshot.
    ///
    /// Returns `false` (and stores nothing) for a room that is not configured.
    pub async fn replace(&self, room: Room) -> bool {
        let Some(&slot) = self.inner.index.get(&room.email.to_ascii_lowercase()) else {
            tracing::warn!("Ignoring state for unconfigured room {}", room.email);
            return false;
        };

        let mut slots = self.inner.slots.write().await;
        slots[slot] = Arc::new(room);
        true
    }

    pub async fn get(&self, email: &str) -> Option<Room> {
        let slot = *self.inner.index.get(&email.to_ascii_lowercase())?;
        let slots = self.inner.slots.read().await;
        slots.get(slot).map(|room| room.as_ref().clone())
    }

    /// Every configured room, in configuration order.
    pub async fn list_all(&self) -> Vec<Room> {
        self.collect(|_| true).await
    }

    /// Rooms not occupied as of their last poll.
    pub async fn list_free(&self) -> Vec<Room> {
        self.collect(Room::is_free).await
    }

    /// Rooms occupied as of their last poll.
    pub async fn list_busy(&self) -> Vec<Room> {
        self.collect(Room::is_busy).await
    }

    pub fn room_count(&self) -> usize {
        self.inner.index.len()
    }

    async fn collect(&self, keep: impl Fn(&Room) -> bool) -> Vec<Room> {
        // Clone the Arcs under the lock, the rooms themselves after it
        let snapshots: Vec<Arc<Room>> = self.inner.slots.read().await.clone();
        snapshots
            .iter()
            .map(Arc::as_ref)
            .filter(|room| keep(*room))
            .cloned()
            .collect()
    }
}
