//! Room registry
//!
//! Maps room ids to live room actors and spawns them on demand. Handles
//! carry an epoch so a room that shut down while a new connection was
//! already spawning its replacement never evicts the replacement.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use arbor_core::RoomId;

use crate::{spawn_room, RoomHandle};

#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    next_epoch: Mutex<u64>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(RoomRegistry::default())
    }

    /// Fetch the live actor for a room, spawning one when none exists or
    /// the previous actor has exited.
    pub fn room(self: &Arc<Self>, id: &RoomId) -> RoomHandle {
        let mut rooms = self.rooms.lock();
        if let Some(handle) = rooms.get(id) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let epoch = {
            let mut next = self.next_epoch.lock();
            *next += 1;
            *next
        };
        let registry = Arc::downgrade(self);
        let room_id = id.clone();
        let handle = spawn_room(id.clone(), epoch, move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&room_id, epoch);
            }
        });
        rooms.insert(id.clone(), handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.lock().is_empty()
    }

    /// Drop a room entry, but only if it still belongs to the given
    /// incarnation.
    fn remove(&self, id: &RoomId, epoch: u64) {
        let mut rooms = self.rooms.lock();
        if rooms.get(id).is_some_and(|handle| handle.epoch() == epoch) {
            rooms.remove(id);
            tracing::debug!(room = %id, "room dropped from registry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use arbor_core::NodeKey;

    use crate::ClientHandle;

    #[tokio::test]
    async fn test_same_id_returns_same_room() {
        let registry = RoomRegistry::new();
        let id = RoomId::from("r1");
        let first = registry.room(&id);
        let second = registry.room(&id);
        assert_eq!(first.epoch(), second.epoch());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_ids_get_distinct_rooms() {
        let registry = RoomRegistry::new();
        let a = registry.room(&RoomId::from("a"));
        let b = registry.room(&RoomId::from("b"));
        assert_ne!(a.epoch(), b.epoch());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_emptied_room_is_evicted_and_respawned() {
        let registry = RoomRegistry::new();
        let id = RoomId::from("come-and-go");
        let room = registry.room(&id);

        let (client, _rx) = ClientHandle::channel();
        room.join(NodeKey::from("a"), client).await;
        room.leave(NodeKey::from("a"));

        for _ in 0..50 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.is_empty());

        let replacement = registry.room(&id);
        assert!(!replacement.is_closed());
        assert_ne!(replacement.epoch(), room.epoch());
    }
}
