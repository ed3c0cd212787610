//! Registry of live rooms keyed by room id.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::instance::{Occupancy, Room, RoomConfig};

pub(crate) type RoomMap = DashMap<String, Arc<Room>>;

/// Cloneable handle to the room directory. Each instance is independent, so
/// tests and embedders can run several side by side.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<RoomMap>,
    config: Arc<RoomConfig>,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Returns the room registered under `id`, creating it if absent or if the
    /// registered one has already closed. Racing callers on a fresh id all get
    /// the same instance.
    pub fn create_or_get(&self, id: &str, is_bot: bool) -> Arc<Room> {
        // lock order is map shard, then room; nothing takes them the other way round
        match self.rooms.entry(id.to_owned()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    debug!(room_id = id, "replacing closed room");
                    entry.insert(self.new_room(id, is_bot));
                }
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(self.new_room(id, is_bot)).value()),
        }
    }

    fn new_room(&self, id: &str, is_bot: bool) -> Arc<Room> {
        info!(room_id = id, is_bot, "room created");
        Arc::new(Room::new(
            id.to_owned(),
            is_bot,
            Arc::clone(&self.config),
            Arc::downgrade(&self.rooms),
        ))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Drops the entry for `id` only if it still points at `room`.
    pub fn remove(&self, id: &str, room: &Room) -> bool {
        remove_if_same(&self.rooms, id, room)
    }

    /// Rooms that still have a free seat.
    pub fn list_available(&self) -> BTreeMap<String, Occupancy> {
        available(&self.rooms)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

pub(crate) fn remove_if_same(rooms: &RoomMap, id: &str, room: &Room) -> bool {
    rooms
        .remove_if(id, |_, existing| std::ptr::eq(Arc::as_ptr(existing), room))
        .is_some()
}

pub(crate) fn available(rooms: &RoomMap) -> BTreeMap<String, Occupancy> {
    // copy out first so room locks are never taken under a map shard lock
    let live: Vec<Arc<Room>> = rooms.iter().map(|r| Arc::clone(r.value())).collect();
    live.into_iter()
        .filter(|room| !room.is_closed())
        .map(|room| (room.id().to_owned(), room.occupancy()))
        .filter(|(_, occupancy)| !occupancy.is_full())
        .collect()
}
