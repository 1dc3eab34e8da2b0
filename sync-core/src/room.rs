//! Per-room "latest known state" bookkeeping.
//!
//! The router overlays every state event it dispatches onto the room's
//! [`RoomState`], keyed by `(type, state_key)` with last-write-wins. The
//! overlay happens *after* listeners for that event have run, so a listener
//! reading the cache sees the state as it was before the event.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use mxsync_types::{Event, RoomId};

/// Latest known state of one room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomState {
    room_id: Option<RoomId>,
    state: HashMap<(String, String), Event>,
}

impl RoomState {
    /// Create empty state for a room.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id: Some(room_id),
            state: HashMap::new(),
        }
    }

    /// The room this state belongs to.
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Overlay a state event. Non-state events are ignored.
    ///
    /// Returns the event previously stored under the same `(type, state_key)`.
    pub fn update(&mut self, event: &Event) -> Option<Event> {
        let state_key = event.state_key.as_ref()?;
        self.state
            .insert((event.event_type.clone(), state_key.clone()), event.clone())
    }

    /// Current state event for `(event_type, state_key)`.
    pub fn state_event(&self, event_type: &str, state_key: &str) -> Option<&Event> {
        self.state
            .get(&(event_type.to_string(), state_key.to_string()))
    }

    /// Membership of `user_id` (`join`, `invite`, `leave`, ...), if known.
    pub fn membership(&self, user_id: &str) -> Option<&str> {
        self.state_event("m.room.member", user_id)
            .and_then(Event::membership)
    }

    /// The room name from `m.room.name`, if set.
    pub fn name(&self) -> Option<&str> {
        self.state_event("m.room.name", "")
            .and_then(|e| e.content_str("name"))
    }

    /// Number of distinct state entries.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// True if no state is known.
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Shared, cloneable handle to the state of every known room.
///
/// The router owns the writes; listeners and applications may hold a clone
/// and read from it at any time.
#[derive(Debug, Clone, Default)]
pub struct RoomStateCache {
    rooms: Arc<RwLock<HashMap<RoomId, RoomState>>>,
}

impl RoomStateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one room's state.
    pub fn get(&self, room_id: &RoomId) -> Option<RoomState> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms.get(room_id).cloned()
    }

    /// Current state event of a room for `(event_type, state_key)`.
    pub fn state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Option<Event> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms
            .get(room_id)
            .and_then(|room| room.state_event(event_type, state_key))
            .cloned()
    }

    /// Ids of every room with cached state.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms.keys().cloned().collect()
    }

    /// Overlay a state event onto a room, creating the room if needed.
    pub(crate) fn apply(&self, room_id: &RoomId, event: &Event) -> Option<Event> {
        if !event.is_state() {
            return None;
        }
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| RoomState::new(room_id.clone()))
            .update(event)
    }

    /// Drop everything known about a room.
    pub(crate) fn forget(&self, room_id: &RoomId) -> bool {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        rooms.remove(room_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn content(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn update_is_last_write_wins() {
        let mut room = RoomState::new(RoomId::from("!r:hs"));
        room.update(&Event::new_state("m.room.topic", "", content(json!({"topic": "one"}))));
        let previous =
            room.update(&Event::new_state("m.room.topic", "", content(json!({"topic": "two"}))));

        assert_eq!(previous.unwrap().content_str("topic"), Some("one"));
        assert_eq!(
            room.state_event("m.room.topic", "").unwrap().content_str("topic"),
            Some("two")
        );
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn non_state_events_are_ignored() {
        let mut room = RoomState::new(RoomId::from("!r:hs"));
        assert!(room
            .update(&Event::new("m.room.message", Map::new()))
            .is_none());
        assert!(room.is_empty());
    }

    #[test]
    fn state_keys_are_distinct() {
        let mut room = RoomState::new(RoomId::from("!r:hs"));
        room.update(&Event::new_state(
            "m.room.member",
            "@a:hs",
            content(json!({"membership": "join"})),
        ));
        room.update(&Event::new_state(
            "m.room.member",
            "@b:hs",
            content(json!({"membership": "invite"})),
        ));

        assert_eq!(room.membership("@a:hs"), Some("join"));
        assert_eq!(room.membership("@b:hs"), Some("invite"));
        assert_eq!(room.membership("@c:hs"), None);
    }

    #[test]
    fn name_reads_empty_state_key() {
        let mut room = RoomState::new(RoomId::from("!r:hs"));
        room.update(&Event::new_state("m.room.name", "", content(json!({"name": "Lobby"}))));
        assert_eq!(room.name(), Some("Lobby"));
    }

    #[test]
    fn cache_clones_share_state() {
        let cache = RoomStateCache::new();
        let reader = cache.clone();
        let room = RoomId::from("!r:hs");

        cache.apply(&room, &Event::new_state("m.room.name", "", content(json!({"name": "A"}))));
        assert_eq!(reader.get(&room).unwrap().name(), Some("A"));

        assert!(cache.forget(&room));
        assert!(reader.get(&room).is_none());
        assert!(!cache.forget(&room));
    }
}
