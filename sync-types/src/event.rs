//! The event record carried by every snapshot partition.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::RoomId;

/// A single event from a snapshot.
///
/// Events are homogeneous tagged records: the `type` string is the only
/// discriminator and the body is free-form JSON. Listener selection is driven
/// by that string, never by the shape of `content`.
///
/// `state_key` distinguishes state from non-state events. An absent key
/// (`None`) means "not a state event", while `Some("")` is a real state event
/// whose key happens to be empty (e.g. `m.room.name`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    /// Event type discriminator, e.g. `m.room.message`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// State key, present only on state events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,

    /// Sender user id. Empty for some ephemeral and global events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sender: String,

    /// Server-assigned event id. Empty for ephemeral events.
    #[serde(default, rename = "event_id", skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Origin server timestamp in milliseconds.
    #[serde(
        default,
        rename = "origin_server_ts",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,

    /// Room the event belongs to.
    ///
    /// The wire payload omits this inside room partitions; the router fills it
    /// in from the enclosing room key before dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,

    /// Id of the event this one redacts, for `m.room.redaction`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacts: Option<String>,

    /// Event body.
    #[serde(default)]
    pub content: Map<String, Value>,

    /// Previous content for state events, when the server sends it at top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<Map<String, Value>>,

    /// Unsigned server-side data (age, transaction id, prev_content...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub unsigned: Map<String, Value>,
}

impl Event {
    /// Create an event with the given type and content.
    pub fn new(event_type: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            content,
            ..Self::default()
        }
    }

    /// Create a state event with the given type, state key and content.
    pub fn new_state(
        event_type: impl Into<String>,
        state_key: impl Into<String>,
        content: Map<String, Value>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            state_key: Some(state_key.into()),
            content,
            ..Self::default()
        }
    }

    /// Set the sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// True if this is a state event (has a state key, even an empty one).
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// The previous content of a state event.
    ///
    /// Servers place it either at top level or under `unsigned`.
    pub fn prev_content(&self) -> Option<&Map<String, Value>> {
        self.prev_content.as_ref().or_else(|| {
            self.unsigned
                .get("prev_content")
                .and_then(Value::as_object)
        })
    }

    /// String field of `content`, if present and a string.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// The `membership` of an `m.room.member` event.
    pub fn membership(&self) -> Option<&str> {
        if self.event_type == "m.room.member" {
            self.content_str("membership")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_state_key_is_not_state() {
        let event: Event = serde_json::from_value(json!({
            "type": "m.room.message",
            "sender": "@alice:example.org",
            "content": {"body": "hi"}
        }))
        .unwrap();

        assert!(!event.is_state());
        assert_eq!(event.state_key, None);
    }

    #[test]
    fn empty_state_key_is_state() {
        let event: Event = serde_json::from_value(json!({
            "type": "m.room.name",
            "state_key": "",
            "content": {"name": "Lobby"}
        }))
        .unwrap();

        assert!(event.is_state());
        assert_eq!(event.state_key.as_deref(), Some(""));
    }

    #[test]
    fn room_id_is_absent_on_the_wire() {
        let event: Event = serde_json::from_value(json!({
            "type": "m.typing",
            "content": {"user_ids": []}
        }))
        .unwrap();
        assert!(event.room_id.is_none());

        let encoded = serde_json::to_value(&event).unwrap();
        assert!(encoded.get("room_id").is_none());
        assert!(encoded.get("state_key").is_none());
    }

    #[test]
    fn prev_content_falls_back_to_unsigned() {
        let event: Event = serde_json::from_value(json!({
            "type": "m.room.topic",
            "state_key": "",
            "content": {"topic": "new"},
            "unsigned": {"prev_content": {"topic": "old"}}
        }))
        .unwrap();

        let prev = event.prev_content().unwrap();
        assert_eq!(prev.get("topic"), Some(&json!("old")));
    }

    #[test]
    fn membership_only_for_member_events() {
        let mut content = Map::new();
        content.insert("membership".into(), json!("join"));

        let member = Event::new_state("m.room.member", "@bob:example.org", content.clone());
        assert_eq!(member.membership(), Some("join"));

        let other = Event::new("m.custom", content);
        assert_eq!(other.membership(), None);
    }
}
