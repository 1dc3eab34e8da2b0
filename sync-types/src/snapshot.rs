//! The snapshot returned by one long-poll call.
//!
//! Every collection defaults to empty when the server omits it, so a minimal
//! `{"next_batch": "..."}` body decodes into a valid, empty snapshot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Event, NextBatch, RoomId, TypesError};

/// A list of events wrapped in the `{"events": [...]}` envelope used
/// throughout the snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventList {
    /// The events, in server order.
    #[serde(default)]
    pub events: Vec<Event>,
}

impl EventList {
    /// Wrap a vector of events.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// True if there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Timeline events of a room.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeline {
    /// Timeline events, oldest first.
    #[serde(default)]
    pub events: Vec<Event>,
    /// True if the server truncated the timeline for this batch.
    #[serde(default)]
    pub limited: bool,
    /// Pagination token for fetching earlier events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_batch: Option<String>,
}

/// Room summary used for display-name calculation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Users used to name the room when it has no name.
    #[serde(default, rename = "m.heroes", skip_serializing_if = "Vec::is_empty")]
    pub heroes: Vec<String>,
    /// Number of invited members.
    #[serde(
        default,
        rename = "m.invited_member_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub invited_member_count: Option<u64>,
    /// Number of joined members.
    #[serde(
        default,
        rename = "m.joined_member_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub joined_member_count: Option<u64>,
}

/// Unread notification counters of a joined room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnreadNotifications {
    /// Number of highlighted unread events.
    #[serde(default)]
    pub highlight_count: u64,
    /// Number of unread notifying events.
    #[serde(default)]
    pub notification_count: u64,
}

/// A room the user has joined.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JoinedRoom {
    /// State updates between the previous batch and the start of the timeline.
    #[serde(default)]
    pub state: EventList,
    /// New timeline events.
    #[serde(default)]
    pub timeline: Timeline,
    /// Ephemeral events (typing, receipts).
    #[serde(default)]
    pub ephemeral: EventList,
    /// Room-scoped account data.
    #[serde(default)]
    pub account_data: EventList,
    /// Room summary.
    #[serde(default)]
    pub summary: RoomSummary,
    /// Unread notification counts.
    #[serde(default)]
    pub unread_notifications: UnreadNotifications,
}

/// A room the user has been invited to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvitedRoom {
    /// Stripped state provided with the invite. There is no timeline.
    #[serde(default)]
    pub invite_state: EventList,
}

/// A room the user has knocked on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KnockedRoom {
    /// Stripped state provided with the knock.
    #[serde(default)]
    pub knock_state: EventList,
}

/// A room the user has left or been banned from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LeftRoom {
    /// State updates up to the point of leaving.
    #[serde(default)]
    pub state: EventList,
    /// Timeline events up to the point of leaving.
    #[serde(default)]
    pub timeline: Timeline,
    /// Room-scoped account data.
    #[serde(default)]
    pub account_data: EventList,
}

/// The four room-membership partitions of a snapshot.
///
/// Maps preserve the order in which the server enumerated the rooms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rooms {
    /// Joined rooms.
    #[serde(default)]
    pub join: IndexMap<RoomId, JoinedRoom>,
    /// Invited rooms.
    #[serde(default)]
    pub invite: IndexMap<RoomId, InvitedRoom>,
    /// Knocked rooms.
    #[serde(default)]
    pub knock: IndexMap<RoomId, KnockedRoom>,
    /// Left rooms.
    #[serde(default)]
    pub leave: IndexMap<RoomId, LeftRoom>,
}

/// One decoded long-poll snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    /// The cursor to pass as `since` on the next call.
    pub next_batch: NextBatch,
    /// Room partitions.
    #[serde(default)]
    pub rooms: Rooms,
    /// Global presence events.
    #[serde(default)]
    pub presence: EventList,
    /// Global account data.
    #[serde(default)]
    pub account_data: EventList,
    /// Events sent directly to this device.
    #[serde(default)]
    pub to_device: EventList,
}

impl SyncResponse {
    /// Create an empty snapshot with the given cursor.
    pub fn new(next_batch: impl Into<NextBatch>) -> Self {
        Self {
            next_batch: next_batch.into(),
            ..Self::default()
        }
    }

    /// Decode a snapshot from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        serde_json::from_slice(bytes).map_err(TypesError::Deserialization)
    }

    /// Encode a snapshot as JSON bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(self).map_err(TypesError::Serialization)
    }

    /// Total number of events across every partition.
    pub fn event_count(&self) -> usize {
        let joined: usize = self
            .rooms
            .join
            .values()
            .map(|r| {
                r.state.events.len()
                    + r.timeline.events.len()
                    + r.ephemeral.events.len()
                    + r.account_data.events.len()
            })
            .sum();
        let invited: usize = self
            .rooms
            .invite
            .values()
            .map(|r| r.invite_state.events.len())
            .sum();
        let knocked: usize = self
            .rooms
            .knock
            .values()
            .map(|r| r.knock_state.events.len())
            .sum();
        let left: usize = self
            .rooms
            .leave
            .values()
            .map(|r| r.state.events.len() + r.timeline.events.len() + r.account_data.events.len())
            .sum();

        joined
            + invited
            + knocked
            + left
            + self.presence.events.len()
            + self.account_data.events.len()
            + self.to_device.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_snapshot_decodes() {
        let snapshot = SyncResponse::from_slice(br#"{"next_batch":"s1"}"#).unwrap();
        assert_eq!(snapshot.next_batch, NextBatch::from("s1"));
        assert!(snapshot.rooms.join.is_empty());
        assert_eq!(snapshot.event_count(), 0);
    }

    #[test]
    fn new_snapshot_is_empty() {
        let snapshot = SyncResponse::new("s9");
        assert_eq!(snapshot.next_batch.as_str(), "s9");
        assert_eq!(snapshot.event_count(), 0);
        assert!(SyncResponse::default().next_batch.is_empty());
    }

    #[test]
    fn missing_next_batch_is_an_error() {
        let result = SyncResponse::from_slice(br#"{"rooms":{}}"#);
        assert!(matches!(result, Err(TypesError::Deserialization(_))));
    }

    #[test]
    fn joined_rooms_keep_server_order() {
        let body = json!({
            "next_batch": "s2",
            "rooms": {
                "join": {
                    "!zeta:hs": {},
                    "!alpha:hs": {},
                    "!mid:hs": {}
                }
            }
        });
        let snapshot: SyncResponse = serde_json::from_value(body).unwrap();

        let order: Vec<&str> = snapshot.rooms.join.keys().map(RoomId::as_str).collect();
        assert_eq!(order, vec!["!zeta:hs", "!alpha:hs", "!mid:hs"]);
    }

    #[test]
    fn full_snapshot_decodes_every_partition() {
        let body = json!({
            "next_batch": "s3",
            "rooms": {
                "join": {
                    "!a:hs": {
                        "state": {"events": [{"type": "m.room.name", "state_key": "", "content": {"name": "A"}}]},
                        "timeline": {
                            "events": [{"type": "m.room.message", "sender": "@u:hs", "content": {"body": "x"}}],
                            "limited": true,
                            "prev_batch": "p1"
                        },
                        "ephemeral": {"events": [{"type": "m.typing", "content": {"user_ids": []}}]},
                        "account_data": {"events": [{"type": "m.tag", "content": {}}]},
                        "summary": {"m.heroes": ["@u:hs"], "m.joined_member_count": 2},
                        "unread_notifications": {"highlight_count": 1, "notification_count": 4}
                    }
                },
                "invite": {"!b:hs": {"invite_state": {"events": [{"type": "m.room.member", "state_key": "@me:hs", "content": {"membership": "invite"}}]}}},
                "knock": {"!c:hs": {"knock_state": {"events": [{"type": "m.room.join_rules", "state_key": "", "content": {}}]}}},
                "leave": {"!d:hs": {"timeline": {"events": [{"type": "m.room.member", "state_key": "@me:hs", "content": {"membership": "leave"}}]}}}
            },
            "presence": {"events": [{"type": "m.presence", "sender": "@u:hs", "content": {"presence": "online"}}]},
            "account_data": {"events": [{"type": "m.push_rules", "content": {}}]},
            "to_device": {"events": [{"type": "m.room_key_request", "sender": "@u:hs", "content": {}}]}
        });
        let snapshot: SyncResponse = serde_json::from_value(body).unwrap();

        let joined = &snapshot.rooms.join[&RoomId::from("!a:hs")];
        assert!(joined.timeline.limited);
        assert_eq!(joined.timeline.prev_batch.as_deref(), Some("p1"));
        assert_eq!(joined.summary.joined_member_count, Some(2));
        assert_eq!(joined.unread_notifications.notification_count, 4);
        assert_eq!(snapshot.event_count(), 10);
    }
}
