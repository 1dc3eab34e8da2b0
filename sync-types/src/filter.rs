//! Server-side filter documents.
//!
//! A filter is created once per identity and referenced by id on every
//! long-poll afterwards. Only the commonly used fields are typed; unknown
//! fields are not preserved.

use serde::{Deserialize, Serialize};

use crate::FilterId;

/// Filter applied to non-room event streams (presence, account data).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Maximum number of events to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Event types to include. `None` includes all types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    /// Event types to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_types: Vec<String>,
    /// Senders to include. `None` includes all senders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senders: Option<Vec<String>>,
    /// Senders to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_senders: Vec<String>,
}

/// Filter applied to room event streams (timeline, state, ephemeral).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomEventFilter {
    /// Maximum number of events to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Event types to include.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    /// Event types to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_types: Vec<String>,
    /// Rooms to include.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<String>>,
    /// Rooms to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_rooms: Vec<String>,
    /// Only return membership events relevant to the returned timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_load_members: Option<bool>,
}

/// The `room` section of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomFilter {
    /// Rooms to include.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<String>>,
    /// Rooms to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_rooms: Vec<String>,
    /// Include rooms the user has left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_leave: Option<bool>,
    /// Timeline filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<RoomEventFilter>,
    /// State filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RoomEventFilter>,
    /// Ephemeral filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<RoomEventFilter>,
    /// Room account data filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_data: Option<RoomEventFilter>,
}

/// A complete filter document, as POSTed to the filter-create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Room filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomFilter>,
    /// Presence filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<EventFilter>,
    /// Global account data filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_data: Option<EventFilter>,
    /// Event fields to include. `None` includes all fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_fields: Option<Vec<String>>,
    /// `client` or `federation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_format: Option<String>,
}

impl FilterDefinition {
    /// A filter that caps every room timeline at `limit` events.
    pub fn with_timeline_limit(limit: u32) -> Self {
        Self {
            room: Some(RoomFilter {
                timeline: Some(RoomEventFilter {
                    limit: Some(limit),
                    ..RoomEventFilter::default()
                }),
                ..RoomFilter::default()
            }),
            ..Self::default()
        }
    }
}

/// Response of the filter-create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFilterResponse {
    /// Id of the newly saved filter.
    pub filter_id: FilterId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timeline_limit_filter_is_compact() {
        let filter = FilterDefinition::with_timeline_limit(50);
        let encoded = serde_json::to_value(&filter).unwrap();
        assert_eq!(encoded, json!({"room": {"timeline": {"limit": 50}}}));
    }

    #[test]
    fn create_response_requires_filter_id() {
        let ok: CreateFilterResponse = serde_json::from_value(json!({"filter_id": "42"})).unwrap();
        assert_eq!(ok.filter_id, FilterId::from("42"));

        let missing = serde_json::from_value::<CreateFilterResponse>(json!({"id": "42"}));
        assert!(missing.is_err());
    }
}
