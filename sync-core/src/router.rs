//! Default snapshot consumer.
//!
//! [`EventRouter`] walks one [`SyncResponse`] and turns it into ordered
//! listener invocations:
//!
//! 1. **leave** rooms: account data and state, then timeline; then the room's
//!    cached state is dropped.
//! 2. **invite** rooms: stripped invite state.
//! 3. **knock** rooms: stripped knock state.
//! 4. **join** rooms, in server order: state, account data, ephemeral,
//!    timeline. State events (from the state section and the timeline) are
//!    overlaid onto the room cache, last-write-wins per `(type, state_key)`.
//! 5. Global presence, account data, then to-device events.
//!
//! The snapshot is validated before the first listener runs, so a malformed
//! snapshot is rejected as a whole and never partially applied.

use std::sync::Arc;

use mxsync_types::{Event, NextBatch, RoomId, SyncResponse, UserId};
use thiserror::Error;

use crate::listeners::ListenerRegistry;
use crate::room::RoomStateCache;

/// A snapshot violated the shape the router relies on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// An event had an empty `type`.
    #[error("event without a type in {section}")]
    MissingEventType {
        /// Partition and room the event was found in.
        section: String,
    },

    /// An event in a state section had no `state_key`.
    #[error("state event {event_type} without a state_key in {section}")]
    MissingStateKey {
        /// Partition and room the event was found in.
        section: String,
        /// Type of the offending event.
        event_type: String,
    },
}

/// Behaviour switches for the router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterOptions {
    /// Do not dispatch the first snapshot of a fresh sync (no `since`).
    ///
    /// The initial snapshot replays recent history, which bots usually must
    /// not act on again.
    pub skip_initial_sync: bool,
    /// Do not dispatch a joined room (nor its invite) whose timeline contains
    /// the syncing user's own `join`, since its history was likely seen before.
    pub skip_rejoined_rooms: bool,
}

/// A listener that returned an error during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Room of the event, if any.
    pub room_id: Option<RoomId>,
    /// Type of the event.
    pub event_type: String,
    /// Rendered listener error.
    pub error: String,
}

/// Summary of one routed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of events handed to the listener registry.
    pub dispatched: usize,
    /// Listener errors collected along the way.
    pub failures: Vec<ListenerFailure>,
    /// True if the whole snapshot was skipped as an initial sync.
    pub skipped_initial: bool,
    /// Joined rooms skipped because the user just (re)joined them.
    pub skipped_rooms: Vec<RoomId>,
}

/// Demultiplexes snapshots into listener calls and keeps per-room state.
#[derive(Debug)]
pub struct EventRouter {
    user_id: UserId,
    listeners: Arc<ListenerRegistry>,
    rooms: RoomStateCache,
    options: RouterOptions,
}

impl EventRouter {
    /// Create a router for `user_id` with default options.
    pub fn new(user_id: UserId) -> Self {
        Self::with_options(user_id, RouterOptions::default())
    }

    /// Create a router with explicit options.
    pub fn with_options(user_id: UserId, options: RouterOptions) -> Self {
        Self {
            user_id,
            listeners: Arc::new(ListenerRegistry::new()),
            rooms: RoomStateCache::new(),
            options,
        }
    }

    /// The listener registry events are dispatched to.
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Handle to the per-room state cache.
    pub fn rooms(&self) -> RoomStateCache {
        self.rooms.clone()
    }

    /// The user this router syncs for.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Route one snapshot. `since` is the cursor the snapshot was requested with.
    pub fn route(
        &self,
        snapshot: &SyncResponse,
        since: Option<&NextBatch>,
    ) -> Result<DispatchReport, RouterError> {
        validate(snapshot)?;

        let mut report = DispatchReport::default();
        if self.options.skip_initial_sync && since.is_none() {
            report.skipped_initial = true;
            return Ok(report);
        }

        let skipped = if self.options.skip_rejoined_rooms {
            self.rejoined_rooms(snapshot)
        } else {
            Vec::new()
        };

        for (room_id, room) in &snapshot.rooms.leave {
            for event in room.account_data.events.iter().chain(&room.state.events) {
                self.emit(Some(room_id), event, false, &mut report);
            }
            for event in &room.timeline.events {
                self.emit(Some(room_id), event, false, &mut report);
            }
            self.rooms.forget(room_id);
        }

        for (room_id, room) in &snapshot.rooms.invite {
            if skipped.contains(room_id) {
                continue;
            }
            for event in &room.invite_state.events {
                self.emit(Some(room_id), event, false, &mut report);
            }
        }

        for (room_id, room) in &snapshot.rooms.knock {
            for event in &room.knock_state.events {
                self.emit(Some(room_id), event, false, &mut report);
            }
        }

        for (room_id, room) in &snapshot.rooms.join {
            if skipped.contains(room_id) {
                continue;
            }
            for event in &room.state.events {
                self.emit(Some(room_id), event, true, &mut report);
            }
            for event in room.account_data.events.iter().chain(&room.ephemeral.events) {
                self.emit(Some(room_id), event, false, &mut report);
            }
            for event in &room.timeline.events {
                self.emit(Some(room_id), event, true, &mut report);
            }
        }

        for event in snapshot
            .presence
            .events
            .iter()
            .chain(&snapshot.account_data.events)
            .chain(&snapshot.to_device.events)
        {
            self.emit(None, event, false, &mut report);
        }

        report.skipped_rooms = skipped;
        Ok(report)
    }

    fn emit(
        &self,
        room_id: Option<&RoomId>,
        event: &Event,
        overlay: bool,
        report: &mut DispatchReport,
    ) {
        let mut event = event.clone();
        if let Some(room_id) = room_id {
            event.room_id = Some(room_id.clone());
        }

        for error in self.listeners.dispatch(room_id, &event) {
            tracing::warn!(
                room_id = room_id.map(RoomId::as_str),
                event_type = %event.event_type,
                "listener failed: {}",
                error
            );
            report.failures.push(ListenerFailure {
                room_id: room_id.cloned(),
                event_type: event.event_type.clone(),
                error: error.to_string(),
            });
        }
        report.dispatched += 1;

        if overlay {
            if let Some(room_id) = room_id {
                self.rooms.apply(room_id, &event);
            }
        }
    }

    fn rejoined_rooms(&self, snapshot: &SyncResponse) -> Vec<RoomId> {
        snapshot
            .rooms
            .join
            .iter()
            .filter(|(_, room)| {
                room.timeline.events.iter().rev().any(|event| {
                    event.state_key.as_deref() == Some(self.user_id.as_str())
                        && event.membership() == Some("join")
                })
            })
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }
}

fn validate(snapshot: &SyncResponse) -> Result<(), RouterError> {
    fn check(
        events: &[Event],
        section: impl Fn() -> String,
        state: bool,
    ) -> Result<(), RouterError> {
        for event in events {
            if event.event_type.is_empty() {
                return Err(RouterError::MissingEventType { section: section() });
            }
            if state && event.state_key.is_none() {
                return Err(RouterError::MissingStateKey {
                    section: section(),
                    event_type: event.event_type.clone(),
                });
            }
        }
        Ok(())
    }

    for (room_id, room) in &snapshot.rooms.leave {
        let section = || format!("leave/{}", room_id);
        check(&room.state.events, section, true)?;
        check(&room.account_data.events, section, false)?;
        check(&room.timeline.events, section, false)?;
    }
    for (room_id, room) in &snapshot.rooms.invite {
        check(&room.invite_state.events, || format!("invite/{}", room_id), true)?;
    }
    for (room_id, room) in &snapshot.rooms.knock {
        check(&room.knock_state.events, || format!("knock/{}", room_id), true)?;
    }
    for (room_id, room) in &snapshot.rooms.join {
        let section = || format!("join/{}", room_id);
        check(&room.state.events, section, true)?;
        check(&room.account_data.events, section, false)?;
        check(&room.ephemeral.events, section, false)?;
        check(&room.timeline.events, section, false)?;
    }
    check(&snapshot.presence.events, || "presence".to_string(), false)?;
    check(&snapshot.account_data.events, || "account_data".to_string(), false)?;
    check(&snapshot.to_device.events, || "to_device".to_string(), false)?;
    Ok(())
}
