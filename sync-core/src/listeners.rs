//! Listener registry.
//!
//! Listeners are keyed by `(EventKind, Scope)`. Selection is data, not
//! inheritance: every event is the same tagged record, and the registry picks
//! callbacks by its type string and the room it belongs to.
//!
//! For one event the matching callbacks run in this order:
//!
//! 1. `(Type(t), Room(r))` - exact type, scoped to the event's room
//! 2. `(Type(t), Global)` - exact type, any room
//! 3. `(Any, Room(r))` - catch-all, scoped to the event's room
//! 4. `(Any, Global)` - catch-all
//!
//! Within one key, insertion order is dispatch order.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use mxsync_types::{Event, RoomId};

/// Error a listener may return. It is logged and collected, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(Option<&RoomId>, &Event) -> Result<(), ListenerError> + Send + Sync>;

/// Which event types a registration matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Exactly this event type.
    Type(String),
    /// Every event.
    Any,
}

impl EventKind {
    /// Match a single event type.
    pub fn of(event_type: impl Into<String>) -> Self {
        Self::Type(event_type.into())
    }
}

/// Which rooms a registration matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Events from any room, and events with no room.
    Global,
    /// Only events belonging to this room.
    Room(RoomId),
}

/// Handle returned by [`ListenerRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    callback: Callback,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    by_key: HashMap<(EventKind, Scope), Vec<Registration>>,
}

/// Mapping from `(EventKind, Scope)` to ordered listener callbacks.
///
/// Registration takes `&self` so listeners can be added while a sync loop is
/// dispatching. Callbacks are invoked without the registry lock held; a
/// listener may register or unregister other listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: RwLock<RegistryInner>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `(kind, scope)`.
    pub fn register<F>(&self, kind: EventKind, scope: Scope, callback: F) -> ListenerId
    where
        F: Fn(Option<&RoomId>, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .by_key
            .entry((kind, scope))
            .or_default()
            .push(Registration {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Listen for one event type in every room.
    pub fn on_event_type<F>(&self, event_type: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(Option<&RoomId>, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(EventKind::of(event_type), Scope::Global, callback)
    }

    /// Listen for one event type in one room.
    pub fn on_room_event_type<F>(
        &self,
        room_id: RoomId,
        event_type: impl Into<String>,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(Option<&RoomId>, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(EventKind::of(event_type), Scope::Room(room_id), callback)
    }

    /// Listen for every event.
    pub fn on_any_event<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(Option<&RoomId>, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(EventKind::Any, Scope::Global, callback)
    }

    /// Listen for every event in one room.
    pub fn on_room_any_event<F>(&self, room_id: RoomId, callback: F) -> ListenerId
    where
        F: Fn(Option<&RoomId>, &Event) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register(EventKind::Any, Scope::Room(room_id), callback)
    }

    /// Remove a registration. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        inner.by_key.retain(|_, registrations| {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
            !registrations.is_empty()
        });
        removed
    }

    /// Total number of registered callbacks.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_key.values().map(Vec::len).sum()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every matching callback for `event`, in dispatch order.
    ///
    /// Returns the errors of failed listeners. A failure never prevents the
    /// remaining listeners from running.
    pub fn dispatch(&self, room_id: Option<&RoomId>, event: &Event) -> Vec<ListenerError> {
        let callbacks = self.matching(room_id, &event.event_type);
        callbacks
            .into_iter()
            .filter_map(|callback| callback(room_id, event).err())
            .collect()
    }

    fn matching(&self, room_id: Option<&RoomId>, event_type: &str) -> Vec<Callback> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let kind = EventKind::of(event_type);
        let room_scope = room_id.map(|r| Scope::Room(r.clone()));

        let mut keys = Vec::with_capacity(4);
        if let Some(scope) = &room_scope {
            keys.push((kind.clone(), scope.clone()));
        }
        keys.push((kind, Scope::Global));
        if let Some(scope) = room_scope {
            keys.push((EventKind::Any, scope));
        }
        keys.push((EventKind::Any, Scope::Global));

        keys.iter()
            .filter_map(|key| inner.by_key.get(key))
            .flat_map(|registrations| registrations.iter().map(|r| Arc::clone(&r.callback)))
            .collect()
    }
}
