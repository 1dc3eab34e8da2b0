//! # sync-core
//!
//! Pure logic for mxsync (no I/O, instant tests).
//!
//! This crate implements the bookkeeping and algorithms for the sync engine
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects beyond invoking caller-supplied listeners. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same snapshot → same dispatch order)
//! - Easy reasoning about ordering guarantees
//!
//! The actual I/O (long-polling, persisting cursors) is performed by
//! `sync-client`, which drives the [`EventRouter`] with decoded snapshots.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod generation;
pub mod listeners;
pub mod room;
pub mod router;

pub use backoff::calculate_backoff;
pub use generation::{Generation, SyncGeneration};
pub use listeners::{EventKind, ListenerError, ListenerId, ListenerRegistry, Scope};
pub use room::{RoomState, RoomStateCache};
pub use router::{DispatchReport, EventRouter, ListenerFailure, RouterError, RouterOptions};
