//! # sync-types
//!
//! Wire format types for the mxsync long-poll synchronization client.
//!
//! This crate provides the foundational types used across all mxsync crates:
//! - [`UserId`], [`RoomId`], [`FilterId`], [`NextBatch`] - Identity and cursor types
//! - [`Event`] - The homogeneous tagged record carried by every snapshot partition
//! - [`SyncResponse`] - One decoded long-poll snapshot
//! - [`FilterDefinition`] - The server-side filter document negotiated before syncing
//! - [`ApiErrorBody`] - Structured error body returned by the server
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod filter;
mod ids;
mod snapshot;

pub use error::{ApiErrorBody, TypesError};
pub use event::Event;
pub use filter::{CreateFilterResponse, EventFilter, FilterDefinition, RoomEventFilter, RoomFilter};
pub use ids::{FilterId, NextBatch, RoomId, UserId};
pub use snapshot::{
    EventList, InvitedRoom, JoinedRoom, KnockedRoom, LeftRoom, RoomSummary, Rooms, SyncResponse,
    Timeline, UnreadNotifications,
};
