//! Shared type definitions for simgate.
//!
//! Plain data exchanged between the simulation thread, the snapshot cache,
//! the HTTP adapter and the webhook dispatcher. Nothing here holds a
//! reference into the simulation.
//!
//! # Modules
//!
//! - [`ids`] -- Object kinds and stable identity keys
//! - [`snapshot`] -- Immutable object captures and detail levels
//! - [`events`] -- Event kinds and payloads

pub mod events;
pub mod ids;
pub mod snapshot;

pub use events::{EventData, EventKind, SimEvent, UnknownEventKind};
pub use ids::{IdParseError, KeyId, ObjectKey, ObjectKind};
pub use snapshot::{DetailLevel, Snapshot};
