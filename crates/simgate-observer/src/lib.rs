//! HTTP adapter for simgate.
//!
//! An Axum server over the snapshot cache. Every request is answered from
//! a snapshot or by a bridge call, never by touching live objects.
//!
//! - **Read endpoints** list a kind or fetch one object, at basic or full
//!   detail (`?details=true`)
//! - **Invoke endpoint** runs a registered method on one object
//! - **Status endpoints** expose host and bridge counters, the operation
//!   table and integration statuses
//! - **Operator endpoints** pause, resume and re-pace the simulation host
//!
//! Handlers run cache calls on the blocking pool, since a cache miss waits
//! for the simulation thread.

pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerError, bind, serve};
pub use startup::{ObserverHandle, StartupError, spawn_observer};
pub use state::{AppState, StatsSource};
