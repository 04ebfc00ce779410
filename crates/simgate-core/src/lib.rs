//! Main-thread bridge, snapshot cache and simulation host for simgate.
//!
//! The world is owned by one simulation thread. Every other thread reaches
//! it through the [`MainThreadBridge`], and reads it through immutable
//! [`Snapshot`](simgate_types::Snapshot)s held by the [`SnapshotCache`].
//!
//! # Modules
//!
//! - [`bridge`] -- FIFO cross-thread call gateway with deadlines
//! - [`cache`] -- Coalescing snapshot cache and the [`SnapshotService`] view
//! - [`identity`] -- [`LiveKind`] and the identity registry
//! - [`methods`] -- Whitelisted invocable methods with parameter schemas
//! - [`bus`] -- Synchronous event listeners on the simulation thread
//! - [`host`] -- The simulation thread loop
//! - [`control`] -- Pause, stop and tick speed
//! - [`world`] -- Traits the world implements
//! - [`config`] -- `simgate-config.yaml` loading
//! - [`supervisor`] -- Optional integration probing
//! - [`operations`] -- Declarative operation table for the routing layer
//! - [`report`] -- Error reporting seam
//! - [`error`] -- The failure taxonomy

pub mod bridge;
pub mod bus;
pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod host;
pub mod identity;
pub mod methods;
pub mod operations;
pub mod report;
pub mod supervisor;
pub mod world;

pub use bridge::{BridgeStats, MainThreadBridge};
pub use bus::{EventBus, EventSelector, Listener, ListenerId};
pub use cache::{SnapshotCache, SnapshotService};
pub use config::{ConfigError, SimgateConfig};
pub use control::{HostControl, HostStatus};
pub use error::{ErrorKind, SimError};
pub use host::{HostReport, spawn_simulation};
pub use identity::{IdentityRegistry, LiveKind};
pub use methods::{Args, MethodDescriptor, MethodRegistry, ParamSpec, ParamType};
pub use operations::{OperationSpec, OperationTable, Verb};
pub use report::{ErrorReporter, Reporter};
pub use supervisor::{ActiveIntegrations, IntegrationStatus, IntegrationSupervisor};
pub use world::{Messaging, Simulation};
