//! Webhook dispatch for simgate.
//!
//! Simulation events published on the [`EventBus`](simgate_core::EventBus)
//! are matched against the hook table loaded from `hooks.yaml`, filtered,
//! rendered and delivered over HTTP from a Tokio runtime. A hook may answer
//! with a message, which is sent back into the simulation through the
//! main-thread bridge.
//!
//! # Modules
//!
//! - [`dispatcher`] -- The hook table, notification and reload
//! - [`delivery`] -- One HTTP request per hook
//! - [`filter`] -- Per-hook event filters
//! - [`payload`] -- Detail and permission scoping, body encoding
//! - [`reply`] -- Hook replies that message players
//! - [`custom`] -- Registered custom event tags
//! - [`hook`] -- Hook definitions
//! - [`config`] -- `hooks.yaml` loading
//! - [`error`] -- Configuration errors

pub mod config;
pub mod custom;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod hook;
pub mod payload;
pub mod reply;

pub use config::HookConfig;
pub use custom::CustomEventRegistry;
pub use delivery::{Delivery, DeliveryJob, DeliveryOutcome};
pub use dispatcher::{CommandBinding, DispatchReport, ReloadReport, WebHookDispatcher};
pub use error::HookError;
pub use filter::{FilterRegistry, HookFilter};
pub use hook::{CommandHook, DataType, FilterSpec, Header, WebHook};
pub use reply::{BridgeReplies, HookReply, ReplySink, ReplyTarget};
