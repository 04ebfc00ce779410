//! Errors raised while loading or validating webhook configuration.
//!
//! Delivery failures are not represented here: they are logged and
//! reported as [`SimError::DeliveryFailed`] and never reach a caller.

use simgate_core::SimError;

/// A hook configuration that cannot be loaded or armed.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Failed to read the hook file.
    #[error("failed to read hook file: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse the YAML.
    #[error("failed to parse hook file: {source}")]
    Yaml {
        /// Underlying YAML error.
        source: serde_yml::Error,
    },

    /// A hook names a filter that is not registered.
    #[error("hook '{address}' uses unknown filter '{filter}'")]
    UnknownFilter {
        /// Address of the offending hook.
        address: String,
        /// The filter name.
        filter: String,
    },

    /// A filter rejected its configuration.
    #[error("hook '{address}' has an invalid '{filter}' filter: {reason}")]
    InvalidFilter {
        /// Address of the offending hook.
        address: String,
        /// The filter name.
        filter: String,
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A custom event tag has no registered decoder.
    #[error("custom event '{0}' is not registered")]
    UnknownCustomEvent(String),

    /// A hook is malformed (address, method or header).
    #[error("invalid hook '{address}': {reason}")]
    InvalidHook {
        /// Address of the offending hook.
        address: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A command hook is malformed.
    #[error("invalid command hook '{name}': {source}")]
    InvalidCommand {
        /// Command name.
        name: String,
        /// The schema or alias problem.
        source: SimError,
    },
}

impl From<serde_yml::Error> for HookError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}
