//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure during startup and shutdown so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: simgate_core::ConfigError,
    },

    /// The `world` section of the configuration is invalid.
    #[error("world config error: {message}")]
    WorldConfig {
        /// Description of the problem.
        message: String,
    },

    /// A kind, method or custom event failed to register.
    #[error("registration error: {source}")]
    Registration {
        /// The underlying registration error.
        #[from]
        source: simgate_core::SimError,
    },

    /// The webhook configuration could not be loaded.
    #[error("hooks error: {source}")]
    Hooks {
        /// The underlying hooks error.
        #[from]
        source: simgate_hooks::HookError,
    },

    /// The simulation thread could not be started or did not exit cleanly.
    #[error("simulation host error: {message}")]
    Host {
        /// Description of the host failure.
        message: String,
    },

    /// The observer API server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: simgate_observer::StartupError,
    },

    /// Installing a signal handler failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
