//! Forwarding of internal failures to an external error tracker.
//!
//! [`SimError::Internal`] is the one class that should page an operator:
//! it is always logged at `error` and, when reporting is enabled, handed to
//! the configured [`ErrorReporter`]. Webhook delivery failures are passed
//! to the tracker as notices without an `error` log line.

use std::sync::Arc;

use tracing::{error, warn};

use crate::config::ReportingConfig;
use crate::error::SimError;

/// Sink for reportable failures (an error-tracking service client).
pub trait ErrorReporter: Send + Sync {
    /// Record a failure together with a short description of where it
    /// happened.
    fn capture(&self, error: &SimError, context: &str);
}

/// Shared reporting handle passed to the bridge and the dispatcher.
#[derive(Clone, Default)]
pub struct Reporter {
    sink: Option<Arc<dyn ErrorReporter>>,
}

impl core::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reporter")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Reporter {
    /// A reporter that only logs.
    pub const fn log_only() -> Self {
        Self { sink: None }
    }

    /// A reporter that logs and forwards to `sink`.
    pub const fn with_sink(sink: Arc<dyn ErrorReporter>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Build from configuration.
    ///
    /// Dev mode forces the sink off, so local runs never reach the tracker.
    pub fn from_config(config: &ReportingConfig, sink: Option<Arc<dyn ErrorReporter>>) -> Self {
        if config.dev_mode {
            warn!("Dev mode enabled, error reporting is disabled");
            return Self::log_only();
        }
        if !config.enabled {
            return Self::log_only();
        }
        Self { sink }
    }

    /// Whether failures reach an external sink.
    pub const fn is_forwarding(&self) -> bool {
        self.sink.is_some()
    }

    /// Log an internal failure at `error` and forward it.
    pub fn report(&self, err: &SimError, context: &str) {
        error!(error = %err, context, "Internal failure");
        if let Some(sink) = &self.sink {
            sink.capture(err, context);
        }
    }

    /// Forward a failure without logging it (the caller already logged at
    /// the appropriate level).
    pub fn notice(&self, err: &SimError, context: &str) {
        if let Some(sink) = &self.sink {
            sink.capture(err, context);
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl ErrorReporter for Recording {
        fn capture(&self, error: &SimError, context: &str) {
            self.0.lock().push(format!("{context}: {error}"));
        }
    }

    #[test]
    fn forwards_when_enabled() {
        let sink = Arc::new(Recording::default());
        let config = ReportingConfig {
            enabled: true,
            dev_mode: false,
        };
        let reporter = Reporter::from_config(&config, Some(sink.clone() as Arc<dyn ErrorReporter>));
        assert!(reporter.is_forwarding());
        reporter.report(&SimError::Internal(String::from("boom")), "bridge");
        assert_eq!(sink.0.lock().as_slice(), ["bridge: internal error: boom"]);
    }

    #[test]
    fn dev_mode_disables_forwarding() {
        let sink = Arc::new(Recording::default());
        let config = ReportingConfig {
            enabled: true,
            dev_mode: true,
        };
        let reporter = Reporter::from_config(&config, Some(sink.clone() as Arc<dyn ErrorReporter>));
        assert!(!reporter.is_forwarding());
        reporter.report(&SimError::Internal(String::from("boom")), "bridge");
        assert!(sink.0.lock().is_empty());
    }
}
