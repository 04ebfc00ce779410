//! Shared application state for the observer API.
//!
//! [`AppState`] holds the cache behind the object-safe
//! [`SnapshotService`] seam, so the router never names the world type. The
//! operation table and integration statuses are fixed at startup.

use std::sync::Arc;

use simgate_core::{ActiveIntegrations, BridgeStats, HostControl, OperationTable, SnapshotService};

/// Reads the bridge counters without naming the world type.
pub type StatsSource = Arc<dyn Fn() -> BridgeStats + Send + Sync>;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The snapshot cache.
    pub snapshots: Arc<dyn SnapshotService>,
    /// Every exposed operation.
    pub operations: Arc<OperationTable>,
    /// Integration statuses from startup.
    pub integrations: ActiveIntegrations,
    /// Host control state, when a simulation host is running.
    pub control: Option<Arc<HostControl>>,
    /// Bridge counters, when available.
    pub bridge_stats: Option<StatsSource>,
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState")
            .field("operations", &self.operations.len())
            .field("integrations", &self.integrations)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State serving `snapshots` with the given operation table.
    pub fn new(snapshots: Arc<dyn SnapshotService>, operations: OperationTable) -> Self {
        Self {
            snapshots,
            operations: Arc::new(operations),
            integrations: ActiveIntegrations::default(),
            control: None,
            bridge_stats: None,
        }
    }

    /// Attach integration statuses.
    #[must_use]
    pub fn with_integrations(mut self, integrations: ActiveIntegrations) -> Self {
        self.integrations = integrations;
        self
    }

    /// Attach host control state.
    #[must_use]
    pub fn with_control(mut self, control: Arc<HostControl>) -> Self {
        self.control = Some(control);
        self
    }

    /// Attach a bridge counter source.
    #[must_use]
    pub fn with_bridge_stats(mut self, stats: StatsSource) -> Self {
        self.bridge_stats = Some(stats);
        self
    }
}
