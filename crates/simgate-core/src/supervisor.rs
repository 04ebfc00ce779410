//! Activation of optional integrations.
//!
//! An integration is a collaborator that may or may not be installed
//! (an economy plugin, a region plugin). Each one registers a presence check; at
//! startup the supervisor runs every check whether its collaborator is
//! present and combines the answer with the configuration flag. A missing
//! collaborator disables its integration quietly: it is logged as
//! `NOT FOUND`, never as an error.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::config::ServletsConfig;

/// Outcome of checking one integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Present and enabled.
    On,
    /// Turned off in configuration.
    Disabled,
    /// The collaborator is not installed.
    NotFound,
}

impl IntegrationStatus {
    /// Whether the integration is usable.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "ON",
            Self::Disabled => "DISABLED",
            Self::NotFound => "NOT FOUND",
        })
    }
}

type PresenceCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// Registered integration presence checks.
#[derive(Default)]
pub struct IntegrationSupervisor {
    checks: BTreeMap<String, PresenceCheck>,
}

impl fmt::Debug for IntegrationSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.checks.keys()).finish()
    }
}

impl IntegrationSupervisor {
    /// No integrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the presence check for integration `name`. A later registration
    /// under the same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, present: impl Fn() -> bool + Send + Sync + 'static) {
        self.checks.insert(name.into(), Box::new(present));
    }

    /// Check every integration and log the outcome.
    pub fn apply(&self, config: &ServletsConfig) -> ActiveIntegrations {
        let statuses = self
            .checks
            .iter()
            .map(|(name, present)| {
                let status = if !config.integration_enabled(name) {
                    IntegrationStatus::Disabled
                } else if present() {
                    IntegrationStatus::On
                } else {
                    IntegrationStatus::NotFound
                };
                info!(integration = %name, "  [{status}]");
                (name.clone(), status)
            })
            .collect();
        ActiveIntegrations { statuses }
    }
}

/// Result of [`IntegrationSupervisor::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActiveIntegrations {
    statuses: BTreeMap<String, IntegrationStatus>,
}

impl ActiveIntegrations {
    /// Status of integration `name`, if it was registered.
    pub fn status(&self, name: &str) -> Option<IntegrationStatus> {
        self.statuses.get(name).copied()
    }

    /// Whether integration `name` is active.
    pub fn is_active(&self, name: &str) -> bool {
        self.status(name).is_some_and(IntegrationStatus::is_active)
    }

    /// Every integration and its status, by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, IntegrationStatus)> {
        self.statuses.iter().map(|(name, status)| (name.as_str(), *status))
    }
}
