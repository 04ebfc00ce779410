//! `hooks.yaml` loading.
//!
//! ```yaml
//! delivery_timeout_ms: 10000
//! events:
//!   PLAYER_JOIN:
//!     - address: http://localhost:9000/join
//!       filter: { name: player, config: [Alice] }
//! command:
//!   greet:
//!     aliases: [hello]
//!     params: [{ name: target, type: string }]
//!     hooks: [{ address: http://localhost:9000/greet }]
//! custom:
//!   region_enter:
//!     - address: http://localhost:9000/regions
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use simgate_types::EventKind;
use tracing::info;

use crate::error::HookError;
use crate::hook::{CommandHook, WebHook};

/// The complete hook configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HookConfig {
    /// Hooks per built-in event kind, in configuration order.
    #[serde(default)]
    pub events: BTreeMap<EventKind, Vec<WebHook>>,
    /// Command hooks by command name.
    #[serde(default)]
    pub command: BTreeMap<String, CommandHook>,
    /// Hooks per custom event tag.
    #[serde(default)]
    pub custom: BTreeMap<String, Vec<WebHook>>,
    /// Upper bound on one delivery, request and reply included.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            events: BTreeMap::new(),
            command: BTreeMap::new(),
            custom: BTreeMap::new(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

const fn default_delivery_timeout_ms() -> u64 {
    10_000
}

impl HookConfig {
    /// Load the hook file at `path`. A missing file yields an empty table.
    pub fn from_file(path: &Path) -> Result<Self, HookError> {
        if !path.exists() {
            info!(path = %path.display(), "Hook file not found, no hooks configured");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse hook YAML.
    pub fn parse(yaml: &str) -> Result<Self, HookError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Number of configured web hooks, enabled or not, commands included.
    pub fn hook_count(&self) -> usize {
        let events: usize = self.events.values().map(Vec::len).sum();
        let custom: usize = self.custom.values().map(Vec::len).sum();
        let commands: usize = self.command.values().map(|cmd| cmd.hooks.len()).sum();
        events.saturating_add(custom).saturating_add(commands)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use simgate_core::ParamType;

    use super::*;
    use crate::hook::DataType;

    #[test]
    fn parses_every_section() {
        let config = HookConfig::parse(
            r"
delivery_timeout_ms: 2500
events:
  PLAYER_JOIN:
    - address: http://localhost:9000/join
      filter:
        name: player
        config: [Alice]
    - address: http://localhost:9000/off
      enabled: false
  ALL:
    - address: http://localhost:9000/all
      data_type: xml
      details: false
      permissions: [player]
command:
  greet:
    aliases: [hello]
    params:
      - name: target
        type: string
    hooks:
      - address: http://localhost:9000/greet
        method: PUT
        headers:
          - name: X-Token
            value: abc
custom:
  region_enter:
    - address: http://localhost:9000/regions
      data_type: form
",
        )
        .unwrap();

        assert_eq!(config.delivery_timeout_ms, 2500);
        let join = &config.events[&EventKind::PlayerJoin];
        assert_eq!(join.len(), 2);
        assert_eq!(join[0].filter.as_ref().unwrap().name, "player");
        assert!(!join[1].enabled);
        let all = &config.events[&EventKind::All][0];
        assert_eq!(all.data_type, DataType::Xml);
        assert!(!all.details);
        assert!(all.permits("player"));
        assert!(!all.permits("world"));

        let greet = &config.command["greet"];
        assert_eq!(greet.aliases, ["hello"]);
        assert_eq!(greet.params[0].param_type, ParamType::String);
        assert_eq!(greet.hooks[0].method, "PUT");
        assert_eq!(greet.hooks[0].headers[0].value, "abc");
        assert_eq!(config.custom["region_enter"][0].data_type, DataType::Form);
        assert_eq!(config.hook_count(), 5);
    }

    #[test]
    fn defaults_apply() {
        let config = HookConfig::parse("events:\n  CHAT:\n    - address: http://x/chat\n").unwrap();
        let hook = &config.events[&EventKind::Chat][0];
        assert_eq!(hook.method, "POST");
        assert!(hook.enabled);
        assert!(hook.details);
        assert!(hook.permits("anything"));
        assert_eq!(config.delivery_timeout_ms, 10_000);
    }

    #[test]
    fn empty_input_is_empty_config() {
        assert_eq!(HookConfig::parse("  \n").unwrap(), HookConfig::default());
    }

    #[test]
    fn unknown_event_kind_is_rejected() {
        assert!(HookConfig::parse("events:\n  NOT_AN_EVENT: []\n").is_err());
    }

    #[test]
    fn missing_file_is_empty_config() {
        let config = HookConfig::from_file(Path::new("/nonexistent/hooks.yaml")).unwrap();
        assert_eq!(config.hook_count(), 0);
    }
}
