//! Per-hook event filters.
//!
//! A filter is built once per hook from its configuration when the hook
//! table is loaded, then asked for every event the hook would receive.
//! Built-in filters match on the event payload:
//!
//! | Name     | Payload field                    | Config                    |
//! |----------|----------------------------------|---------------------------|
//! | `player` | `/player/name` or `/player/uuid` | list of names or UUIDs    |
//! | `item`   | `/item/type`                     | list of item type ids     |
//! | `block`  | `/block/type`                    | list of block type ids    |
//!
//! A single string is accepted in place of a one-element list. An event
//! without the field never passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use simgate_types::EventData;

/// Decides whether an event is delivered to a hook.
pub trait HookFilter: Send + Sync {
    /// Whether the hook should receive `data`.
    fn accepts(&self, data: &EventData) -> bool;
}

/// Builds a filter from the hook's `filter.config` value.
pub type FilterFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn HookFilter>, String> + Send + Sync>;

/// Filters by name.
#[derive(Clone)]
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl core::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FilterRegistry {
    /// A registry with no filters at all.
    pub const fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry holding the `player`, `item` and `block` filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("player", |config| {
            Ok(Arc::new(FieldFilter::new(
                &["/player/name", "/player/uuid"],
                config,
                "player",
            )?))
        });
        registry.register("item", |config| {
            Ok(Arc::new(FieldFilter::new(&["/item/type"], config, "item")?))
        });
        registry.register("block", |config| {
            Ok(Arc::new(FieldFilter::new(&["/block/type"], config, "block")?))
        });
        registry
    }

    /// Register a filter under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn HookFilter>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Whether a filter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the filter `name` from `config`. `None` if no such filter is
    /// registered; `Some(Err)` if it rejects the configuration.
    pub fn build(&self, name: &str, config: &Value) -> Option<Result<Arc<dyn HookFilter>, String>> {
        self.factories.get(name).map(|factory| factory(config))
    }
}

/// Passes events whose value at any of `pointers` is in an allow-list.
struct FieldFilter {
    pointers: &'static [&'static str],
    allowed: Vec<String>,
}

impl FieldFilter {
    fn new(pointers: &'static [&'static str], config: &Value, label: &str) -> Result<Self, String> {
        let allowed = match config {
            Value::String(single) => vec![single.clone()],
            Value::Array(values) => values
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| format!("{label} filter entries must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(format!("{label} filter expects a string or a list of strings")),
        };
        if allowed.is_empty() {
            return Err(format!("{label} filter needs at least one entry"));
        }
        Ok(Self { pointers, allowed })
    }
}

impl HookFilter for FieldFilter {
    fn accepts(&self, data: &EventData) -> bool {
        self.pointers.iter().any(|pointer| {
            data.lookup(pointer)
                .and_then(Value::as_str)
                .is_some_and(|actual| {
                    self.allowed
                        .iter()
                        .any(|allowed| allowed.eq_ignore_ascii_case(actual))
                })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn join(name: &str, uuid: &str) -> EventData {
        EventData::new(json!({ "player": { "name": name, "uuid": uuid } }))
    }

    #[test]
    fn player_filter_matches_name_or_uuid() {
        let registry = FilterRegistry::with_builtins();
        let filter = registry
            .build("player", &json!(["Alice", "00000000-0000-0000-0000-00000000000b"]))
            .unwrap()
            .unwrap();
        assert!(filter.accepts(&join("Alice", "00000000-0000-0000-0000-00000000000a")));
        assert!(filter.accepts(&join("Bob", "00000000-0000-0000-0000-00000000000b")));
        assert!(!filter.accepts(&join("Carol", "00000000-0000-0000-0000-00000000000c")));
        assert!(!filter.accepts(&EventData::new(json!({ "message": "hi" }))));
    }

    #[test]
    fn item_filter_reads_detail_data() {
        let registry = FilterRegistry::with_builtins();
        let filter = registry.build("item", &json!("minecraft:diamond")).unwrap().unwrap();
        let data = EventData::new(json!({ "player": "Alice" }))
            .with_details(json!({ "item": { "type": "minecraft:diamond" } }));
        assert!(filter.accepts(&data));
    }

    #[test]
    fn bad_config_is_rejected() {
        let registry = FilterRegistry::with_builtins();
        assert!(registry.build("block", &json!(42)).unwrap().is_err());
        assert!(registry.build("block", &json!([])).unwrap().is_err());
        assert!(registry.build("weather", &json!("rain")).is_none());
    }

    #[test]
    fn custom_filter_can_be_registered() {
        struct Never;
        impl HookFilter for Never {
            fn accepts(&self, _data: &EventData) -> bool {
                false
            }
        }

        let mut registry = FilterRegistry::empty();
        registry.register("never", |_config| Ok(Arc::new(Never)));
        assert!(registry.contains("never"));
        let filter = registry.build("never", &Value::Null).unwrap().unwrap();
        assert!(!filter.accepts(&EventData::default()));
    }
}
