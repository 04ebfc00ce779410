//! Application-defined event kinds.
//!
//! Custom events are identified by a tag and must be registered at startup
//! with a decoder that turns the raw event into the payload sent to hooks.
//! A hook configuration that names an unregistered tag is rejected.

use std::collections::BTreeMap;
use std::sync::Arc;

use simgate_core::SimError;
use simgate_types::{EventData, SimEvent};

/// Turns a raw custom event into a hook payload.
pub type Decoder = Arc<dyn Fn(&SimEvent) -> EventData + Send + Sync>;

/// Registered custom event tags.
#[derive(Clone, Default)]
pub struct CustomEventRegistry {
    decoders: BTreeMap<String, Decoder>,
}

impl core::fmt::Debug for CustomEventRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.decoders.keys()).finish()
    }
}

impl CustomEventRegistry {
    /// No custom events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tag` with a decoder.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidArgument`] if the tag is empty or taken.
    pub fn register<F>(&mut self, tag: impl Into<String>, decoder: F) -> Result<(), SimError>
    where
        F: Fn(&SimEvent) -> EventData + Send + Sync + 'static,
    {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(SimError::invalid("custom event tag must not be empty"));
        }
        if self.decoders.contains_key(&tag) {
            return Err(SimError::invalid(format!(
                "custom event '{tag}' is already registered"
            )));
        }
        self.decoders.insert(tag, Arc::new(decoder));
        Ok(())
    }

    /// Register `tag` with a decoder that forwards the event data as is.
    ///
    /// # Errors
    ///
    /// As [`register`](Self::register).
    pub fn register_passthrough(&mut self, tag: impl Into<String>) -> Result<(), SimError> {
        self.register(tag, |event: &SimEvent| event.data.clone())
    }

    /// Whether `tag` is registered.
    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Every registered tag.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    /// Decode `event` with the decoder for its tag.
    pub fn decode(&self, event: &SimEvent) -> Option<EventData> {
        let tag = event.tag.as_deref()?;
        self.decoders.get(tag).map(|decoder| decoder(event))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_registered_tags_only() {
        let mut registry = CustomEventRegistry::new();
        registry
            .register("region_enter", |event: &SimEvent| {
                EventData::new(json!({ "region": event.data.summary["id"] }))
            })
            .unwrap();

        let event = SimEvent::custom("region_enter", EventData::new(json!({ "id": "spawn" })));
        assert_eq!(
            registry.decode(&event).unwrap().summary,
            json!({ "region": "spawn" })
        );
        let other = SimEvent::custom("region_leave", EventData::default());
        assert!(registry.decode(&other).is_none());
    }

    #[test]
    fn duplicate_and_empty_tags_are_rejected() {
        let mut registry = CustomEventRegistry::new();
        registry.register_passthrough("vote").unwrap();
        assert!(registry.register_passthrough("vote").is_err());
        assert!(registry.register_passthrough("").is_err());
        assert_eq!(registry.tags().collect::<Vec<_>>(), ["vote"]);
    }
}
