//! Events raised by the simulation and fanned out to listeners and webhooks.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when an event kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

/// Generates [`EventKind`] together with its wire names.
macro_rules! event_kinds {
    ($($(#[$meta:meta])* $variant:ident => $wire:literal,)+) => {
        /// A recognised simulation event kind.
        ///
        /// Wire names are `SCREAMING_SNAKE_CASE`; they are used as the keys
        /// of the `events` table in the hook configuration and as the value
        /// of the event header on outbound webhook requests.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum EventKind {
            $(
                $(#[$meta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl EventKind {
            /// Every kind, in declaration order.
            pub const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            /// The wire name of this kind.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl FromStr for EventKind {
            type Err = UnknownEventKind;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownEventKind(other.to_owned())),
                }
            }
        }
    };
}

event_kinds! {
    /// Pseudo-kind: hooks registered here receive every event.
    All => "ALL",
    /// A command hook was invoked.
    CustomCommand => "CUSTOM_COMMAND",
    /// A custom, application-registered event.
    CustomEvent => "CUSTOM_EVENT",
    /// A player answered an interactive message.
    InteractiveMessage => "INTERACTIVE_MESSAGE",
    /// A player earned an advancement.
    Advancement => "ADVANCEMENT",
    /// A queued block operation changed state.
    BlockOperationStatus => "BLOCK_OPERATION_STATUS",
    /// A chat message was sent.
    Chat => "CHAT",
    /// A command was executed.
    Command => "COMMAND",
    /// A chunk was generated.
    GenerateChunk => "GENERATE_CHUNK",
    /// An explosion occurred.
    Explosion => "EXPLOSION",
    /// A player interacted with a block.
    InteractBlock => "INTERACT_BLOCK",
    /// An inventory was opened.
    InventoryOpen => "INVENTORY_OPEN",
    /// An inventory was closed.
    InventoryClose => "INVENTORY_CLOSE",
    /// A player joined.
    PlayerJoin => "PLAYER_JOIN",
    /// A player left.
    PlayerLeave => "PLAYER_LEAVE",
    /// A player died.
    PlayerDeath => "PLAYER_DEATH",
    /// A player was kicked.
    PlayerKick => "PLAYER_KICK",
    /// A player was banned.
    PlayerBan => "PLAYER_BAN",
    /// The server started.
    ServerStart => "SERVER_START",
    /// The server is stopping.
    ServerStop => "SERVER_STOP",
    /// A world was saved.
    WorldSave => "WORLD_SAVE",
    /// A world was loaded.
    WorldLoad => "WORLD_LOAD",
    /// A world was unloaded.
    WorldUnload => "WORLD_UNLOAD",
    /// An entity spawned.
    EntitySpawn => "ENTITY_SPAWN",
    /// An entity was removed.
    EntityDespawn => "ENTITY_DESPAWN",
    /// An entity expired (item or projectile lifetime ran out).
    EntityExpire => "ENTITY_EXPIRE",
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an event.
///
/// `summary` is what every hook receives. `details` holds the extra data
/// only sent to hooks configured with `details: true`; it is merged over the
/// summary when rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Lightweight payload.
    pub summary: serde_json::Value,
    /// Additional fields for detailed deliveries.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl EventData {
    /// A payload with only summary data.
    pub const fn new(summary: serde_json::Value) -> Self {
        Self {
            summary,
            details: serde_json::Value::Null,
        }
    }

    /// Attach detail data.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// The summary with every top-level detail key merged over it.
    ///
    /// A non-object summary is returned unchanged.
    pub fn merged(&self) -> serde_json::Value {
        let mut out = self.summary.clone();
        if let (Some(target), Some(extra)) = (out.as_object_mut(), self.details.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        out
    }

    /// Look a value up by JSON pointer, trying the summary before the details.
    pub fn lookup(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.summary
            .pointer(pointer)
            .or_else(|| self.details.pointer(pointer))
    }
}

/// A single event raised on the simulation thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimEvent {
    /// The event kind.
    pub kind: EventKind,
    /// Tag of a custom event; `None` for built-in kinds.
    pub tag: Option<String>,
    /// Label of whatever caused the event (a player name, `console`, ...).
    pub source: Option<String>,
    /// The payload.
    pub data: EventData,
}

impl SimEvent {
    /// A built-in event.
    pub const fn new(kind: EventKind, data: EventData) -> Self {
        Self {
            kind,
            tag: None,
            source: None,
            data,
        }
    }

    /// A custom event identified by `tag`.
    pub fn custom(tag: impl Into<String>, data: EventData) -> Self {
        Self {
            kind: EventKind::CustomEvent,
            tag: Some(tag.into()),
            source: None,
            data,
        }
    }

    /// Set the source label.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EventKind::VARIANTS {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), *kind);
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
        assert!("PLAYER_JOINED".parse::<EventKind>().is_err());
    }

    #[test]
    fn merged_prefers_details() {
        let data = EventData::new(json!({"player": {"name": "Alice"}, "tick": 1}))
            .with_details(json!({"tick": 2, "position": [0, 64, 0]}));
        let merged = data.merged();
        assert_eq!(merged["tick"], 2);
        assert_eq!(merged["player"]["name"], "Alice");
        assert_eq!(merged["position"][1], 64);
    }

    #[test]
    fn lookup_falls_back_to_details() {
        let data = EventData::new(json!({"player": {"name": "Alice"}}))
            .with_details(json!({"item": {"type": "minecraft:apple"}}));
        assert_eq!(data.lookup("/player/name"), Some(&json!("Alice")));
        assert_eq!(data.lookup("/item/type"), Some(&json!("minecraft:apple")));
        assert_eq!(data.lookup("/block/type"), None);
    }
}
