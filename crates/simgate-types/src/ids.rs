//! Stable identities for objects owned by the simulation thread.
//!
//! The engine does not keep object identity stable across internal reloads
//! (a chunk reload recreates its block entities), so every object kind is
//! keyed by a value derived from the object's own data instead:
//!
//! - players and entities by [`Uuid`]
//! - block entities by their world and block coordinate
//! - plugin-provided objects (regions, named locations) by a string id
//!
//! An [`ObjectKey`] pairs the kind with that value and is the key of the
//! snapshot cache.

use core::fmt;
use core::str::FromStr;

use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Errors produced while parsing an identifier from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// The text is not a hyphenated UUID.
    #[error("'{0}' is not a valid UUID")]
    Uuid(String),

    /// The text is not a `world:x:y:z` coordinate.
    #[error("'{0}' is not a valid block coordinate (expected world:x:y:z)")]
    Coord(String),

    /// The text is empty.
    #[error("identifier must not be empty")]
    Empty,
}

/// Name of a registered object kind (`player`, `entity`, `sign`, ...).
///
/// Kinds are declared as constants by the code that registers them, so the
/// name is a `&'static str`. Request paths are mapped onto a kind by the
/// identity registry instead of by allocating a new name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectKind(&'static str);

impl ObjectKind {
    /// Declare a kind.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The kind's name.
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The identity value of a single object, unique within its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyId {
    /// A UUID (players, entities, worlds).
    Uuid(Uuid),
    /// A block coordinate inside a world (block entities).
    Coord {
        /// The world the block is in.
        world: Uuid,
        /// Block x coordinate.
        x: i32,
        /// Block y coordinate.
        y: i32,
        /// Block z coordinate.
        z: i32,
    },
    /// A free-form string id (plugin objects).
    Name(String),
}

impl KeyId {
    /// Parse a hyphenated UUID.
    pub fn parse_uuid(raw: &str) -> Result<Self, IdParseError> {
        // Require the canonical 5-group form (the same check request paths
        // have always used) so simple/urn forms do not alias one object.
        if raw.split('-').count() != 5 {
            return Err(IdParseError::Uuid(raw.to_owned()));
        }
        Uuid::parse_str(raw)
            .map(Self::Uuid)
            .map_err(|_parse| IdParseError::Uuid(raw.to_owned()))
    }

    /// Parse a `world:x:y:z` block coordinate.
    pub fn parse_coord(raw: &str) -> Result<Self, IdParseError> {
        let bad = || IdParseError::Coord(raw.to_owned());
        let mut parts = raw.split(':');
        let world = parts.next().ok_or_else(bad)?;
        let world = Uuid::parse_str(world).map_err(|_parse| bad())?;
        let mut coord = [0_i32; 3];
        for slot in &mut coord {
            let part = parts.next().ok_or_else(bad)?;
            *slot = part.parse().map_err(|_parse| bad())?;
        }
        if parts.next().is_some() {
            return Err(bad());
        }
        let [x, y, z] = coord;
        Ok(Self::Coord { world, x, y, z })
    }

    /// Accept any non-empty string id.
    pub fn parse_name(raw: &str) -> Result<Self, IdParseError> {
        if raw.is_empty() {
            return Err(IdParseError::Empty);
        }
        Ok(Self::Name(raw.to_owned()))
    }

    /// The UUID, if this is a UUID id.
    pub const fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(id) => Some(*id),
            Self::Coord { .. } | Self::Name(_) => None,
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(id) => write!(f, "{id}"),
            Self::Coord { world, x, y, z } => write!(f, "{world}:{x}:{y}:{z}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl FromStr for KeyId {
    type Err = IdParseError;

    /// Best-effort parse used where the kind's shape is unknown: UUID first,
    /// then coordinate, then plain name.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse_uuid(raw)
            .or_else(|_uuid| Self::parse_coord(raw))
            .or_else(|_coord| Self::parse_name(raw))
    }
}

impl Serialize for KeyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Uuid> for KeyId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

/// Cache key: an object kind plus the object's identity value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectKey {
    /// Kind of the object.
    pub kind: ObjectKind,
    /// Identity value within the kind.
    pub id: KeyId,
}

impl ObjectKey {
    /// Build a key.
    pub const fn new(kind: ObjectKind, id: KeyId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_requires_five_groups() {
        let id = Uuid::new_v4();
        assert_eq!(KeyId::parse_uuid(&id.to_string()), Ok(KeyId::Uuid(id)));

        let simple = id.simple().to_string();
        assert!(KeyId::parse_uuid(&simple).is_err());
    }

    #[test]
    fn coord_round_trips_through_display() {
        let world = Uuid::new_v4();
        let id = KeyId::Coord {
            world,
            x: -12,
            y: 64,
            z: 7,
        };
        let text = id.to_string();
        assert_eq!(KeyId::parse_coord(&text), Ok(id));
    }

    #[test]
    fn coord_rejects_missing_or_extra_parts() {
        let world = Uuid::new_v4();
        assert!(KeyId::parse_coord(&format!("{world}:1:2")).is_err());
        assert!(KeyId::parse_coord(&format!("{world}:1:2:3:4")).is_err());
        assert!(KeyId::parse_coord("nope:1:2:3").is_err());
    }

    #[test]
    fn from_str_falls_back_to_name() {
        let parsed: KeyId = "spawn-region".parse().unwrap_or(KeyId::Name(String::new()));
        assert_eq!(parsed, KeyId::Name(String::from("spawn-region")));
        assert!("".parse::<KeyId>().is_err());
    }

    #[test]
    fn key_serializes_id_as_string() {
        let id = Uuid::new_v4();
        let key = ObjectKey::new(ObjectKind::new("player"), KeyId::Uuid(id));
        let json = serde_json::to_value(&key).unwrap_or_default();
        assert_eq!(json["kind"], "player");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(key.to_string(), format!("player/{id}"));
    }
}
