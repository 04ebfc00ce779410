//! Immutable captures of live simulation objects.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::ObjectKey;

/// How much of an object a capture includes.
///
/// Ordered: a [`DetailLevel::Full`] snapshot answers a request for
/// [`DetailLevel::Basic`], never the other way around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Identity and headline fields only.
    #[default]
    Basic,
    /// Every captured field.
    Full,
}

impl DetailLevel {
    /// Whether data captured at `self` can answer a request for `requested`.
    pub fn satisfies(self, requested: Self) -> bool {
        self >= requested
    }

    /// Map the `details` request flag onto a level.
    pub const fn from_flag(details: bool) -> Self {
        if details { Self::Full } else { Self::Basic }
    }
}

/// A point-in-time copy of a live object.
///
/// `fields` is owned JSON with no path back into the simulation, so a
/// snapshot can be read, cloned and serialized from any thread and mutating
/// a clone never changes simulation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Stable identity of the captured object.
    pub key: ObjectKey,
    /// Detail level the capture was taken at.
    pub detail: DetailLevel,
    /// Wall-clock capture time.
    pub captured_at: DateTime<Utc>,
    /// The captured field values.
    pub fields: serde_json::Value,
}

impl Snapshot {
    /// Create a snapshot captured now.
    pub fn new(key: ObjectKey, detail: DetailLevel, fields: serde_json::Value) -> Self {
        Self {
            key,
            detail,
            captured_at: Utc::now(),
            fields,
        }
    }

    /// Read a field by JSON pointer (`/position/x`).
    pub fn field(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.fields.pointer(pointer)
    }
}
