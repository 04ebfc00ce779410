//! Identity registry: live object to stable key and back.
//!
//! Each object kind the simulation exposes implements [`LiveKind`] for the
//! world type `W`. The trait ties together how a live object is identified,
//! how a key is resolved back to the current live object, and how the
//! object is captured into plain data.
//!
//! # Thread confinement
//!
//! Every method that touches a live object takes `&W` or `&mut W`. The world
//! only exists on the simulation thread and is only lent out for the length
//! of a bridge call, so a live borrow can never outlive the call that
//! produced it.

use std::collections::BTreeMap;

use serde_json::Value;
use simgate_types::{DetailLevel, KeyId, ObjectKey, ObjectKind, Snapshot};

use crate::error::SimError;

/// One kind of live object owned by the world `W`.
pub trait LiveKind<W>: 'static {
    /// Name of the kind.
    const KIND: ObjectKind;

    /// The live object type.
    type Live;

    /// Stable identity of a live object. Deterministic and unique within
    /// this kind.
    fn identify(live: &Self::Live) -> KeyId;

    /// Parse an identity value from request text.
    fn parse_id(raw: &str) -> Result<KeyId, SimError>;

    /// Find the current live object for `id`.
    fn resolve<'w>(world: &'w W, id: &KeyId) -> Option<&'w Self::Live>;

    /// Find the current live object for `id`, mutably.
    fn resolve_mut<'w>(world: &'w mut W, id: &KeyId) -> Option<&'w mut Self::Live>;

    /// Every live object of this kind.
    fn enumerate(world: &W) -> Vec<&Self::Live>;

    /// Copy the object's state into owned data.
    fn capture(live: &Self::Live, detail: DetailLevel) -> Value;

    /// Cache key of a live object.
    fn key(live: &Self::Live) -> ObjectKey {
        ObjectKey::new(Self::KIND, Self::identify(live))
    }
}

struct KindEntry<W> {
    parse_id: fn(&str) -> Result<KeyId, SimError>,
    capture_one: fn(&W, &KeyId, DetailLevel) -> Option<Value>,
    capture_all: fn(&W, DetailLevel) -> Vec<(KeyId, Value)>,
    exists: fn(&W, &KeyId) -> bool,
}

fn capture_one<W, K: LiveKind<W>>(world: &W, id: &KeyId, detail: DetailLevel) -> Option<Value> {
    K::resolve(world, id).map(|live| K::capture(live, detail))
}

fn capture_all<W, K: LiveKind<W>>(world: &W, detail: DetailLevel) -> Vec<(KeyId, Value)> {
    K::enumerate(world)
        .into_iter()
        .map(|live| (K::identify(live), K::capture(live, detail)))
        .collect()
}

fn exists<W, K: LiveKind<W>>(world: &W, id: &KeyId) -> bool {
    K::resolve(world, id).is_some()
}

/// Type-erased table of every registered [`LiveKind`].
pub struct IdentityRegistry<W> {
    kinds: BTreeMap<ObjectKind, KindEntry<W>>,
}

impl<W> Default for IdentityRegistry<W> {
    fn default() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }
}

impl<W> core::fmt::Debug for IdentityRegistry<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.kinds.keys()).finish()
    }
}

impl<W> IdentityRegistry<W> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register kind `K`.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidArgument`] if a kind with the same name exists.
    pub fn register<K: LiveKind<W>>(&mut self) -> Result<(), SimError> {
        if self.kinds.contains_key(&K::KIND) {
            return Err(SimError::invalid(format!(
                "object kind '{}' is already registered",
                K::KIND
            )));
        }
        self.kinds.insert(
            K::KIND,
            KindEntry {
                parse_id: K::parse_id,
                capture_one: capture_one::<W, K>,
                capture_all: capture_all::<W, K>,
                exists: exists::<W, K>,
            },
        );
        Ok(())
    }

    /// Registered kinds, in name order.
    pub fn kinds(&self) -> impl Iterator<Item = ObjectKind> + '_ {
        self.kinds.keys().copied()
    }

    /// Look a kind up by name.
    pub fn kind_named(&self, name: &str) -> Option<ObjectKind> {
        self.kinds.keys().copied().find(|kind| kind.as_str() == name)
    }

    /// Whether `kind` is registered.
    pub fn contains(&self, kind: ObjectKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Fail with [`SimError::InvalidArgument`] unless `kind` is registered.
    pub fn ensure_kind(&self, kind: ObjectKind) -> Result<(), SimError> {
        if self.contains(kind) {
            Ok(())
        } else {
            Err(SimError::invalid(format!("unknown object kind '{kind}'")))
        }
    }

    /// Parse a request-path pair into a key.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidArgument`] for an unknown kind or a malformed id.
    pub fn parse_key(&self, kind: &str, raw_id: &str) -> Result<ObjectKey, SimError> {
        let kind = self
            .kind_named(kind)
            .ok_or_else(|| SimError::invalid(format!("unknown object kind '{kind}'")))?;
        let entry = self.entry(kind)?;
        let id = (entry.parse_id)(raw_id)?;
        Ok(ObjectKey::new(kind, id))
    }

    /// Whether the object behind `key` currently exists.
    pub fn exists(&self, world: &W, key: &ObjectKey) -> Result<bool, SimError> {
        let entry = self.entry(key.kind)?;
        Ok((entry.exists)(world, &key.id))
    }

    /// Capture one object.
    ///
    /// # Errors
    ///
    /// [`SimError::NotFound`] when the key no longer resolves,
    /// [`SimError::InvalidArgument`] when the kind is unknown.
    pub fn capture(
        &self,
        world: &W,
        key: &ObjectKey,
        detail: DetailLevel,
    ) -> Result<Snapshot, SimError> {
        let entry = self.entry(key.kind)?;
        let fields = (entry.capture_one)(world, &key.id, detail)
            .ok_or_else(|| SimError::not_found(key))?;
        Ok(Snapshot::new(key.clone(), detail, fields))
    }

    /// Capture every object of `kind`.
    pub fn capture_all(
        &self,
        world: &W,
        kind: ObjectKind,
        detail: DetailLevel,
    ) -> Result<Vec<Snapshot>, SimError> {
        let entry = self.entry(kind)?;
        Ok((entry.capture_all)(world, detail)
            .into_iter()
            .map(|(id, fields)| Snapshot::new(ObjectKey::new(kind, id), detail, fields))
            .collect())
    }

    fn entry(&self, kind: ObjectKind) -> Result<&KindEntry<W>, SimError> {
        self.kinds
            .get(&kind)
            .ok_or_else(|| SimError::invalid(format!("unknown object kind '{kind}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    struct Critter {
        id: Uuid,
        name: String,
    }

    #[derive(Default)]
    struct Pen {
        critters: Vec<Critter>,
    }

    struct CritterKind;

    impl LiveKind<Pen> for CritterKind {
        const KIND: ObjectKind = ObjectKind::new("critter");
        type Live = Critter;

        fn identify(live: &Critter) -> KeyId {
            KeyId::Uuid(live.id)
        }

        fn parse_id(raw: &str) -> Result<KeyId, SimError> {
            Ok(KeyId::parse_uuid(raw)?)
        }

        fn resolve<'w>(world: &'w Pen, id: &KeyId) -> Option<&'w Critter> {
            let id = id.as_uuid()?;
            world.critters.iter().find(|c| c.id == id)
        }

        fn resolve_mut<'w>(world: &'w mut Pen, id: &KeyId) -> Option<&'w mut Critter> {
            let id = id.as_uuid()?;
            world.critters.iter_mut().find(|c| c.id == id)
        }

        fn enumerate(world: &Pen) -> Vec<&Critter> {
            world.critters.iter().collect()
        }

        fn capture(live: &Critter, _detail: DetailLevel) -> Value {
            json!({ "name": live.name })
        }
    }

    fn pen_with(names: &[&str]) -> Pen {
        Pen {
            critters: names
                .iter()
                .map(|name| Critter {
                    id: Uuid::new_v4(),
                    name: (*name).to_owned(),
                })
                .collect(),
        }
    }

    #[test]
    fn duplicate_kind_is_rejected() {
        let mut registry = IdentityRegistry::<Pen>::new();
        registry.register::<CritterKind>().unwrap();
        let err = registry.register::<CritterKind>().unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn parse_key_validates_kind_and_id() {
        let mut registry = IdentityRegistry::<Pen>::new();
        registry.register::<CritterKind>().unwrap();

        let id = Uuid::new_v4();
        let key = registry.parse_key("critter", &id.to_string()).unwrap();
        assert_eq!(key, ObjectKey::new(CritterKind::KIND, KeyId::Uuid(id)));

        assert!(registry.parse_key("dragon", &id.to_string()).is_err());
        assert!(registry.parse_key("critter", "not-a-uuid").is_err());
    }

    #[test]
    fn identify_then_resolve_finds_same_object() {
        let pen = pen_with(&["a", "b"]);
        let second = pen.critters.get(1).unwrap();
        let key = CritterKind::key(second);
        let found = CritterKind::resolve(&pen, &key.id).unwrap();
        assert_eq!(found.name, "b");
    }

    #[test]
    fn capture_missing_object_is_not_found() {
        let mut registry = IdentityRegistry::<Pen>::new();
        registry.register::<CritterKind>().unwrap();
        let pen = pen_with(&["a"]);
        let key = ObjectKey::new(CritterKind::KIND, KeyId::Uuid(Uuid::new_v4()));
        let err = registry.capture(&pen, &key, DetailLevel::Basic).unwrap_err();
        assert!(matches!(err, SimError::NotFound(_)));
    }

    #[test]
    fn capture_all_covers_every_object() {
        let mut registry = IdentityRegistry::<Pen>::new();
        registry.register::<CritterKind>().unwrap();
        let pen = pen_with(&["a", "b", "c"]);
        let snapshots = registry
            .capture_all(&pen, CritterKind::KIND, DetailLevel::Full)
            .unwrap();
        let names: Vec<_> = snapshots
            .iter()
            .filter_map(|s| s.fields["name"].as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
