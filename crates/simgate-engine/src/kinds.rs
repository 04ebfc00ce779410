//! Object kinds the demo world exposes.
//!
//! Players and entities are keyed by UUID. Signs are block entities and
//! are keyed by their coordinate.

use serde_json::{Value, json};
use simgate_core::{IdentityRegistry, LiveKind, SimError};
use simgate_types::{DetailLevel, KeyId, ObjectKind};

use crate::world::{Entity, GameWorld, Player, Sign};

/// Online players.
pub struct PlayerKind;

impl LiveKind<GameWorld> for PlayerKind {
    const KIND: ObjectKind = ObjectKind::new("player");
    type Live = Player;

    fn identify(live: &Player) -> KeyId {
        KeyId::Uuid(live.id)
    }

    fn parse_id(raw: &str) -> Result<KeyId, SimError> {
        Ok(KeyId::parse_uuid(raw)?)
    }

    fn resolve<'w>(world: &'w GameWorld, id: &KeyId) -> Option<&'w Player> {
        let uuid = id.as_uuid()?;
        world.players.iter().find(|player| player.id == uuid)
    }

    fn resolve_mut<'w>(world: &'w mut GameWorld, id: &KeyId) -> Option<&'w mut Player> {
        let uuid = id.as_uuid()?;
        world.players.iter_mut().find(|player| player.id == uuid)
    }

    fn enumerate(world: &GameWorld) -> Vec<&Player> {
        world.players.iter().collect()
    }

    fn capture(live: &Player, detail: DetailLevel) -> Value {
        let mut fields = json!({ "uuid": live.id, "name": live.name });
        if detail == DetailLevel::Full {
            merge(
                &mut fields,
                json!({
                    "address": live.address,
                    "health": live.health,
                    "position": live.position,
                    "inventory": live.inventory,
                    "inbox": live.inbox,
                }),
            );
        }
        fields
    }
}

/// Live non-player entities.
pub struct EntityKind;

impl LiveKind<GameWorld> for EntityKind {
    const KIND: ObjectKind = ObjectKind::new("entity");
    type Live = Entity;

    fn identify(live: &Entity) -> KeyId {
        KeyId::Uuid(live.id)
    }

    fn parse_id(raw: &str) -> Result<KeyId, SimError> {
        Ok(KeyId::parse_uuid(raw)?)
    }

    fn resolve<'w>(world: &'w GameWorld, id: &KeyId) -> Option<&'w Entity> {
        let uuid = id.as_uuid()?;
        world.entities.iter().find(|entity| entity.id == uuid)
    }

    fn resolve_mut<'w>(world: &'w mut GameWorld, id: &KeyId) -> Option<&'w mut Entity> {
        let uuid = id.as_uuid()?;
        world.entities.iter_mut().find(|entity| entity.id == uuid)
    }

    fn enumerate(world: &GameWorld) -> Vec<&Entity> {
        world.entities.iter().collect()
    }

    fn capture(live: &Entity, detail: DetailLevel) -> Value {
        let mut fields = json!({ "uuid": live.id, "type": live.entity_type });
        if detail == DetailLevel::Full {
            merge(
                &mut fields,
                json!({ "position": live.position, "velocity": live.velocity }),
            );
        }
        fields
    }
}

/// Placed signs.
pub struct SignKind;

impl LiveKind<GameWorld> for SignKind {
    const KIND: ObjectKind = ObjectKind::new("sign");
    type Live = Sign;

    fn identify(live: &Sign) -> KeyId {
        KeyId::Coord {
            world: live.world,
            x: live.x,
            y: live.y,
            z: live.z,
        }
    }

    fn parse_id(raw: &str) -> Result<KeyId, SimError> {
        Ok(KeyId::parse_coord(raw)?)
    }

    fn resolve<'w>(world: &'w GameWorld, id: &KeyId) -> Option<&'w Sign> {
        world.signs.iter().find(|sign| Self::identify(sign) == *id)
    }

    fn resolve_mut<'w>(world: &'w mut GameWorld, id: &KeyId) -> Option<&'w mut Sign> {
        world.signs.iter_mut().find(|sign| Self::identify(sign) == *id)
    }

    fn enumerate(world: &GameWorld) -> Vec<&Sign> {
        world.signs.iter().collect()
    }

    fn capture(live: &Sign, detail: DetailLevel) -> Value {
        let mut fields = json!({ "lines": live.lines });
        if detail == DetailLevel::Full {
            merge(
                &mut fields,
                json!({
                    "world": live.world,
                    "position": { "x": live.x, "y": live.y, "z": live.z },
                }),
            );
        }
        fields
    }
}

/// Register every kind.
pub fn registry() -> Result<IdentityRegistry<GameWorld>, SimError> {
    let mut identities = IdentityRegistry::new();
    identities.register::<PlayerKind>()?;
    identities.register::<EntityKind>()?;
    identities.register::<SignKind>()?;
    Ok(identities)
}

fn merge(fields: &mut Value, extra: Value) {
    if let (Some(target), Value::Object(extra)) = (fields.as_object_mut(), extra) {
        target.extend(extra);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::activity::ActivityConfig;

    fn world() -> GameWorld {
        GameWorld::new(ActivityConfig {
            seed: Some(11),
            ..ActivityConfig::default()
        })
    }

    #[test]
    fn sign_key_round_trips_through_request_text() {
        let world = world();
        let sign = world.signs.first().unwrap();
        let raw = SignKind::identify(sign).to_string();
        let id = SignKind::parse_id(&raw).unwrap();
        assert!(SignKind::resolve(&world, &id).is_some());
    }

    #[test]
    fn basic_capture_omits_detail_fields() {
        let world = world();
        let player = world.players.first().unwrap();
        let basic = PlayerKind::capture(player, DetailLevel::Basic);
        assert!(basic.get("name").is_some());
        assert!(basic.get("inventory").is_none());
        let full = PlayerKind::capture(player, DetailLevel::Full);
        assert_eq!(full["health"], 20);
        assert_eq!(full["name"], basic["name"]);
    }

    #[test]
    fn registry_holds_three_kinds() {
        let identities = registry().unwrap();
        assert_eq!(identities.kinds().count(), 3);
        assert!(identities.parse_key("sign", "not-a-coord").is_err());
    }
}
