//! Methods callable through `POST /api/{kind}/{id}/invoke`.

use serde_json::{Value, json};
use simgate_core::{Args, IdentityRegistry, MethodRegistry, ParamSpec, ParamType, SimError};
use simgate_types::{EventKind, KeyId};

use crate::kinds::{EntityKind, PlayerKind, SignKind};
use crate::world::{Entity, GameWorld, Player, Sign, Vec3};

/// Largest stack `player.give_item` hands out at once.
const MAX_STACK: i64 = 64;

/// Register every invocable method.
pub fn registry(identities: &IdentityRegistry<GameWorld>) -> Result<MethodRegistry<GameWorld>, SimError> {
    let mut methods = MethodRegistry::new(identities);

    methods.register::<PlayerKind, _>(
        "send_message",
        "Send a chat message to the player",
        vec![ParamSpec::required("message", ParamType::String)],
        send_message,
    )?;
    methods.register_with_world::<PlayerKind, _>(
        "kick",
        "Disconnect the player",
        vec![ParamSpec::optional("reason", ParamType::String)],
        kick,
    )?;
    methods.register::<PlayerKind, _>(
        "give_item",
        "Add items to the player's inventory",
        vec![
            ParamSpec::required("item", ParamType::String),
            ParamSpec::optional("amount", ParamType::Integer),
        ],
        give_item,
    )?;
    methods.register::<EntityKind, _>(
        "set_velocity",
        "Replace the entity's velocity",
        vec![
            ParamSpec::required("x", ParamType::Number),
            ParamSpec::required("y", ParamType::Number),
            ParamSpec::required("z", ParamType::Number),
        ],
        set_velocity,
    )?;
    methods.register::<SignKind, _>(
        "set_lines",
        "Replace the sign's text, up to four lines",
        vec![ParamSpec::required("lines", ParamType::Any)],
        set_lines,
    )?;

    Ok(methods)
}

fn send_message(player: &mut Player, args: &Args) -> Result<Value, SimError> {
    player.receive(args.str("message")?);
    Ok(json!(true))
}

fn kick(world: &mut GameWorld, id: &KeyId, args: &Args) -> Result<Value, SimError> {
    let uuid = id
        .as_uuid()
        .ok_or_else(|| SimError::invalid("player ids are UUIDs"))?;
    let reason = args.opt_str("reason").unwrap_or("Kicked by an operator");
    let player = world
        .remove_player(uuid, EventKind::PlayerKick, Some(reason))
        .ok_or_else(|| SimError::not_found(format!("player/{uuid}")))?;
    Ok(json!({ "kicked": player.name, "reason": reason }))
}

fn give_item(player: &mut Player, args: &Args) -> Result<Value, SimError> {
    let item = args.str("item")?;
    if item.is_empty() {
        return Err(SimError::invalid("item must not be empty"));
    }
    let amount = args.value("amount").map_or(Ok(1), |_amount| args.i64("amount"))?;
    if !(1..=MAX_STACK).contains(&amount) {
        return Err(SimError::invalid(format!(
            "amount must be between 1 and {MAX_STACK}, got {amount}"
        )));
    }
    let amount = u32::try_from(amount).map_err(|e| SimError::invalid(e.to_string()))?;
    let count = player.inventory.entry(item.to_owned()).or_default();
    *count = count.saturating_add(amount);
    Ok(json!({ "item": item, "count": *count }))
}

fn set_velocity(entity: &mut Entity, args: &Args) -> Result<Value, SimError> {
    let velocity = Vec3 {
        x: args.f64("x")?,
        y: args.f64("y")?,
        z: args.f64("z")?,
    };
    if ![velocity.x, velocity.y, velocity.z].iter().all(|v| v.is_finite()) {
        return Err(SimError::invalid("velocity must be finite"));
    }
    entity.velocity = velocity;
    Ok(json!(velocity))
}

fn set_lines(sign: &mut Sign, args: &Args) -> Result<Value, SimError> {
    let lines = args
        .value("lines")
        .and_then(Value::as_array)
        .ok_or_else(|| SimError::invalid("lines must be a list of strings"))?;
    if lines.len() > sign.lines.len() {
        return Err(SimError::invalid(format!(
            "a sign holds {} lines, got {}",
            sign.lines.len(),
            lines.len()
        )));
    }
    let mut next: [String; 4] = std::array::from_fn(|_slot| String::new());
    for (slot, line) in next.iter_mut().zip(lines) {
        line.as_str()
            .ok_or_else(|| SimError::invalid("lines must be a list of strings"))?
            .clone_into(slot);
    }
    sign.lines = next;
    Ok(json!(sign.lines))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use serde_json::Map;
    use simgate_core::{LiveKind, Simulation};
    use simgate_types::ObjectKey;

    use super::*;
    use crate::activity::ActivityConfig;
    use crate::kinds;

    fn setup() -> (GameWorld, MethodRegistry<GameWorld>) {
        let world = GameWorld::new(ActivityConfig {
            seed: Some(9),
            ..ActivityConfig::default()
        });
        let identities = kinds::registry().unwrap();
        let methods = registry(&identities).unwrap();
        (world, methods)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn call(
        world: &mut GameWorld,
        methods: &MethodRegistry<GameWorld>,
        key: &ObjectKey,
        method: &str,
        raw: Value,
    ) -> Result<Value, SimError> {
        methods.prepare(key, method, &args(raw))?.run(world)
    }

    #[test]
    fn give_item_stacks_and_bounds_amount() {
        let (mut world, methods) = setup();
        let key = PlayerKind::key(&world.players[0]);
        let first = call(&mut world, &methods, &key, "give_item", json!({ "item": "bread" })).unwrap();
        assert_eq!(first["count"], 1);
        let second = call(&mut world, &methods, &key, "give_item", json!({ "item": "bread", "amount": 5 })).unwrap();
        assert_eq!(second["count"], 6);
        let err = call(&mut world, &methods, &key, "give_item", json!({ "item": "bread", "amount": 65 })).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn kick_removes_player_and_raises_event() {
        let (mut world, methods) = setup();
        let key = PlayerKind::key(&world.players[0]);
        let before = world.players.len();
        let result = call(&mut world, &methods, &key, "kick", json!({})).unwrap();
        assert_eq!(result["reason"], "Kicked by an operator");
        assert_eq!(world.players.len(), before - 1);
        let events = world.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::PlayerKick);

        let again = call(&mut world, &methods, &key, "kick", json!({})).unwrap_err();
        assert!(matches!(again, SimError::NotFound(_)));
    }

    #[test]
    fn set_lines_pads_and_rejects_overflow() {
        let (mut world, methods) = setup();
        let key = SignKind::key(&world.signs[0]);
        call(&mut world, &methods, &key, "set_lines", json!({ "lines": ["Closed"] })).unwrap();
        assert_eq!(world.signs[0].lines, ["Closed", "", "", ""]);
        let err = call(&mut world, &methods, &key, "set_lines", json!({ "lines": ["a", "b", "c", "d", "e"] })).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
        let err = call(&mut world, &methods, &key, "set_lines", json!({ "lines": [1] })).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn set_velocity_requires_numbers() {
        let (mut world, methods) = setup();
        let key = EntityKind::key(&world.entities[0]);
        call(&mut world, &methods, &key, "set_velocity", json!({ "x": 1, "y": 0.5, "z": -2 })).unwrap();
        assert_eq!(world.entities[0].velocity, Vec3 { x: 1.0, y: 0.5, z: -2.0 });
        let err = call(&mut world, &methods, &key, "set_velocity", json!({ "x": "fast", "y": 0, "z": 0 })).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn send_message_lands_in_inbox() {
        let (mut world, methods) = setup();
        let key = PlayerKind::key(&world.players[1]);
        call(&mut world, &methods, &key, "send_message", json!({ "message": "hi" })).unwrap();
        assert_eq!(world.players[1].inbox, ["hi"]);
    }
}
