//! The demo game world owned by the simulation thread.
//!
//! Players come and go, entities spawn and despawn, players chat, walk
//! into regions and run commands. Every change raises a [`SimEvent`] that
//! the host publishes after the tick.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{Value, json};
use simgate_core::{Messaging, Simulation};
use simgate_types::{EventData, EventKind, SimEvent};
use tracing::{debug, info};
use uuid::Uuid;

use crate::activity::{
    ActivityConfig, CHAT_LINES, ENTITY_TYPES, NAME_POOL, REGIONS, VOTE_OPTIONS,
};

/// Messages kept per player inbox.
const INBOX_CAPACITY: usize = 32;

/// Tag of the custom event raised when a player enters a region.
pub const REGION_ENTER: &str = "region_enter";

// -----------------------------------------------------------------------
// Objects
// -----------------------------------------------------------------------

/// A point in the world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

/// An online player.
#[derive(Debug, Clone)]
pub struct Player {
    /// Player UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Connection address.
    pub address: String,
    /// Health points.
    pub health: u32,
    /// Current position.
    pub position: Vec3,
    /// Item type to count.
    pub inventory: BTreeMap<String, u32>,
    /// Most recent messages received, oldest first.
    pub inbox: Vec<String>,
}

impl Player {
    /// Append a message, dropping the oldest past the inbox capacity.
    pub fn receive(&mut self, message: &str) {
        if self.inbox.len() >= INBOX_CAPACITY {
            self.inbox.remove(0);
        }
        self.inbox.push(message.to_owned());
    }

    /// Summary payload naming the player.
    pub fn summary(&self) -> Value {
        json!({ "name": self.name, "uuid": self.id })
    }
}

/// A non-player entity.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Entity UUID.
    pub id: Uuid,
    /// Entity type id.
    pub entity_type: String,
    /// Current position.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
}

/// A sign block entity.
#[derive(Debug, Clone)]
pub struct Sign {
    /// World the sign is placed in.
    pub world: Uuid,
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate.
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
    /// The four text lines.
    pub lines: [String; 4],
}

// -----------------------------------------------------------------------
// World
// -----------------------------------------------------------------------

/// The whole simulated server.
pub struct GameWorld {
    /// Id of the single world.
    pub world_id: Uuid,
    /// Name of the single world.
    pub world_name: String,
    /// Online players.
    pub players: Vec<Player>,
    /// Live entities.
    pub entities: Vec<Entity>,
    /// Placed signs.
    pub signs: Vec<Sign>,
    config: ActivityConfig,
    rng: StdRng,
    raised: Vec<SimEvent>,
    server_messages: Vec<String>,
}

impl core::fmt::Debug for GameWorld {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GameWorld")
            .field("world_name", &self.world_name)
            .field("players", &self.players.len())
            .field("entities", &self.entities.len())
            .field("signs", &self.signs.len())
            .finish_non_exhaustive()
    }
}

impl GameWorld {
    /// Build the starting world. Initial players and entities do not raise
    /// events.
    pub fn new(config: ActivityConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let world_id = Uuid::new_v4();
        let mut world = Self {
            world_id,
            world_name: config.world_name.clone(),
            players: Vec::new(),
            entities: Vec::new(),
            signs: vec![
                Sign {
                    world: world_id,
                    x: 0,
                    y: 64,
                    z: 0,
                    lines: [
                        String::from("Welcome"),
                        String::from("to"),
                        config.world_name.clone(),
                        String::new(),
                    ],
                },
                Sign {
                    world: world_id,
                    x: 12,
                    y: 65,
                    z: -4,
                    lines: [
                        String::from("Market"),
                        String::from("->"),
                        String::new(),
                        String::new(),
                    ],
                },
            ],
            rng,
            raised: Vec::new(),
            server_messages: Vec::new(),
            config,
        };
        for _ in 0..world.config.initial_players {
            world.add_player();
        }
        for _ in 0..world.config.initial_entities {
            world.add_entity();
        }
        world
    }

    /// Queue an event for the host to publish.
    pub fn raise(&mut self, event: SimEvent) {
        self.raised.push(event);
    }

    /// Messages broadcast to the whole server, oldest first.
    pub fn server_messages(&self) -> &[String] {
        &self.server_messages
    }

    /// Payload describing the world.
    pub fn world_summary(&self) -> Value {
        json!({ "name": self.world_name, "uuid": self.world_id })
    }

    /// Remove a player, raising `kind` (leave or kick).
    pub fn remove_player(&mut self, id: Uuid, kind: EventKind, reason: Option<&str>) -> Option<Player> {
        let index = self.players.iter().position(|player| player.id == id)?;
        let player = self.players.remove(index);
        let details = json!({ "world": self.world_summary(), "reason": reason });
        self.raise(
            SimEvent::new(
                kind,
                EventData::new(json!({ "player": player.summary() })).with_details(details),
            )
            .with_source(player.name.clone()),
        );
        info!(player = %player.name, event = kind.as_str(), "Player removed");
        Some(player)
    }

    // -------------------------------------------------------------------
    // Activity
    // -------------------------------------------------------------------

    fn add_player(&mut self) -> Option<&Player> {
        let taken: Vec<&str> = self.players.iter().map(|player| player.name.as_str()).collect();
        let free: Vec<&str> = NAME_POOL
            .iter()
            .copied()
            .filter(|name| !taken.contains(name))
            .collect();
        let name = (*free.choose(&mut self.rng)?).to_owned();
        let octet: u8 = self.rng.random_range(2..=254);
        let position = self.random_position();
        self.players.push(Player {
            id: Uuid::new_v4(),
            name,
            address: format!("10.0.0.{octet}"),
            health: 20,
            position,
            inventory: BTreeMap::new(),
            inbox: Vec::new(),
        });
        self.players.last()
    }

    fn add_entity(&mut self) -> Option<&Entity> {
        let entity_type = (*ENTITY_TYPES.choose(&mut self.rng)?).to_owned();
        let position = self.random_position();
        self.entities.push(Entity {
            id: Uuid::new_v4(),
            entity_type,
            position,
            velocity: Vec3::default(),
        });
        self.entities.last()
    }

    fn random_position(&mut self) -> Vec3 {
        Vec3 {
            x: self.rng.random_range(-256.0..256.0),
            y: 64.0,
            z: self.rng.random_range(-256.0..256.0),
        }
    }

    fn random_player(&mut self) -> Option<usize> {
        if self.players.is_empty() {
            return None;
        }
        Some(self.rng.random_range(0..self.players.len()))
    }

    fn maybe_join(&mut self) {
        let below_cap = u32::try_from(self.players.len()).is_ok_and(|n| n < self.config.max_players);
        if !below_cap || !self.rng.random_bool(self.config.join_chance) {
            return;
        }
        let world = self.world_summary();
        let Some(player) = self.add_player() else {
            return;
        };
        let event = SimEvent::new(
            EventKind::PlayerJoin,
            EventData::new(json!({ "player": player.summary() }))
                .with_details(json!({ "address": player.address, "world": world })),
        )
        .with_source(player.name.clone());
        info!(player = %player.name, "Player joined");
        self.raise(event);
    }

    fn maybe_leave(&mut self) {
        if !self.rng.random_bool(self.config.leave_chance) {
            return;
        }
        let Some(id) = self.random_player().and_then(|i| self.players.get(i)).map(|p| p.id) else {
            return;
        };
        self.remove_player(id, EventKind::PlayerLeave, None);
    }

    fn maybe_spawn(&mut self) {
        let below_cap =
            u32::try_from(self.entities.len()).is_ok_and(|n| n < self.config.max_entities);
        if !below_cap || !self.rng.random_bool(self.config.spawn_chance) {
            return;
        }
        let world = self.world_summary();
        let Some(entity) = self.add_entity() else {
            return;
        };
        let event = SimEvent::new(
            EventKind::EntitySpawn,
            EventData::new(json!({
                "entity": { "uuid": entity.id, "type": entity.entity_type },
            }))
            .with_details(json!({ "position": entity.position, "world": world })),
        );
        debug!(entity = %entity.id, kind = %entity.entity_type, "Entity spawned");
        self.raise(event);
    }

    fn maybe_despawn(&mut self) {
        if self.entities.is_empty() || !self.rng.random_bool(self.config.despawn_chance) {
            return;
        }
        let index = self.rng.random_range(0..self.entities.len());
        let entity = self.entities.remove(index);
        debug!(entity = %entity.id, "Entity despawned");
        self.raise(SimEvent::new(
            EventKind::EntityDespawn,
            EventData::new(json!({
                "entity": { "uuid": entity.id, "type": entity.entity_type },
            }))
            .with_details(json!({ "position": entity.position })),
        ));
    }

    fn maybe_chat(&mut self) {
        if !self.rng.random_bool(self.config.chat_chance) {
            return;
        }
        let Some(line) = CHAT_LINES.choose(&mut self.rng).copied() else {
            return;
        };
        let Some(player) = self.random_player().and_then(|i| self.players.get(i)) else {
            return;
        };
        let event = SimEvent::new(
            EventKind::Chat,
            EventData::new(json!({ "player": player.summary(), "message": line }))
                .with_details(json!({ "channel": "global" })),
        )
        .with_source(player.name.clone());
        self.raise(event);
    }

    fn maybe_enter_region(&mut self) {
        if !self.rng.random_bool(self.config.region_chance) {
            return;
        }
        let Some(region) = REGIONS.choose(&mut self.rng).copied() else {
            return;
        };
        let Some(player) = self.random_player().and_then(|i| self.players.get(i)) else {
            return;
        };
        let event = SimEvent::custom(
            REGION_ENTER,
            EventData::new(json!({ "player": player.summary(), "region": region })),
        )
        .with_source(player.name.clone());
        self.raise(event);
    }

    fn maybe_command(&mut self) {
        if !self.rng.random_bool(self.config.command_chance) {
            return;
        }
        let Some(option) = VOTE_OPTIONS.choose(&mut self.rng).copied() else {
            return;
        };
        let Some(player) = self.random_player().and_then(|i| self.players.get(i)) else {
            return;
        };
        let event = SimEvent::new(
            EventKind::Command,
            EventData::new(json!({
                "player": player.summary(),
                "command": "vote",
                "args": { "option": option },
            })),
        )
        .with_source(player.name.clone());
        self.raise(event);
    }

    fn maybe_save(&mut self, tick: u64) {
        let interval = self.config.save_interval_ticks;
        if interval == 0 || tick.checked_rem(interval) != Some(0) {
            return;
        }
        info!(tick, world = %self.world_name, "World saved");
        let world = self.world_summary();
        self.raise(SimEvent::new(
            EventKind::WorldSave,
            EventData::new(json!({ "world": world, "tick": tick })),
        ));
    }
}

impl Simulation for GameWorld {
    fn tick(&mut self, tick: u64) {
        self.maybe_join();
        self.maybe_leave();
        self.maybe_spawn();
        self.maybe_despawn();
        self.maybe_chat();
        self.maybe_enter_region();
        self.maybe_command();
        self.maybe_save(tick);
    }

    fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.raised)
    }
}

impl Messaging for GameWorld {
    fn broadcast(&mut self, message: &str) -> usize {
        info!(message, "[Server] broadcast");
        self.server_messages.push(message.to_owned());
        for player in &mut self.players {
            player.receive(message);
        }
        self.players.len()
    }

    fn message_player(&mut self, player: Uuid, message: &str) -> bool {
        let Some(target) = self.players.iter_mut().find(|p| p.id == player) else {
            return false;
        };
        debug!(player = %target.name, message, "Message delivered");
        target.receive(message);
        true
    }
}
