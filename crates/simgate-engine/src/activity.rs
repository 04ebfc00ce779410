//! Demo world settings and the random activity they drive.
//!
//! Loaded from the `world` section of `simgate-config.yaml`. Every chance
//! is a per-tick probability in `0.0..=1.0`.

use serde::Deserialize;

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Settings for the demo world.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivityConfig {
    /// Name of the single world.
    #[serde(default = "default_world_name")]
    pub world_name: String,

    /// RNG seed. Unset means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Players online at startup.
    #[serde(default = "default_initial_players")]
    pub initial_players: u32,

    /// Entities alive at startup.
    #[serde(default = "default_initial_entities")]
    pub initial_entities: u32,

    /// Upper bound on online players.
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// Upper bound on live entities.
    #[serde(default = "default_max_entities")]
    pub max_entities: u32,

    /// Chance a player joins.
    #[serde(default = "default_join_chance")]
    pub join_chance: f64,

    /// Chance a player leaves.
    #[serde(default = "default_leave_chance")]
    pub leave_chance: f64,

    /// Chance an entity spawns.
    #[serde(default = "default_spawn_chance")]
    pub spawn_chance: f64,

    /// Chance an entity despawns.
    #[serde(default = "default_despawn_chance")]
    pub despawn_chance: f64,

    /// Chance a player says something.
    #[serde(default = "default_chat_chance")]
    pub chat_chance: f64,

    /// Chance a player walks into a region.
    #[serde(default = "default_region_chance")]
    pub region_chance: f64,

    /// Chance a player runs a command.
    #[serde(default = "default_command_chance")]
    pub command_chance: f64,

    /// Ticks between world saves. Zero disables saving.
    #[serde(default = "default_save_interval_ticks")]
    pub save_interval_ticks: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            world_name: default_world_name(),
            seed: None,
            initial_players: default_initial_players(),
            initial_entities: default_initial_entities(),
            max_players: default_max_players(),
            max_entities: default_max_entities(),
            join_chance: default_join_chance(),
            leave_chance: default_leave_chance(),
            spawn_chance: default_spawn_chance(),
            despawn_chance: default_despawn_chance(),
            chat_chance: default_chat_chance(),
            region_chance: default_region_chance(),
            command_chance: default_command_chance(),
            save_interval_ticks: default_save_interval_ticks(),
        }
    }
}

impl ActivityConfig {
    /// Read the `world` section of a full configuration document.
    ///
    /// A document without a `world` section yields defaults.
    pub fn from_document(yaml: &str) -> Result<Self, EngineError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| EngineError::WorldConfig {
            message: format!("failed to parse config YAML: {e}"),
        })?;
        let Some(section) = raw.get("world") else {
            return Ok(Self::default());
        };
        let config: Self =
            serde_yml::from_value(section.clone()).map_err(|e| EngineError::WorldConfig {
                message: format!("failed to parse world config: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EngineError> {
        let chances = [
            ("join_chance", self.join_chance),
            ("leave_chance", self.leave_chance),
            ("spawn_chance", self.spawn_chance),
            ("despawn_chance", self.despawn_chance),
            ("chat_chance", self.chat_chance),
            ("region_chance", self.region_chance),
            ("command_chance", self.command_chance),
        ];
        for (name, chance) in chances {
            if !(0.0..=1.0).contains(&chance) {
                return Err(EngineError::WorldConfig {
                    message: format!("{name} must be between 0 and 1, got {chance}"),
                });
            }
        }
        Ok(())
    }
}

fn default_world_name() -> String {
    String::from("overworld")
}

const fn default_initial_players() -> u32 {
    3
}

const fn default_initial_entities() -> u32 {
    4
}

const fn default_max_players() -> u32 {
    8
}

const fn default_max_entities() -> u32 {
    16
}

const fn default_join_chance() -> f64 {
    0.02
}

const fn default_leave_chance() -> f64 {
    0.01
}

const fn default_spawn_chance() -> f64 {
    0.05
}

const fn default_despawn_chance() -> f64 {
    0.04
}

const fn default_chat_chance() -> f64 {
    0.03
}

const fn default_region_chance() -> f64 {
    0.02
}

const fn default_command_chance() -> f64 {
    0.01
}

const fn default_save_interval_ticks() -> u64 {
    1_200
}

// -----------------------------------------------------------------------
// Pools
// -----------------------------------------------------------------------

/// Player names handed out on join.
pub const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze",
    "Iris", "Juniper", "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine",
];

/// Entity types that spawn.
pub const ENTITY_TYPES: &[&str] = &["zombie", "skeleton", "cow", "sheep", "chicken", "creeper"];

/// Lines players say.
pub const CHAT_LINES: &[&str] = &[
    "hello",
    "anyone want to trade?",
    "found diamonds",
    "brb",
    "where is spawn?",
];

/// Named regions players walk into.
pub const REGIONS: &[&str] = &["spawn", "market", "arena", "farmlands"];

/// Options of the demo `vote` command.
pub const VOTE_OPTIONS: &[&str] = &["day", "night", "rain"];
