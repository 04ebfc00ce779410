//! Simulation-side listeners wired up at startup.
//!
//! Both run inline on the simulation thread and never block: invalidation
//! only touches the cache table, and command hooks spawn their deliveries.

use std::sync::Arc;

use serde_json::Map;
use simgate_core::{EventBus, EventSelector, LiveKind, SimError, SnapshotCache};
use simgate_hooks::WebHookDispatcher;
use simgate_types::{EventKind, KeyId, ObjectKey, SimEvent};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::kinds::{EntityKind, PlayerKind};
use crate::world::GameWorld;

/// Drop cached snapshots of players and entities as they leave the world.
pub fn subscribe_invalidation(bus: &EventBus, cache: &Arc<SnapshotCache<GameWorld>>) {
    let departures = [
        (EventKind::PlayerLeave, PlayerKind::KIND, "/player/uuid"),
        (EventKind::PlayerKick, PlayerKind::KIND, "/player/uuid"),
        (EventKind::EntityDespawn, EntityKind::KIND, "/entity/uuid"),
    ];
    for (event_kind, object_kind, pointer) in departures {
        let cache = Arc::clone(cache);
        bus.subscribe(
            EventSelector::Kind(event_kind),
            Arc::new(move |event: &SimEvent| {
                let Some(id) = departed(event, pointer) else {
                    return;
                };
                let key = ObjectKey::new(object_kind, KeyId::Uuid(id));
                if cache.invalidate(&key) {
                    debug!(%key, "Snapshot invalidated");
                }
            }),
        );
    }
}

fn departed(event: &SimEvent, pointer: &str) -> Option<Uuid> {
    event
        .data
        .lookup(pointer)
        .and_then(|value| value.as_str())
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Route `COMMAND` events to command hooks.
pub fn subscribe_commands(bus: &EventBus, hooks: &Arc<WebHookDispatcher>) {
    let hooks = Arc::downgrade(hooks);
    bus.subscribe(
        EventSelector::Kind(EventKind::Command),
        Arc::new(move |event: &SimEvent| {
            let Some(hooks) = hooks.upgrade() else {
                return;
            };
            let Some(name) = event.data.lookup("/command").and_then(|v| v.as_str()) else {
                return;
            };
            let source = event.source.as_deref().unwrap_or("console");
            let args = event
                .data
                .lookup("/args")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_else(Map::new);
            match hooks.notify_command(name, source, &args) {
                Ok(report) => debug!(command = name, queued = report.queued, "Command hooks notified"),
                Err(SimError::NotFound(_)) => debug!(command = name, "No hook for command"),
                Err(err) => warn!(command = name, error = %err, "Command rejected"),
            }
        }),
    );
}
