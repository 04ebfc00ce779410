//! Traits the simulation world implements for the host and the dispatcher.

use simgate_types::SimEvent;
use uuid::Uuid;

/// A tick-driven world owned by the simulation thread.
pub trait Simulation: 'static {
    /// Advance the world by one tick.
    fn tick(&mut self, tick: u64);

    /// Take every event raised since the last call, in the order raised.
    fn drain_events(&mut self) -> Vec<SimEvent>;
}

/// Message delivery used by webhook replies.
pub trait Messaging {
    /// Send `message` to every online player. Returns how many received it.
    fn broadcast(&mut self, message: &str) -> usize;

    /// Send `message` to one player. Returns `false` if the player is not
    /// online.
    fn message_player(&mut self, player: Uuid, message: &str) -> bool;
}
