//! Webhook replies that message players back.
//!
//! A hook may answer with
//!
//! ```json
//! { "message": "Welcome!", "targets": ["server", "<player uuid>"] }
//! ```
//!
//! The target `server` broadcasts; anything else is a player UUID. An
//! empty body or a body of `OK` means no reply.

use std::sync::Arc;

use serde::Deserialize;
use simgate_core::{MainThreadBridge, Messaging, SimError};
use tracing::debug;
use uuid::Uuid;

/// A parsed reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HookReply {
    /// Text to deliver.
    pub message: String,
    /// Where to deliver it.
    #[serde(default)]
    pub targets: Vec<String>,
}

/// One resolved reply target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// Every online player.
    Server,
    /// One player.
    Player(Uuid),
}

impl HookReply {
    /// Parse a response body. `Ok(None)` when the hook sent no reply.
    pub fn parse(body: &str) -> Result<Option<Self>, serde_json::Error> {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("OK") {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }

    /// Resolved targets. Entries that are neither `server` nor a UUID are
    /// dropped.
    pub fn resolved_targets(&self) -> Vec<ReplyTarget> {
        self.targets
            .iter()
            .filter_map(|target| {
                if target.eq_ignore_ascii_case("server") {
                    return Some(ReplyTarget::Server);
                }
                let parsed = Uuid::parse_str(target).ok().map(ReplyTarget::Player);
                if parsed.is_none() {
                    debug!(target = %target, "Ignoring malformed reply target");
                }
                parsed
            })
            .collect()
    }

    /// Deliver the message in `world`. Returns how many players received
    /// it; players who are offline are skipped.
    pub fn deliver<W: Messaging>(&self, world: &mut W) -> usize {
        self.resolved_targets()
            .into_iter()
            .map(|target| match target {
                ReplyTarget::Server => world.broadcast(&self.message),
                ReplyTarget::Player(player) => usize::from(world.message_player(player, &self.message)),
            })
            .fold(0_usize, usize::saturating_add)
    }
}

/// Where parsed replies are sent. Called from a blocking task, never from
/// the simulation thread.
pub trait ReplySink: Send + Sync {
    /// Deliver `reply` and return how many players received it.
    fn deliver(&self, reply: HookReply) -> Result<usize, SimError>;
}

/// Delivers replies on the simulation thread through the bridge.
pub struct BridgeReplies<W: 'static> {
    bridge: Arc<MainThreadBridge<W>>,
}

impl<W: 'static> BridgeReplies<W> {
    /// Deliver through `bridge`.
    pub const fn new(bridge: Arc<MainThreadBridge<W>>) -> Self {
        Self { bridge }
    }
}

impl<W: Messaging + 'static> ReplySink for BridgeReplies<W> {
    fn deliver(&self, reply: HookReply) -> Result<usize, SimError> {
        self.bridge.call(move |world: &mut W| Ok(reply.deliver(world)))
    }
}
