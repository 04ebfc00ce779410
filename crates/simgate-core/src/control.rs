//! Runtime control of the simulation host.
//!
//! Shared atomic state read by the host loop on every iteration and written
//! by whoever manages the process (signal handlers, the HTTP adapter). No
//! locks on the hot path.
//!
//! A paused host keeps serving bridge calls; only ticks stop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Smallest accepted tick interval.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Shared host control state.
#[derive(Debug)]
pub struct HostControl {
    /// Whether ticking is paused.
    paused: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Current tick interval in milliseconds (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Last completed tick.
    current_tick: AtomicU64,

    /// Wall-clock time when the host was created.
    started_at: DateTime<Utc>,
}

impl HostControl {
    /// Create control state with the given tick interval.
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(tick_interval_ms.max(MIN_TICK_INTERVAL_MS)),
            current_tick: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether ticking is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause ticking.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume ticking.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Tick Speed
    // -----------------------------------------------------------------------

    /// Get the current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Set the tick interval in milliseconds.
    ///
    /// Returns the previous interval, or `None` if `ms` is below
    /// [`MIN_TICK_INTERVAL_MS`].
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }

    // -----------------------------------------------------------------------
    // Tick counter
    // -----------------------------------------------------------------------

    /// Last completed tick.
    pub fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }

    pub(crate) fn record_tick(&self, tick: u64) {
        self.current_tick.store(tick, Ordering::Release);
    }

    /// Elapsed seconds since creation.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// JSON-serializable status.
    pub fn status(&self) -> HostStatus {
        HostStatus {
            tick: self.current_tick(),
            paused: self.is_paused(),
            stop_requested: self.is_stop_requested(),
            tick_interval_ms: self.tick_interval_ms(),
            elapsed_seconds: self.elapsed_seconds(),
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

/// JSON-serializable status of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    /// Last completed tick.
    pub tick: u64,
    /// Whether ticking is paused.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Current tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Elapsed wall-clock seconds since start.
    pub elapsed_seconds: u64,
    /// RFC 3339 timestamp of when the host started.
    pub started_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_and_resume() {
        let control = HostControl::new(50);
        assert!(!control.is_paused());
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
    }

    #[test]
    fn interval_has_a_floor() {
        let control = HostControl::new(1);
        assert_eq!(control.tick_interval_ms(), MIN_TICK_INTERVAL_MS);
        assert_eq!(control.set_tick_interval_ms(5), None);
        assert_eq!(control.set_tick_interval_ms(100), Some(MIN_TICK_INTERVAL_MS));
        assert_eq!(control.tick_interval_ms(), 100);
    }

    #[test]
    fn status_reflects_state() {
        let control = HostControl::new(50);
        control.record_tick(12);
        control.request_stop();
        let status = control.status();
        assert_eq!(status.tick, 12);
        assert!(status.stop_requested);
        assert_eq!(status.tick_interval_ms, 50);
    }
}
