//! The simulation thread.
//!
//! [`spawn_simulation`] starts a dedicated, named OS thread that owns the
//! world. Each loop iteration:
//!
//! 1. runs one tick if the interval has elapsed and ticking is not paused
//! 2. publishes the events the tick raised
//! 3. serves queued bridge calls until the next tick is due, publishing the
//!    events each call raised
//!
//! Events are published while the world is parked, so listeners can make
//! inline bridge calls. A `SERVER_START` event is published before the
//! first tick and `SERVER_STOP` after the last.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::json;
use simgate_types::{EventData, EventKind, SimEvent};
use tracing::{info, warn};

use crate::bridge::{self, BridgeStats, MainThreadBridge};
use crate::bus::EventBus;
use crate::control::HostControl;
use crate::error::SimError;
use crate::world::Simulation;

/// Summary returned when the simulation thread exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostReport {
    /// Ticks run by this host.
    pub total_ticks: u64,
    /// Bridge counters at exit.
    pub bridge: BridgeStats,
    /// Calls still queued at exit, rejected with an error.
    pub rejected_calls: usize,
}

/// Start the simulation thread.
///
/// `factory` builds the world on the new thread, so the world type never
/// has to be `Send`.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn_simulation<W, F>(
    name: &str,
    bridge: Arc<MainThreadBridge<W>>,
    bus: Arc<EventBus>,
    control: Arc<HostControl>,
    factory: F,
) -> std::io::Result<JoinHandle<HostReport>>
where
    W: Simulation,
    F: FnOnce() -> W + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || run(&bridge, &bus, &control, factory))
}

fn run<W, F>(
    bridge: &MainThreadBridge<W>,
    bus: &EventBus,
    control: &HostControl,
    factory: F,
) -> HostReport
where
    W: Simulation,
    F: FnOnce() -> W,
{
    if let Err(err) = bridge.bind_current_thread() {
        bridge.reporter().report(&err, "simulation host start");
        return HostReport {
            total_ticks: 0,
            bridge: bridge.stats(),
            rejected_calls: 0,
        };
    }

    bridge::park_world(factory());
    info!(
        tick_interval_ms = control.tick_interval_ms(),
        "Simulation thread started"
    );
    bus.publish(&lifecycle(EventKind::ServerStart));

    let mut tick = control.current_tick();
    let mut total_ticks: u64 = 0;
    let mut next_tick = Instant::now();

    loop {
        if control.is_stop_requested() {
            info!(tick, "Stop requested");
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            if !control.is_paused() {
                tick = tick.saturating_add(1);
                run_tick::<W>(bridge, tick);
                control.record_tick(tick);
                total_ticks = total_ticks.saturating_add(1);
                publish_raised::<W>(bus);
            }
            let interval = Duration::from_millis(control.tick_interval_ms());
            next_tick = now.checked_add(interval).unwrap_or(now);
        }

        // --- Serve bridge calls until the next tick is due ---
        while bridge.run_next_until(next_tick) {
            publish_raised::<W>(bus);
            if control.is_stop_requested() {
                break;
            }
        }
    }

    bus.publish(&lifecycle(EventKind::ServerStop));
    publish_raised::<W>(bus);
    let rejected_calls = bridge.shutdown();
    if rejected_calls > 0 {
        warn!(rejected_calls, "Rejected queued bridge calls at shutdown");
    }
    drop(bridge::unpark_world::<W>());
    info!(total_ticks, "Simulation thread stopped");

    HostReport {
        total_ticks,
        bridge: bridge.stats(),
        rejected_calls,
    }
}

fn run_tick<W: Simulation>(bridge: &MainThreadBridge<W>, tick: u64) {
    let outcome = bridge::with_parked::<W, _>(|world| {
        panic::catch_unwind(AssertUnwindSafe(|| world.tick(tick)))
    });
    if let Some(Err(_panic)) = outcome {
        bridge.reporter().report(
            &SimError::Internal(format!("tick {tick} panicked")),
            "simulation tick",
        );
    }
}

/// Publish everything the world raised since the last drain.
fn publish_raised<W: Simulation>(bus: &EventBus) {
    let events = bridge::with_parked::<W, _>(W::drain_events).unwrap_or_default();
    for event in &events {
        bus.publish(event);
    }
}

fn lifecycle(kind: EventKind) -> SimEvent {
    SimEvent::new(
        kind,
        EventData::new(json!({ "timestamp": chrono::Utc::now().to_rfc3339() })),
    )
    .with_source("server")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::bus::EventSelector;
    use crate::report::Reporter;

    #[derive(Default)]
    struct Clock {
        ticks: Vec<u64>,
        raised: Vec<SimEvent>,
    }

    impl Simulation for Clock {
        fn tick(&mut self, tick: u64) {
            self.ticks.push(tick);
            self.raised
                .push(SimEvent::new(EventKind::Chat, EventData::new(json!({ "tick": tick }))));
        }

        fn drain_events(&mut self) -> Vec<SimEvent> {
            std::mem::take(&mut self.raised)
        }
    }

    fn start() -> (
        Arc<MainThreadBridge<Clock>>,
        Arc<EventBus>,
        Arc<HostControl>,
    ) {
        let bridge = Arc::new(MainThreadBridge::new(
            Duration::from_secs(2),
            Reporter::log_only(),
        ));
        (bridge, Arc::new(EventBus::new()), Arc::new(HostControl::new(10)))
    }

    #[test]
    fn ticks_and_serves_calls() {
        let (bridge, bus, control) = start();
        let chats = Arc::new(AtomicUsize::new(0));
        {
            let chats = Arc::clone(&chats);
            bus.subscribe(
                EventSelector::Kind(EventKind::Chat),
                Arc::new(move |_event| {
                    chats.fetch_add(1, Ordering::Relaxed);
                }),
            );
        }
        let handle = spawn_simulation(
            "sim-test",
            Arc::clone(&bridge),
            Arc::clone(&bus),
            Arc::clone(&control),
            Clock::default,
        )
        .unwrap();

        let mut seen = 0;
        while seen < 3 {
            seen = bridge.call(|clock: &mut Clock| Ok(clock.ticks.len())).unwrap();
        }
        control.request_stop();
        let report = handle.join().unwrap();
        assert!(report.total_ticks >= 3);
        assert!(chats.load(Ordering::Relaxed) >= 3);
        assert!(control.current_tick() >= 3);
    }

    #[test]
    fn paused_host_still_serves_calls() {
        let (bridge, bus, control) = start();
        control.pause();
        let handle = spawn_simulation(
            "sim-paused",
            Arc::clone(&bridge),
            bus,
            Arc::clone(&control),
            Clock::default,
        )
        .unwrap();
        let ticks = bridge.call(|clock: &mut Clock| Ok(clock.ticks.len())).unwrap();
        assert_eq!(ticks, 0);
        control.request_stop();
        assert_eq!(handle.join().unwrap().total_ticks, 0);
    }

    #[test]
    fn calls_after_stop_fail_fast() {
        let (bridge, bus, control) = start();
        let handle = spawn_simulation(
            "sim-stop",
            Arc::clone(&bridge),
            bus,
            Arc::clone(&control),
            Clock::default,
        )
        .unwrap();
        control.request_stop();
        handle.join().unwrap();
        let late = bridge.call(|clock: &mut Clock| Ok(clock.ticks.len()));
        assert!(matches!(late, Err(SimError::Internal(_))));
    }
}
