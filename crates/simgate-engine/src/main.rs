//! Demo game server for simgate.
//!
//! Wires a simulated game world to the main-thread bridge, the snapshot
//! cache, the webhook dispatcher and the HTTP adapter, then runs until
//! `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load `simgate-config.yaml` (defaults when absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the error reporter, the bridge, the event bus and host control
//! 4. Register object kinds and methods, build the operation table
//! 5. Detect optional integrations
//! 6. Build the snapshot cache and the webhook dispatcher, load hooks
//! 7. Start the simulation thread
//! 8. Start the observer API server
//! 9. Reload hooks on `SIGHUP`, stop on `Ctrl-C`

mod activity;
mod error;
mod kinds;
mod listeners;
mod methods;
mod world;

use std::path::Path;
use std::sync::Arc;

use simgate_core::{
    EventBus, HostControl, IntegrationSupervisor, MainThreadBridge, OperationTable, Reporter,
    SimgateConfig, SnapshotCache, spawn_simulation,
};
use simgate_hooks::{
    BridgeReplies, CustomEventRegistry, Delivery, FilterRegistry, WebHookDispatcher,
};
use simgate_observer::AppState;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::activity::ActivityConfig;
use crate::error::EngineError;
use crate::world::{GameWorld, REGION_ENTER};

/// Path of the main configuration file.
const CONFIG_PATH: &str = "simgate-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, activity, found) = load_config(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_default| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("simgate-engine starting");
    if !found {
        info!(path = CONFIG_PATH, "Config file not found, using defaults");
    }
    info!(
        call_timeout_ms = config.bridge.call_timeout_ms,
        tick_interval_ms = config.host.tick_interval_ms,
        hooks_file = %config.hooks_file.display(),
        "Configuration loaded"
    );

    // 3. Core plumbing.
    let reporter = Reporter::from_config(&config.reporting, None);
    let bridge = Arc::new(MainThreadBridge::<GameWorld>::from_config(
        &config.bridge,
        reporter.clone(),
    ));
    let bus = Arc::new(EventBus::new());
    let control = Arc::new(HostControl::new(config.host.tick_interval_ms));

    // 4. Kinds, methods, operations.
    let identities = kinds::registry()?;
    let methods = methods::registry(&identities)?;
    let operations = OperationTable::build(&identities, &methods, &config.servlets);
    info!(operations = operations.len(), "Operation table built");

    // 5. Optional integrations.
    info!("Checking integrations...");
    let mut supervisor = IntegrationSupervisor::new();
    supervisor.register("regions", || true);
    supervisor.register("economy", || false);
    let integrations = supervisor.apply(&config.servlets);

    // 6. Cache and webhooks.
    let cache = Arc::new(SnapshotCache::new(
        Arc::clone(&bridge),
        Arc::new(identities),
        Arc::new(methods),
        &config.cache,
    ));

    let mut custom_events = CustomEventRegistry::new();
    if integrations.is_active("regions") {
        custom_events.register_passthrough(REGION_ENTER)?;
    }
    let delivery = Arc::new(Delivery::new(
        Arc::new(BridgeReplies::new(Arc::clone(&bridge))),
        reporter.clone(),
    ));
    let hooks = WebHookDispatcher::new(
        Arc::clone(&bus),
        Handle::current(),
        delivery,
        FilterRegistry::with_builtins(),
        custom_events,
    );
    hooks.reload_from_file(&config.hooks_file)?;

    listeners::subscribe_invalidation(&bus, &cache);
    listeners::subscribe_commands(&bus, &hooks);

    // 7. Simulation thread.
    let host = spawn_simulation(
        "simgate-sim",
        Arc::clone(&bridge),
        Arc::clone(&bus),
        Arc::clone(&control),
        move || GameWorld::new(activity),
    )
    .map_err(|e| EngineError::Host {
        message: format!("failed to spawn simulation thread: {e}"),
    })?;

    // 8. Observer API server.
    let stats_bridge = Arc::clone(&bridge);
    let state = AppState::new(cache, operations)
        .with_integrations(integrations)
        .with_control(Arc::clone(&control))
        .with_bridge_stats(Arc::new(move || stats_bridge.stats()));
    let shutdown = Arc::new(Notify::new());
    let observer = {
        let shutdown = Arc::clone(&shutdown);
        simgate_observer::spawn_observer(&config.server, Arc::new(state), async move {
            shutdown.notified().await;
        })
        .await?
    };
    info!(addr = %observer.addr, "Observer API server started");

    // 9. Run until Ctrl-C.
    wait_for_shutdown(&hooks, &config.hooks_file).await?;

    info!("Shutting down");
    control.request_stop();
    let report = tokio::task::spawn_blocking(move || host.join())
        .await
        .map_err(|e| EngineError::Host {
            message: format!("join task failed: {e}"),
        })?
        .map_err(|_panic| EngineError::Host {
            message: String::from("simulation thread panicked"),
        })?;

    shutdown.notify_one();
    if let Err(e) = observer.task.await {
        warn!(error = %e, "Observer task did not finish cleanly");
    }

    info!(
        total_ticks = report.total_ticks,
        completed_calls = report.bridge.completed,
        timed_out_calls = report.bridge.timed_out,
        rejected_calls = report.rejected_calls,
        "simgate-engine shutdown complete"
    );
    Ok(())
}

/// Load the main configuration and the `world` section from `path`.
///
/// Logging is not initialized yet, so whether the file was found is
/// returned for the caller to log.
fn load_config(path: &Path) -> Result<(SimgateConfig, ActivityConfig, bool), EngineError> {
    if !path.exists() {
        return Ok((
            SimgateConfig::parse("")?,
            ActivityConfig::default(),
            false,
        ));
    }
    let contents = std::fs::read_to_string(path).map_err(|source| EngineError::Config {
        source: source.into(),
    })?;
    let config = SimgateConfig::parse(&contents)?;
    let activity = ActivityConfig::from_document(&contents)?;
    Ok((config, activity, true))
}

/// Block until `Ctrl-C`, reloading hooks from `hooks_file` on every
/// `SIGHUP`. A failed reload keeps the previous hooks.
#[cfg(unix)]
async fn wait_for_shutdown(
    hooks: &Arc<WebHookDispatcher>,
    hooks_file: &Path,
) -> Result<(), EngineError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup =
        signal(SignalKind::hangup()).map_err(|source| EngineError::Signal { source })?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                return result.map_err(|source| EngineError::Signal { source });
            }
            _ = hangup.recv() => {
                info!(path = %hooks_file.display(), "SIGHUP received, reloading hooks");
                if let Err(e) = hooks.reload_from_file(hooks_file) {
                    error!(error = %e, "Hook reload failed, keeping previous hooks");
                }
            }
        }
    }
}

/// Block until `Ctrl-C`.
#[cfg(not(unix))]
async fn wait_for_shutdown(
    _hooks: &Arc<WebHookDispatcher>,
    _hooks_file: &Path,
) -> Result<(), EngineError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| EngineError::Signal { source })
}
