//! Fan-out of simulation events to webhooks.
//!
//! # Notification lifecycle
//!
//! ```text
//! Triggered -> Filtered -> Skipped
//!                       -> Queued -> Delivering -> Delivered
//!                                               -> Failed
//! ```
//!
//! Filtering and payload rendering happen on the notifying thread (usually
//! the simulation thread). Each surviving hook gets its own task on the
//! notification runtime, spawned in configuration order; the requests then
//! complete in any order.
//!
//! # Reload
//!
//! [`WebHookDispatcher::reload`] is the only way the hook table changes. The
//! new configuration is validated and armed in full before anything is
//! touched, so an invalid file leaves the running table in place.
//! Notifications already in progress keep using the table they started
//! with.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use simgate_core::methods::{check_schema, validate_args};
use simgate_core::{EventBus, EventSelector, ListenerId, ParamSpec, SimError};
use simgate_types::{EventData, EventKind, SimEvent};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::HookConfig;
use crate::custom::CustomEventRegistry;
use crate::delivery::{Delivery, DeliveryJob};
use crate::error::HookError;
use crate::filter::{FilterRegistry, HookFilter};
use crate::hook::{CommandHook, WebHook};
use crate::payload;

/// What one notification did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Hooks a delivery task was spawned for.
    pub queued: usize,
    /// Hooks whose filter rejected the event, or whose payload could not be
    /// rendered.
    pub skipped: usize,
}

/// Counts from a successful reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// Enabled hooks on built-in event kinds.
    pub event_hooks: usize,
    /// Enabled commands.
    pub commands: usize,
    /// Enabled hooks on custom events.
    pub custom_hooks: usize,
    /// Hooks and commands dropped because they are disabled.
    pub disabled: usize,
}

/// A registered command, as exposed to the command layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandBinding {
    /// Command name.
    pub name: String,
    /// Additional names.
    pub aliases: Vec<String>,
    /// Declared parameters.
    pub params: Vec<ParamSpec>,
}

struct ArmedHook {
    hook: Arc<WebHook>,
    filter: Option<Arc<dyn HookFilter>>,
}

struct ArmedCommand {
    binding: CommandBinding,
    hooks: Vec<ArmedHook>,
}

#[derive(Default)]
struct HookTable {
    events: HashMap<EventKind, Vec<ArmedHook>>,
    /// Keyed by name and by every alias.
    commands: BTreeMap<String, Arc<ArmedCommand>>,
    custom: BTreeMap<String, Vec<ArmedHook>>,
    timeout: Duration,
}

/// Routes events to the configured hooks.
pub struct WebHookDispatcher {
    table: RwLock<Arc<HookTable>>,
    reload_lock: Mutex<()>,
    builtin_listener: Mutex<Option<ListenerId>>,
    custom_listeners: Mutex<Vec<ListenerId>>,
    filters: FilterRegistry,
    custom_events: CustomEventRegistry,
    bus: Arc<EventBus>,
    runtime: Handle,
    delivery: Arc<Delivery>,
}

impl core::fmt::Debug for WebHookDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebHookDispatcher")
            .field("filters", &self.filters)
            .field("custom_events", &self.custom_events)
            .finish_non_exhaustive()
    }
}

impl WebHookDispatcher {
    /// Create a dispatcher with an empty hook table and subscribe it to
    /// every built-in event on `bus`. Deliveries are spawned on `runtime`.
    pub fn new(
        bus: Arc<EventBus>,
        runtime: Handle,
        delivery: Arc<Delivery>,
        filters: FilterRegistry,
        custom_events: CustomEventRegistry,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Self {
            table: RwLock::new(Arc::new(HookTable::default())),
            reload_lock: Mutex::new(()),
            builtin_listener: Mutex::new(None),
            custom_listeners: Mutex::new(Vec::new()),
            filters,
            custom_events,
            bus,
            runtime,
            delivery,
        });
        let weak = Arc::downgrade(&dispatcher);
        let id = dispatcher.bus.subscribe(
            EventSelector::All,
            Arc::new(move |event: &SimEvent| {
                if event.kind == EventKind::CustomEvent {
                    return;
                }
                if let Some(dispatcher) = weak.upgrade() {
                    dispatcher.notify(event);
                }
            }),
        );
        *dispatcher.builtin_listener.lock() = Some(id);
        dispatcher
    }

    // -----------------------------------------------------------------------
    // Reload
    // -----------------------------------------------------------------------

    /// Replace the hook table with `config`.
    ///
    /// Reloads are serialized. On error the previous table and listeners
    /// stay active.
    pub fn reload(self: &Arc<Self>, config: &HookConfig) -> Result<ReloadReport, HookError> {
        let _serialized = self.reload_lock.lock();
        info!("Loading web hooks...");
        let (table, report) = self.arm(config)?;

        for id in self.custom_listeners.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
        let tags: Vec<String> = table.custom.keys().cloned().collect();
        *self.table.write() = Arc::new(table);

        let mut listeners = self.custom_listeners.lock();
        for tag in tags {
            let weak: Weak<Self> = Arc::downgrade(self);
            listeners.push(self.bus.subscribe(
                EventSelector::Custom(tag),
                Arc::new(move |event: &SimEvent| {
                    if let Some(dispatcher) = weak.upgrade() {
                        dispatcher.notify_custom(event);
                    }
                }),
            ));
        }
        info!(
            event_hooks = report.event_hooks,
            commands = report.commands,
            custom_hooks = report.custom_hooks,
            disabled = report.disabled,
            "Web hooks loaded"
        );
        Ok(report)
    }

    /// Load `path` and reload from it.
    pub fn reload_from_file(self: &Arc<Self>, path: &Path) -> Result<ReloadReport, HookError> {
        let config = HookConfig::from_file(path)?;
        self.reload(&config)
    }

    fn arm(&self, config: &HookConfig) -> Result<(HookTable, ReloadReport), HookError> {
        let mut report = ReloadReport::default();
        let mut table = HookTable {
            timeout: Duration::from_millis(config.delivery_timeout_ms),
            ..HookTable::default()
        };

        for (kind, hooks) in &config.events {
            if !hooks.is_empty() {
                info!(event = %kind, "  Event: {kind}");
            }
            let armed = self.arm_all(hooks, &mut report.disabled)?;
            report.event_hooks = report.event_hooks.saturating_add(armed.len());
            table.events.insert(*kind, armed);
        }

        for (tag, hooks) in &config.custom {
            if !self.custom_events.contains(tag) {
                return Err(HookError::UnknownCustomEvent(tag.clone()));
            }
            info!(tag = %tag, "  Custom event: {tag}");
            let armed = self.arm_all(hooks, &mut report.disabled)?;
            report.custom_hooks = report.custom_hooks.saturating_add(armed.len());
            table.custom.insert(tag.clone(), armed);
        }

        for (name, command) in &config.command {
            let Some(armed) = self.arm_command(name, command, &mut report.disabled)? else {
                continue;
            };
            let armed = Arc::new(armed);
            for alias in std::iter::once(name).chain(&command.aliases) {
                if table.commands.insert(alias.clone(), Arc::clone(&armed)).is_some() {
                    return Err(HookError::InvalidCommand {
                        name: name.clone(),
                        source: SimError::invalid(format!("command name '{alias}' is already taken")),
                    });
                }
            }
            report.commands = report.commands.saturating_add(1);
        }

        Ok((table, report))
    }

    fn arm_command(
        &self,
        name: &str,
        command: &CommandHook,
        disabled: &mut usize,
    ) -> Result<Option<ArmedCommand>, HookError> {
        let invalid = |source: SimError| HookError::InvalidCommand {
            name: name.to_owned(),
            source,
        };
        if name.is_empty() || command.aliases.iter().any(String::is_empty) {
            return Err(invalid(SimError::invalid("command names must not be empty")));
        }
        check_schema(&command.params).map_err(invalid)?;

        info!(
            command = %name,
            "  Command: {name} [{}]",
            if command.enabled { "ON" } else { "DISABLED" }
        );
        let hooks = self.arm_all(&command.hooks, disabled)?;
        if !command.enabled {
            *disabled = disabled.saturating_add(1);
            return Ok(None);
        }
        Ok(Some(ArmedCommand {
            binding: CommandBinding {
                name: name.to_owned(),
                aliases: command.aliases.clone(),
                params: command.params.clone(),
            },
            hooks,
        }))
    }

    fn arm_all(&self, hooks: &[WebHook], disabled: &mut usize) -> Result<Vec<ArmedHook>, HookError> {
        let mut armed = Vec::with_capacity(hooks.len());
        for hook in hooks {
            let filter = self.validate(hook)?;
            info!(
                hook = %hook.address,
                "    {} [{}]",
                hook.address,
                if hook.enabled { "ON" } else { "DISABLED" }
            );
            if hook.enabled {
                armed.push(ArmedHook {
                    hook: Arc::new(hook.clone()),
                    filter,
                });
            } else {
                *disabled = disabled.saturating_add(1);
            }
        }
        Ok(armed)
    }

    /// Check a hook and build its filter.
    fn validate(&self, hook: &WebHook) -> Result<Option<Arc<dyn HookFilter>>, HookError> {
        let invalid = |reason: String| HookError::InvalidHook {
            address: hook.address.clone(),
            reason,
        };
        let url = reqwest::Url::parse(&hook.address).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        reqwest::Method::from_bytes(hook.method.as_bytes())
            .map_err(|_err| invalid(format!("invalid method '{}'", hook.method)))?;
        for header in &hook.headers {
            HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|_err| invalid(format!("invalid header name '{}'", header.name)))?;
            HeaderValue::from_str(&header.value)
                .map_err(|_err| invalid(format!("invalid value for header '{}'", header.name)))?;
        }

        let Some(spec) = &hook.filter else {
            return Ok(None);
        };
        match self.filters.build(&spec.name, &spec.config) {
            None => Err(HookError::UnknownFilter {
                address: hook.address.clone(),
                filter: spec.name.clone(),
            }),
            Some(Err(reason)) => Err(HookError::InvalidFilter {
                address: hook.address.clone(),
                filter: spec.name.clone(),
                reason,
            }),
            Some(Ok(filter)) => Ok(Some(filter)),
        }
    }

    // -----------------------------------------------------------------------
    // Notification
    // -----------------------------------------------------------------------

    /// Notify the hooks for `event.kind` followed by the `ALL` hooks.
    ///
    /// Custom events go to [`notify_custom`](Self::notify_custom) instead.
    pub fn notify(&self, event: &SimEvent) -> DispatchReport {
        if event.kind == EventKind::CustomEvent {
            return self.notify_custom(event);
        }
        let table = self.current();
        let mut report = DispatchReport::default();
        if let Some(hooks) = table.events.get(&event.kind) {
            self.dispatch(&table, hooks, event.kind, event.source.as_deref(), &event.data, &mut report);
        }
        let catch_all = table
            .events
            .get(&EventKind::All)
            .filter(|_hooks| event.kind != EventKind::All);
        if let Some(hooks) = catch_all {
            self.dispatch(&table, hooks, event.kind, event.source.as_deref(), &event.data, &mut report);
        }
        report
    }

    /// Notify the hooks registered for a custom event's tag.
    pub fn notify_custom(&self, event: &SimEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(tag) = event.tag.as_deref() else {
            return report;
        };
        let table = self.current();
        let Some(hooks) = table.custom.get(tag) else {
            return report;
        };
        let Some(data) = self.custom_events.decode(event) else {
            debug!(tag, "Custom event without decoder");
            return report;
        };
        self.dispatch(
            &table,
            hooks,
            EventKind::CustomEvent,
            event.source.as_deref(),
            &data,
            &mut report,
        );
        report
    }

    /// Run command `name` (or one of its aliases) on behalf of `source`.
    ///
    /// # Errors
    ///
    /// - [`SimError::NotFound`] if no enabled command has that name
    /// - [`SimError::InvalidArgument`] if `args` violate the declared
    ///   parameters; nothing is sent
    pub fn notify_command(
        &self,
        name: &str,
        source: &str,
        args: &Map<String, Value>,
    ) -> Result<DispatchReport, SimError> {
        let table = self.current();
        let command = table
            .commands
            .get(name)
            .ok_or_else(|| SimError::not_found(format!("command '{name}'")))?;
        let args = validate_args(&command.binding.params, args)?;
        let data = EventData::new(args.to_json());
        let mut report = DispatchReport::default();
        self.dispatch(
            &table,
            &command.hooks,
            EventKind::CustomCommand,
            Some(source),
            &data,
            &mut report,
        );
        Ok(report)
    }

    /// Every enabled command, once each, by name.
    pub fn command_bindings(&self) -> Vec<CommandBinding> {
        self.current()
            .commands
            .iter()
            .filter(|(key, command)| **key == command.binding.name)
            .map(|(_key, command)| command.binding.clone())
            .collect()
    }

    fn current(&self) -> Arc<HookTable> {
        Arc::clone(&self.table.read())
    }

    fn dispatch(
        &self,
        table: &HookTable,
        hooks: &[ArmedHook],
        kind: EventKind,
        source: Option<&str>,
        data: &EventData,
        report: &mut DispatchReport,
    ) {
        for armed in hooks {
            if armed.filter.as_ref().is_some_and(|filter| !filter.accepts(data)) {
                debug!(hook = %armed.hook.address, event = %kind, "Filtered out");
                report.skipped = report.skipped.saturating_add(1);
                continue;
            }
            let scoped = payload::scope(&armed.hook, data);
            let body = match payload::encode(armed.hook.data_type, &scoped) {
                Ok(body) => body,
                Err(err) => {
                    warn!(hook = %armed.hook.address, error = %err, "Could not render payload");
                    report.skipped = report.skipped.saturating_add(1);
                    continue;
                }
            };
            let job = DeliveryJob {
                hook: Arc::clone(&armed.hook),
                event: kind.as_str(),
                source: source.map(str::to_owned),
                body,
                timeout: table.timeout,
            };
            let delivery = Arc::clone(&self.delivery);
            // The outcome is logged and reported inside `run`.
            self.runtime.spawn(async move {
                let _outcome = delivery.run(job).await;
            });
            report.queued = report.queued.saturating_add(1);
        }
    }
}

impl Drop for WebHookDispatcher {
    fn drop(&mut self) {
        if let Some(id) = self.builtin_listener.get_mut().take() {
            self.bus.unsubscribe(id);
        }
        for id in self.custom_listeners.get_mut().drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}
