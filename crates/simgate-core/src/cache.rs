//! Snapshot cache: immutable, shareable captures keyed by stable identity.
//!
//! Request threads read snapshots from here. A miss costs exactly one
//! bridge call, however many threads ask for the same key at once:
//!
//! - The first caller inserts a pending slot (atomic insert-if-absent on
//!   the shard) and becomes the leader.
//! - Callers that find the pending slot wait on it and receive the
//!   leader's snapshot or the leader's failure.
//! - A failed capture leaves nothing behind, so the next `get` retries.
//!
//! Captures run entirely inside one bridge call, so a cached snapshot is
//! always one whole capture.
//!
//! `list` captures a whole kind in a single bridge call and rebuilds that
//! kind's part of the index. Every invalidation bumps an epoch for the
//! kinds it touches; a `list` whose kind was invalidated after its capture
//! started returns its snapshots but stores none of them. `invoke` always
//! goes live and never touches cached entries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex};
use serde_json::{Map, Value};
use simgate_types::{DetailLevel, ObjectKey, ObjectKind, Snapshot};
use tracing::debug;

use crate::bridge::MainThreadBridge;
use crate::config::CacheConfig;
use crate::error::SimError;
use crate::identity::IdentityRegistry;
use crate::methods::MethodRegistry;

/// A cached snapshot and when it was captured.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The snapshot.
    pub snapshot: Arc<Snapshot>,
    /// When the snapshot was stored.
    pub last_refreshed: Instant,
}

impl CacheEntry {
    fn new(snapshot: Arc<Snapshot>) -> Self {
        Self {
            snapshot,
            last_refreshed: Instant::now(),
        }
    }
}

type CaptureResult = Result<Arc<Snapshot>, SimError>;

/// A capture in progress, shared by the leader and every waiter.
struct InFlight {
    result: Mutex<Option<CaptureResult>>,
    ready: Condvar,
}

impl InFlight {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    fn finish(&self, result: CaptureResult) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    /// Block until the leader finishes. The leader's bridge call is bounded
    /// by its deadline, so this is too.
    fn wait(&self) -> CaptureResult {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut guard);
        }
    }
}

enum Slot {
    Ready(CacheEntry),
    Pending(Arc<InFlight>),
}

enum Lookup {
    Hit(Arc<Snapshot>),
    Wait(Arc<InFlight>),
    Lead(Arc<InFlight>),
}

/// Fails the in-flight capture if the leader unwinds before publishing.
struct Publish<'a, W: 'static> {
    cache: &'a SnapshotCache<W>,
    key: &'a ObjectKey,
    flight: &'a Arc<InFlight>,
    done: bool,
}

impl<W: 'static> Publish<'_, W> {
    fn complete(mut self, result: CaptureResult) -> CaptureResult {
        self.done = true;
        self.cache.settle(self.key, self.flight, &result);
        self.flight.finish(result.clone());
        result
    }
}

impl<W: 'static> Drop for Publish<'_, W> {
    fn drop(&mut self) {
        if !self.done {
            let result = Err(SimError::Internal(String::from("snapshot capture abandoned")));
            self.cache.settle(self.key, self.flight, &result);
            self.flight.finish(result);
        }
    }
}

/// Invalidation counters, per kind and for the whole cache.
#[derive(Debug, Default)]
struct Epochs {
    all: u64,
    kinds: HashMap<ObjectKind, u64>,
}

impl Epochs {
    fn of(&self, kind: ObjectKind) -> (u64, u64) {
        (self.all, self.kinds.get(&kind).copied().unwrap_or(0))
    }

    fn bump(&mut self, kind: ObjectKind) {
        let epoch = self.kinds.entry(kind).or_default();
        *epoch = epoch.wrapping_add(1);
    }

    const fn bump_all(&mut self) {
        self.all = self.all.wrapping_add(1);
    }
}

/// Concurrent cache of snapshots for every registered object kind.
pub struct SnapshotCache<W: 'static> {
    bridge: Arc<MainThreadBridge<W>>,
    identities: Arc<IdentityRegistry<W>>,
    methods: Arc<MethodRegistry<W>>,
    entries: DashMap<ObjectKey, Slot>,
    epochs: Arc<Mutex<Epochs>>,
    ttl: Option<Duration>,
    captures: AtomicU64,
}

impl<W: 'static> core::fmt::Debug for SnapshotCache<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<W: 'static> SnapshotCache<W> {
    /// Create an empty cache.
    pub fn new(
        bridge: Arc<MainThreadBridge<W>>,
        identities: Arc<IdentityRegistry<W>>,
        methods: Arc<MethodRegistry<W>>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            bridge,
            identities,
            methods,
            entries: DashMap::new(),
            epochs: Arc::new(Mutex::new(Epochs::default())),
            ttl: config.ttl_ms.map(Duration::from_millis),
            captures: AtomicU64::new(0),
        }
    }

    /// The identity registry this cache captures through.
    pub fn identities(&self) -> &IdentityRegistry<W> {
        &self.identities
    }

    /// The method registry `invoke` dispatches through.
    pub fn methods(&self) -> &MethodRegistry<W> {
        &self.methods
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Snapshot of `key` at `detail` or better.
    ///
    /// # Errors
    ///
    /// - [`SimError::NotFound`] if the object no longer exists (any cached
    ///   entry is evicted)
    /// - [`SimError::InvalidArgument`] for an unknown kind
    /// - any bridge failure ([`SimError::Timeout`], [`SimError::Internal`])
    pub fn get(&self, key: &ObjectKey, detail: DetailLevel) -> Result<Arc<Snapshot>, SimError> {
        self.identities.ensure_kind(key.kind)?;
        loop {
            match self.lookup(key, detail) {
                Lookup::Hit(snapshot) => return Ok(snapshot),
                Lookup::Lead(flight) => return self.lead(key, detail, &flight),
                Lookup::Wait(_) if self.bridge.is_simulation_thread() => {
                    // The leader may be queued behind this very thread.
                    return self.capture_uncached(key, detail);
                }
                Lookup::Wait(flight) => match flight.wait() {
                    Ok(snapshot) if snapshot.detail.satisfies(detail) => return Ok(snapshot),
                    // The leader captured less detail than asked for.
                    Ok(_) => {}
                    Err(err) => return Err(err),
                },
            }
        }
    }

    /// Snapshots of every object of `kind`, captured in one bridge call.
    ///
    /// Cached entries of `kind` are replaced by the new captures, at
    /// `detail`: a cached `Full` entry listed at `Basic` is downgraded, and
    /// the next `get` at `Full` captures again. Entries for objects that no
    /// longer exist are evicted. If `kind` is invalidated between the capture
    /// and the writeback, nothing is stored.
    pub fn list(&self, kind: ObjectKind, detail: DetailLevel) -> Result<Vec<Arc<Snapshot>>, SimError> {
        self.identities.ensure_kind(kind)?;
        let identities = Arc::clone(&self.identities);
        let epochs = Arc::clone(&self.epochs);
        let (captured, started) = self.bridge.call(move |world| {
            let started = epochs.lock().of(kind);
            identities
                .capture_all(world, kind, detail)
                .map(|captured| (captured, started))
        })?;
        self.captures.fetch_add(
            u64::try_from(captured.len()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );

        let snapshots: Vec<Arc<Snapshot>> = captured.into_iter().map(Arc::new).collect();
        let present: HashSet<&ObjectKey> = snapshots.iter().map(|snapshot| &snapshot.key).collect();

        // Held through the writeback so no invalidation lands halfway.
        let epochs = self.epochs.lock();
        if epochs.of(kind) == started {
            self.store_listed(&snapshots);
        } else {
            debug!(%kind, "Kind invalidated during list, not caching");
        }
        self.entries.retain(|key, slot| {
            key.kind != kind || matches!(slot, Slot::Pending(_)) || present.contains(key)
        });
        drop(epochs);
        debug!(%kind, count = snapshots.len(), "Listed kind");
        Ok(snapshots)
    }

    fn store_listed(&self, snapshots: &[Arc<Snapshot>]) {
        for snapshot in snapshots {
            match self.entries.entry(snapshot.key.clone()) {
                Entry::Occupied(mut occupied) => {
                    // A pending capture publishes its own result.
                    if matches!(occupied.get(), Slot::Ready(_)) {
                        occupied.insert(Slot::Ready(CacheEntry::new(Arc::clone(snapshot))));
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot::Ready(CacheEntry::new(Arc::clone(snapshot))));
                }
            }
        }
    }

    /// Run a whitelisted method against the live object behind `key`.
    ///
    /// Arguments are validated before anything is queued.
    pub fn invoke(
        &self,
        key: &ObjectKey,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, SimError> {
        self.identities.ensure_kind(key.kind)?;
        let call = self.methods.prepare(key, method, args)?;
        self.bridge.call(move |world| call.run(world))
    }

    /// The cached snapshot for `key`, without capturing.
    pub fn cached(&self, key: &ObjectKey) -> Option<Arc<Snapshot>> {
        match self.entries.get(key).as_deref() {
            Some(Slot::Ready(entry)) => Some(Arc::clone(&entry.snapshot)),
            Some(Slot::Pending(_)) | None => None,
        }
    }

    // -----------------------------------------------------------------------
    // Invalidation
    // -----------------------------------------------------------------------

    /// Drop the entry for `key`. A capture in progress for `key` still
    /// answers its callers but is not stored.
    pub fn invalidate(&self, key: &ObjectKey) -> bool {
        let mut epochs = self.epochs.lock();
        epochs.bump(key.kind);
        self.entries.remove(key).is_some()
    }

    /// Drop every entry of `kind`.
    pub fn invalidate_kind(&self, kind: ObjectKind) {
        let mut epochs = self.epochs.lock();
        epochs.bump(kind);
        self.entries.retain(|key, _slot| key.kind != kind);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let mut epochs = self.epochs.lock();
        epochs.bump_all();
        self.entries.clear();
    }

    /// Number of cached snapshots.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    /// Whether no snapshot is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Objects captured through this cache so far.
    pub fn capture_count(&self) -> u64 {
        self.captures.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_none_or(|ttl| entry.last_refreshed.elapsed() < ttl)
    }

    fn lookup(&self, key: &ObjectKey, detail: DetailLevel) -> Lookup {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = match occupied.get() {
                    Slot::Ready(entry)
                        if entry.snapshot.detail.satisfies(detail) && self.is_fresh(entry) =>
                    {
                        Some(Lookup::Hit(Arc::clone(&entry.snapshot)))
                    }
                    Slot::Pending(flight) => Some(Lookup::Wait(Arc::clone(flight))),
                    Slot::Ready(_) => None,
                };
                existing.unwrap_or_else(|| {
                    let flight = InFlight::new();
                    occupied.insert(Slot::Pending(Arc::clone(&flight)));
                    Lookup::Lead(flight)
                })
            }
            Entry::Vacant(vacant) => {
                let flight = InFlight::new();
                vacant.insert(Slot::Pending(Arc::clone(&flight)));
                Lookup::Lead(flight)
            }
        }
    }

    fn lead(
        &self,
        key: &ObjectKey,
        detail: DetailLevel,
        flight: &Arc<InFlight>,
    ) -> Result<Arc<Snapshot>, SimError> {
        let publish = Publish {
            cache: self,
            key,
            flight,
            done: false,
        };
        let result = self.capture_uncached(key, detail);
        publish.complete(result)
    }

    fn capture_uncached(&self, key: &ObjectKey, detail: DetailLevel) -> CaptureResult {
        let identities = Arc::clone(&self.identities);
        let target = key.clone();
        let result = self
            .bridge
            .call(move |world| identities.capture(world, &target, detail))
            .map(Arc::new);
        if result.is_ok() {
            self.captures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Store or discard the leader's result. Only a slot still holding this
    /// leader's capture is touched, so an invalidation during the capture
    /// wins.
    fn settle(&self, key: &ObjectKey, flight: &Arc<InFlight>, result: &CaptureResult) {
        let ours = |slot: &Slot| matches!(slot, Slot::Pending(current) if Arc::ptr_eq(current, flight));
        match result {
            Ok(snapshot) => {
                let Some(mut slot) = self.entries.get_mut(key) else {
                    return;
                };
                if ours(&*slot) {
                    *slot = Slot::Ready(CacheEntry::new(Arc::clone(snapshot)));
                }
            }
            Err(err) => {
                self.entries.remove_if(key, |_key, slot| ours(slot));
                debug!(%key, error = %err, "Capture failed, nothing cached");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Object-safe view for the HTTP adapter
// ---------------------------------------------------------------------------

/// The three request shapes the HTTP adapter needs, with the world type
/// erased.
pub trait SnapshotService: Send + Sync {
    /// Parse a request-path pair into a key.
    fn parse_key(&self, kind: &str, id: &str) -> Result<ObjectKey, SimError>;

    /// Look a kind up by name.
    fn kind_named(&self, name: &str) -> Option<ObjectKind>;

    /// See [`SnapshotCache::get`].
    fn get(&self, key: &ObjectKey, detail: DetailLevel) -> Result<Arc<Snapshot>, SimError>;

    /// See [`SnapshotCache::list`].
    fn list(&self, kind: ObjectKind, detail: DetailLevel) -> Result<Vec<Arc<Snapshot>>, SimError>;

    /// See [`SnapshotCache::invoke`].
    fn invoke(
        &self,
        key: &ObjectKey,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, SimError>;
}

impl<W: 'static> SnapshotService for SnapshotCache<W> {
    fn parse_key(&self, kind: &str, id: &str) -> Result<ObjectKey, SimError> {
        self.identities.parse_key(kind, id)
    }

    fn kind_named(&self, name: &str) -> Option<ObjectKind> {
        self.identities.kind_named(name)
    }

    fn get(&self, key: &ObjectKey, detail: DetailLevel) -> Result<Arc<Snapshot>, SimError> {
        Self::get(self, key, detail)
    }

    fn list(&self, kind: ObjectKind, detail: DetailLevel) -> Result<Vec<Arc<Snapshot>>, SimError> {
        Self::list(self, kind, detail)
    }

    fn invoke(
        &self,
        key: &ObjectKey,
        method: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, SimError> {
        Self::invoke(self, key, method, args)
    }
}
