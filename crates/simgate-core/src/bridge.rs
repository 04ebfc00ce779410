//! Main-thread bridge: runs work from any thread on the simulation thread.
//!
//! Callers submit a closure over `&mut W`. From a foreign thread the call is
//! queued on a single FIFO queue and the caller blocks until the simulation
//! thread has run it or the deadline passes. From the simulation thread
//! itself the call runs inline, so event handlers can use the same path
//! without deadlocking on their own queue.
//!
//! # Call lifecycle
//!
//! ```text
//! Submitted -> Running -> Completed
//!                      -> Failed
//! Submitted -> TimedOut   (skipped when the queue reaches it)
//! ```
//!
//! A call is run at most once and never retried. A call that is already
//! running when its caller gives up still runs to completion; its result is
//! dropped.
//!
//! # World parking
//!
//! Between jobs the simulation thread keeps the world in a thread-local
//! slot. An inline call takes the world out of the slot for its duration,
//! so a bridge call made from inside another bridge call finds the slot
//! empty and is rejected with [`SimError::Internal`]. Inline nesting is
//! therefore at most one level deep.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::SimError;
use crate::report::Reporter;

// ---------------------------------------------------------------------------
// World slot
// ---------------------------------------------------------------------------

thread_local! {
    static WORLD_SLOT: RefCell<Option<Box<dyn Any>>> = const { RefCell::new(None) };
}

/// Put the world into the current thread's slot.
pub(crate) fn park_world<W: 'static>(world: W) {
    WORLD_SLOT.with(|slot| *slot.borrow_mut() = Some(Box::new(world)));
}

/// Take the world back out of the current thread's slot.
pub(crate) fn unpark_world<W: 'static>() -> Option<W> {
    let boxed = WORLD_SLOT.with(|slot| slot.borrow_mut().take())?;
    match boxed.downcast::<W>() {
        Ok(world) => Some(*world),
        Err(other) => {
            WORLD_SLOT.with(|slot| *slot.borrow_mut() = Some(other));
            None
        }
    }
}

fn world_is_parked<W: 'static>() -> bool {
    WORLD_SLOT.with(|slot| slot.borrow().as_deref().is_some_and(|world| world.is::<W>()))
}

/// Puts the world back into the slot when dropped, including on unwind.
struct Restore(Option<Box<dyn Any>>);

impl Drop for Restore {
    fn drop(&mut self) {
        if let Some(world) = self.0.take() {
            // Only fails during thread teardown, when nothing can use it.
            let _ = WORLD_SLOT.try_with(|slot| *slot.borrow_mut() = Some(world));
        }
    }
}

/// Lend the parked world to `f`. `None` if no world of type `W` is parked,
/// which is the case while another call already holds it.
pub(crate) fn with_parked<W: 'static, R>(f: impl FnOnce(&mut W) -> R) -> Option<R> {
    if !world_is_parked::<W>() {
        return None;
    }
    let mut guard = Restore(WORLD_SLOT.with(|slot| slot.borrow_mut().take()));
    let world = guard.0.as_deref_mut()?.downcast_mut::<W>()?;
    Some(f(world))
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

const SUBMITTED: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const FAILED: u8 = 3;
const TIMED_OUT: u8 = 4;

/// A queued unit of work. `run` executes the caller's closure, delivers the
/// result to the caller and reports whether it succeeded.
struct Job<W> {
    id: u64,
    state: Arc<AtomicU8>,
    run: Box<dyn FnOnce(&mut W) -> bool + Send>,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    skipped: AtomicU64,
    inline: AtomicU64,
}

/// Point-in-time bridge counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Calls queued from foreign threads.
    pub submitted: u64,
    /// Queued calls that returned `Ok`.
    pub completed: u64,
    /// Queued calls that returned an error or panicked.
    pub failed: u64,
    /// Calls whose caller gave up waiting.
    pub timed_out: u64,
    /// Queued calls dropped without running (abandoned or rejected).
    pub skipped: u64,
    /// Calls run inline on the simulation thread.
    pub inline: u64,
    /// Calls currently waiting in the queue.
    pub pending: u64,
}

/// Gateway that marshals closures onto the simulation thread.
///
/// Shared behind an [`Arc`] by every request handler, the cache and the
/// webhook dispatcher. `W` is the world type owned by the simulation thread;
/// it never has to be `Send` because it never leaves that thread.
pub struct MainThreadBridge<W: 'static> {
    sender: Sender<Job<W>>,
    receiver: Receiver<Job<W>>,
    sim_thread: OnceLock<ThreadId>,
    closed: AtomicBool,
    default_deadline: Duration,
    next_id: AtomicU64,
    counters: Counters,
    reporter: Reporter,
}

impl<W: 'static> core::fmt::Debug for MainThreadBridge<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MainThreadBridge")
            .field("default_deadline", &self.default_deadline)
            .field("pending", &self.receiver.len())
            .finish_non_exhaustive()
    }
}

impl<W: 'static> MainThreadBridge<W> {
    /// Create a bridge whose calls wait at most `default_deadline`.
    pub fn new(default_deadline: Duration, reporter: Reporter) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            sim_thread: OnceLock::new(),
            closed: AtomicBool::new(false),
            default_deadline,
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
            reporter,
        }
    }

    /// Create a bridge from the `bridge` configuration section.
    pub fn from_config(config: &BridgeConfig, reporter: Reporter) -> Self {
        Self::new(Duration::from_millis(config.call_timeout_ms), reporter)
    }

    /// The deadline applied by [`call`](Self::call).
    pub const fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// The error reporter this bridge reports internal failures to.
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    // -----------------------------------------------------------------------
    // Caller side
    // -----------------------------------------------------------------------

    /// Run `work` on the simulation thread with the default deadline.
    pub fn call<R, F>(&self, work: F) -> Result<R, SimError>
    where
        R: Send + 'static,
        F: FnOnce(&mut W) -> Result<R, SimError> + Send + 'static,
    {
        self.call_with_deadline(self.default_deadline, work)
    }

    /// Run `work` on the simulation thread, waiting at most `deadline`.
    ///
    /// # Errors
    ///
    /// - whatever `work` returns
    /// - [`SimError::Timeout`] when the deadline passes first
    /// - [`SimError::Internal`] when `work` panics, when the call is made
    ///   from inside another bridge call, or when the simulation has stopped
    pub fn call_with_deadline<R, F>(&self, deadline: Duration, work: F) -> Result<R, SimError>
    where
        R: Send + 'static,
        F: FnOnce(&mut W) -> Result<R, SimError> + Send + 'static,
    {
        if self.is_simulation_thread() {
            return self.call_inline(work);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(stopped());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(AtomicU8::new(SUBMITTED));
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let reporter = self.reporter.clone();
        let run = Box::new(move |world: &mut W| {
            let result = execute(world, work, &reporter);
            let ok = result.is_ok();
            // The caller may already have given up; its receiver is gone then.
            let _ = reply_tx.send(result);
            ok
        });

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let job = Job {
            id,
            state: Arc::clone(&state),
            run,
        };
        if self.sender.send(job).is_err() {
            return Err(stopped());
        }

        let started = Instant::now();
        match reply_rx.recv_timeout(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Disconnected) => Err(stopped()),
            Err(RecvTimeoutError::Timeout) => {
                let abandoned = state
                    .compare_exchange(SUBMITTED, TIMED_OUT, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if !abandoned {
                    // Finished between the timeout and the state check.
                    if let Ok(result) = reply_rx.try_recv() {
                        return result;
                    }
                }
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                let elapsed_ms = millis(started.elapsed());
                if abandoned {
                    warn!(call_id = id, elapsed_ms, "Bridge call abandoned in queue");
                } else {
                    warn!(
                        call_id = id,
                        elapsed_ms, "Bridge call still running at deadline, result discarded"
                    );
                }
                Err(SimError::Timeout { elapsed_ms })
            }
        }
    }

    fn call_inline<R, F>(&self, work: F) -> Result<R, SimError>
    where
        F: FnOnce(&mut W) -> Result<R, SimError>,
    {
        self.counters.inline.fetch_add(1, Ordering::Relaxed);
        let reporter = &self.reporter;
        with_parked::<W, _>(|world| execute(world, work, reporter)).unwrap_or_else(|| {
            let err = SimError::Internal(String::from(
                "reentrant bridge call: the world is already held by a running call",
            ));
            reporter.report(&err, "inline bridge call");
            Err(err)
        })
    }

    // -----------------------------------------------------------------------
    // Simulation side
    // -----------------------------------------------------------------------

    /// Designate the current thread as the simulation thread.
    ///
    /// # Errors
    ///
    /// [`SimError::Internal`] if another thread is already bound.
    pub fn bind_current_thread(&self) -> Result<(), SimError> {
        let current = thread::current().id();
        let bound = *self.sim_thread.get_or_init(|| current);
        if bound == current {
            Ok(())
        } else {
            Err(SimError::Internal(String::from(
                "bridge is already bound to another simulation thread",
            )))
        }
    }

    /// Whether the current thread is the simulation thread.
    pub fn is_simulation_thread(&self) -> bool {
        self.sim_thread.get() == Some(&thread::current().id())
    }

    /// Number of calls waiting in the queue.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run every queued call against `world`, in submission order.
    ///
    /// Returns the number of calls taken off the queue.
    pub fn drain(&self, world: &mut W) -> usize {
        let mut taken = 0_usize;
        while let Ok(job) = self.receiver.try_recv() {
            self.run_job(job, world);
            taken = taken.saturating_add(1);
        }
        taken
    }

    /// Like [`drain`](Self::drain) but stops once `budget` has elapsed.
    pub fn drain_for(&self, world: &mut W, budget: Duration) -> usize {
        let started = Instant::now();
        let mut taken = 0_usize;
        while started.elapsed() < budget {
            let Ok(job) = self.receiver.try_recv() else {
                break;
            };
            self.run_job(job, world);
            taken = taken.saturating_add(1);
        }
        taken
    }

    /// Wait until `deadline` for one queued call and run it against the
    /// parked world. Returns `true` if a call was taken off the queue.
    pub(crate) fn run_next_until(&self, deadline: Instant) -> bool {
        if !world_is_parked::<W>() {
            return false;
        }
        let Ok(job) = self.receiver.recv_deadline(deadline) else {
            return false;
        };
        let ran = with_parked::<W, _>(|world| self.run_job(job, world));
        ran.is_some()
    }

    /// Stop accepting calls and drop everything still queued. Waiting
    /// callers receive [`SimError::Internal`].
    pub fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let mut rejected = 0_usize;
        while let Ok(job) = self.receiver.try_recv() {
            debug!(call_id = job.id, "Rejecting queued bridge call at shutdown");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            rejected = rejected.saturating_add(1);
        }
        rejected
    }

    fn run_job(&self, job: Job<W>, world: &mut W) {
        if job
            .state
            .compare_exchange(SUBMITTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(call_id = job.id, "Skipping abandoned bridge call");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let ok = (job.run)(world);
        if ok {
            job.state.store(COMPLETED, Ordering::Release);
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            job.state.store(FAILED, Ordering::Release);
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counters.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            inline: self.counters.inline.load(Ordering::Relaxed),
            pending: u64::try_from(self.receiver.len()).unwrap_or(u64::MAX),
        }
    }
}

/// Run `work`, turning a panic into [`SimError::Internal`]. Internal errors
/// are reported; every other kind passes through untouched.
fn execute<W, R, F>(world: &mut W, work: F, reporter: &Reporter) -> Result<R, SimError>
where
    F: FnOnce(&mut W) -> Result<R, SimError>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| work(world))).unwrap_or_else(|payload| {
        Err(SimError::Internal(format!(
            "bridge call panicked: {}",
            panic_message(payload.as_ref())
        )))
    });
    if let Err(err @ SimError::Internal(_)) = &result {
        reporter.report(err, "bridge call");
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn stopped() -> SimError {
    SimError::Internal(String::from("simulation stopped before running the call"))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
