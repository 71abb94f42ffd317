//! Cancellable one-shot timers behind the [`Scheduler`] trait.
//!
//! A timer never runs code. When it fires it delivers a value
//! ([`Fired<E>`]) to whoever owns the scheduler, and that owner decides what
//! to do with it. That keeps every state change on the owner's event loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A timer that went off, carrying the value it was scheduled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<E> {
    pub id: TimerId,
    pub event: E,
}

/// Schedules one-shot timers and tells the time.
///
/// Implementations must tolerate `cancel` racing with delivery: a cancelled
/// timer may still have its `Fired` value in flight, so owners compare the
/// id against the timers they still consider pending.
pub trait Scheduler<E>: Send + 'static {
    /// Arms a timer that delivers `event` after `delay`.
    fn schedule(&mut self, delay: Duration, event: E) -> TimerId;

    /// Disarms a timer. Returns `false` if it was unknown or already fired.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

// ---------------------------------------------------------------------------
// TokioScheduler
// ---------------------------------------------------------------------------

/// Production scheduler: one `tokio::time::sleep` task per timer, delivering
/// into an unbounded channel.
pub struct TokioScheduler<E> {
    next_id: u64,
    timers: HashMap<TimerId, JoinHandle<()>>,
    sink: mpsc::UnboundedSender<Fired<E>>,
}

impl<E: Send + 'static> TokioScheduler<E> {
    pub fn new(sink: mpsc::UnboundedSender<Fired<E>>) -> Self {
        Self {
            next_id: 1,
            timers: HashMap::new(),
            sink,
        }
    }

    /// Timers armed and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}

impl<E: Send + 'static> Scheduler<E> for TokioScheduler<E> {
    fn schedule(&mut self, delay: Duration, event: E) -> TimerId {
        self.timers.retain(|_, handle| !handle.is_finished());

        let id = TimerId(self.next_id);
        self.next_id += 1;

        let sink = self.sink.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The owner may be gone; nobody to tell then.
            let _ = sink.send(Fired { id, event });
        });
        self.timers.insert(id, handle);
        trace!(%id, delay_ms = delay.as_millis() as u64, "timer armed");
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                trace!(%id, was_pending, "timer cancelled");
                was_pending
            }
            None => false,
        }
    }

    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl<E> Drop for TokioScheduler<E> {
    fn drop(&mut self) {
        for handle in self.timers.values() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

/// A timer recorded by [`ManualScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: TimerId,
    /// The delay it was scheduled with.
    pub delay: Duration,
    /// Virtual time at which it fires.
    pub deadline: Duration,
}

struct ManualState<E> {
    next_id: u64,
    epoch_millis: u64,
    elapsed: Duration,
    pending: Vec<(PendingTimer, E)>,
}

/// Deterministic scheduler driven by hand.
///
/// Nothing fires on its own: [`advance`](Self::advance) moves virtual time
/// forward and hands back whatever came due, in deadline order. Clones share
/// state, so a test keeps one clone while the code under test owns another.
pub struct ManualScheduler<E> {
    state: Arc<Mutex<ManualState<E>>>,
}

impl<E> Clone for ManualScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<E> Default for ManualScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ManualScheduler<E> {
    /// Virtual clock starting at the Unix epoch.
    pub fn new() -> Self {
        Self::with_epoch_millis(0)
    }

    /// Virtual clock starting at `epoch_millis`.
    pub fn with_epoch_millis(epoch_millis: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                next_id: 1,
                epoch_millis,
                elapsed: Duration::ZERO,
                pending: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState<E>> {
        // Poisoning only happens if a test panicked mid-call; the data is
        // still consistent enough to report on.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Armed timers, in the order they were scheduled.
    pub fn pending(&self) -> Vec<PendingTimer> {
        self.lock().pending.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Moves virtual time forward by `by`; returns every timer that came
    /// due, earliest deadline first.
    pub fn advance(&self, by: Duration) -> Vec<Fired<E>> {
        let mut state = self.lock();
        state.elapsed += by;
        let now = state.elapsed;

        let (mut due, rest): (Vec<_>, Vec<_>) = state
            .pending
            .drain(..)
            .partition(|(t, _)| t.deadline <= now);
        state.pending = rest;

        due.sort_by_key(|(t, _)| (t.deadline, t.id));
        due.into_iter()
            .map(|(t, event)| Fired { id: t.id, event })
            .collect()
    }

    /// Jumps to the earliest deadline and fires that one timer.
    pub fn fire_next(&self) -> Option<Fired<E>> {
        let mut state = self.lock();
        let idx = state
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, (t, _))| (t.deadline, t.id))
            .map(|(i, _)| i)?;
        let (timer, event) = state.pending.remove(idx);
        if timer.deadline > state.elapsed {
            state.elapsed = timer.deadline;
        }
        Some(Fired {
            id: timer.id,
            event,
        })
    }
}

impl<E: Send + 'static> Scheduler<E> for ManualScheduler<E> {
    fn schedule(&mut self, delay: Duration, event: E) -> TimerId {
        let mut state = self.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        let deadline = state.elapsed + delay;
        state.pending.push((
            PendingTimer {
                id,
                delay,
                deadline,
            },
            event,
        ));
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|(t, _)| t.id != id);
        state.pending.len() != before
    }

    fn now_millis(&self) -> u64 {
        let state = self.lock();
        state.epoch_millis + state.elapsed.as_millis() as u64
    }
}
