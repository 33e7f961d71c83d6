//! Timed admission gate
//!
//! A gate spaces out admissions for one (host, user-agent) pair. The first
//! caller on an idle gate passes straight through and locks it; later callers
//! queue in arrival order and are handed the gate one per interval by a
//! release timer that the gate itself owns.
//!
//! Entering is split in two steps. [`Gate::join`] is synchronous: it either
//! admits the caller on the spot or reserves a place in the queue, so the
//! reservation is visible (and the owning cache entry pinned) before any
//! `.await`. [`GateTicket::wait`] then suspends the task without holding any
//! lock.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Upper bound on the spacing a gate will enforce (one day)
pub const MAX_SPACING: Duration = Duration::from_secs(86_400);

/// How a caller got through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The gate was idle, no waiting happened
    Immediate,
    /// Woken by the release timer
    Released,
    /// Woken by the waiter's own safety deadline
    TimedOut,
    /// The caller's cancellation signal fired while queued
    ///
    /// An interrupted wait counts as an admission: the caller proceeds and the
    /// gate is re-armed on its behalf, so later callers stay spaced.
    Interrupted,
}

impl Admission {
    /// Returns true if the caller had to queue
    pub fn waited(&self) -> bool {
        !matches!(self, Self::Immediate)
    }
}

#[derive(Debug)]
struct GateState {
    locked: bool,
    /// Bumped on every arm so an outstanding timer can tell it was superseded
    generation: u64,
    /// When the currently armed timer is due
    release_at: Instant,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Per (host, user-agent) serialization primitive
#[derive(Debug)]
pub struct Gate {
    spacing: Duration,
    state: Mutex<GateState>,
}

/// A reservation obtained from [`Gate::join`]
#[derive(Debug)]
pub enum GateTicket {
    /// The gate was idle and is now locked for this caller
    Admitted,
    /// The caller is queued and must [`wait`](GateTicket::wait)
    Queued {
        gate: Arc<Gate>,
        waiter: oneshot::Receiver<()>,
        deadline: Instant,
    },
}

impl Gate {
    /// Creates an unlocked gate enforcing `spacing` between admissions
    ///
    /// Spacings above [`MAX_SPACING`] are clamped.
    pub fn new(spacing: Duration) -> Arc<Self> {
        Arc::new(Self {
            spacing: spacing.min(MAX_SPACING),
            state: Mutex::new(GateState {
                locked: false,
                generation: 0,
                release_at: Instant::now(),
                waiters: VecDeque::new(),
            }),
        })
    }

    /// Minimum time between two admissions
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Returns true while an admission's spacing interval is running
    pub fn is_locked(&self) -> bool {
        self.lock().locked
    }

    /// Number of callers currently queued (including abandoned slots not yet
    /// skipped by the timer)
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    /// A gate that is locked or has waiters must keep its owner alive
    pub fn is_busy(&self) -> bool {
        let state = self.lock();
        state.locked || !state.waiters.is_empty()
    }

    /// Admits the caller immediately or reserves a queue slot
    ///
    /// Must be called from within a tokio runtime: admitting arms the release
    /// timer.
    pub fn join(self: &Arc<Self>) -> GateTicket {
        let mut state = self.lock();
        if !state.locked {
            self.arm(&mut state);
            return GateTicket::Admitted;
        }

        let (tx, rx) = oneshot::channel();
        let ahead = u32::try_from(state.waiters.len()).unwrap_or(u32::MAX);
        // One full spacing of slack past the slot the caller should get
        let deadline = state.release_at + self.spacing.saturating_mul(ahead.saturating_add(1));
        state.waiters.push_back(tx);

        GateTicket::Queued {
            gate: Arc::clone(self),
            waiter: rx,
            deadline,
        }
    }

    /// Joins and waits until admitted
    pub async fn admit(self: &Arc<Self>) -> Admission {
        self.join().wait(std::future::pending()).await
    }

    /// Joins and waits until admitted or until `cancel` completes
    pub async fn admit_until<C>(self: &Arc<Self>, cancel: C) -> Admission
    where
        C: Future<Output = ()>,
    {
        self.join().wait(cancel).await
    }

    /// Locks the gate and schedules its release after `spacing`
    fn arm(self: &Arc<Self>, state: &mut GateState) {
        state.locked = true;
        state.generation = state.generation.wrapping_add(1);
        state.release_at = Instant::now() + self.spacing;

        let generation = state.generation;
        let release_at = state.release_at;
        let gate = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(release_at).await;
            release(&gate, generation);
        });
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timer callback: hand the gate to the oldest live waiter or unlock it
///
/// A handoff starts the next interval right here, so the gate is released
/// again even if the woken task never gets to run.
fn release(gate: &Weak<Gate>, generation: u64) {
    let Some(gate) = gate.upgrade() else {
        return;
    };
    let mut state = gate.lock();
    if state.generation != generation {
        return;
    }

    state.locked = false;
    while let Some(waiter) = state.waiters.pop_front() {
        // A dropped receiver means the waiter timed out or gave up
        if waiter.send(()).is_ok() {
            gate.arm(&mut state);
            tracing::trace!(remaining = state.waiters.len(), "gate handed to next waiter");
            return;
        }
    }
    tracing::trace!("gate unlocked");
}

impl GateTicket {
    /// Suspends until the gate admits this caller
    ///
    /// Returns at the latest at the safety deadline computed when the slot was
    /// reserved, so a lost wake-up can never block a caller indefinitely.
    pub async fn wait<C>(self, cancel: C) -> Admission
    where
        C: Future<Output = ()>,
    {
        let (gate, waiter, deadline) = match self {
            Self::Admitted => return Admission::Immediate,
            Self::Queued {
                gate,
                waiter,
                deadline,
            } => (gate, waiter, deadline),
        };

        let admission = tokio::select! {
            // An error means the sender went away with the gate; nothing left to wait for
            _ = waiter => Admission::Released,
            _ = tokio::time::sleep_until(deadline) => Admission::TimedOut,
            _ = cancel => Admission::Interrupted,
        };

        // A released caller's interval was started by the handoff; everyone
        // else takes the gate on their own and starts one here
        if admission != Admission::Released {
            let mut state = gate.lock();
            gate.arm(&mut state);
        }
        admission
    }
}
