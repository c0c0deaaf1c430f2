//! Timer facilities the idle timer schedules its callbacks on
//!
//! The idle timer never sleeps itself. It asks a [`TimerFacility`] to
//! schedule a callback and later receives the fired [`TimerHandle`] back
//! from its host. Handles are never reused, so a callback that was cancelled
//! after the host already dequeued it is recognised as stale.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Opaque handle to a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a scheduled callback is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    IdleTransition,
    CountdownTick,
}

/// Clock plus cancellable one-shot callbacks
pub trait TimerFacility {
    /// Current instant on this facility's clock
    fn now(&self) -> Instant;

    /// Schedule a callback at an absolute deadline on this clock
    fn schedule_at(&mut self, deadline: Instant, kind: TimerKind) -> TimerHandle;

    /// Schedule a callback `delay` from now
    fn schedule(&mut self, delay: Duration, kind: TimerKind) -> TimerHandle {
        let deadline = self.now() + delay;
        self.schedule_at(deadline, kind)
    }

    /// Cancel a callback. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    handle: TimerHandle,
    deadline: Instant,
    kind: TimerKind,
}

/// Pending callbacks ordered by deadline, ties broken by scheduling order
#[derive(Debug, Default)]
struct PendingTimers {
    next_id: u64,
    entries: Vec<Scheduled>,
}

impl PendingTimers {
    fn insert(&mut self, deadline: Instant, kind: TimerKind) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.entries.push(Scheduled { handle, deadline, kind });
        handle
    }

    fn remove(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        self.entries.len() != before
    }

    fn earliest(&self) -> Option<&Scheduled> {
        self.entries
            .iter()
            .min_by_key(|entry| (entry.deadline, entry.handle))
    }

    fn pop_due(&mut self, now: Instant) -> Option<Scheduled> {
        let due = *self.earliest().filter(|entry| entry.deadline <= now)?;
        self.remove(due.handle);
        Some(due)
    }
}

/// Facility backed by the tokio clock.
///
/// The owning task sleeps until [`next_deadline`](Self::next_deadline) and
/// then drains [`pop_due`](Self::pop_due) one handle at a time, so a fired
/// callback that cancels another due one is respected.
#[derive(Debug, Default)]
pub struct TokioTimers {
    pending: PendingTimers,
}

impl TokioTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline of the earliest pending callback
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.earliest().map(|entry| entry.deadline)
    }

    /// Remove and return the earliest callback due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, TimerKind)> {
        self.pending
            .pop_due(now)
            .map(|entry| (entry.handle, entry.kind))
    }

    /// Number of callbacks still scheduled
    pub fn pending(&self) -> usize {
        self.pending.entries.len()
    }
}

impl TimerFacility for TokioTimers {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule_at(&mut self, deadline: Instant, kind: TimerKind) -> TimerHandle {
        self.pending.insert(deadline, kind)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(handle);
    }
}

/// Facility with a hand-driven clock, for embedding in hosts that own their
/// own loop and for deterministic tests.
#[derive(Debug)]
pub struct ManualTimers {
    now: Instant,
    pending: PendingTimers,
}

impl ManualTimers {
    /// Start the clock at the current instant
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            now,
            pending: PendingTimers::default(),
        }
    }

    /// Deadline of the earliest pending callback
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.earliest().map(|entry| entry.deadline)
    }

    /// Move the clock forward. Time never goes backwards.
    pub fn set_now(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Remove and return the earliest callback due on the current clock
    pub fn pop_due(&mut self) -> Option<(TimerHandle, TimerKind)> {
        self.pending
            .pop_due(self.now)
            .map(|entry| (entry.handle, entry.kind))
    }

    pub fn pending(&self) -> usize {
        self.pending.entries.len()
    }
}

impl Default for ManualTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerFacility for ManualTimers {
    fn now(&self) -> Instant {
        self.now
    }

    fn schedule_at(&mut self, deadline: Instant, kind: TimerKind) -> TimerHandle {
        self.pending.insert(deadline, kind)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_reused() {
        let mut timers = ManualTimers::new();
        let first = timers.schedule(Duration::from_secs(1), TimerKind::IdleTransition);
        timers.cancel(first);
        let second = timers.schedule(Duration::from_secs(1), TimerKind::IdleTransition);
        assert_ne!(first, second);
    }

    #[test]
    fn pops_in_deadline_order() {
        let mut timers = ManualTimers::new();
        let start = timers.now();
        let late = timers.schedule(Duration::from_secs(2), TimerKind::IdleTransition);
        let early = timers.schedule(Duration::from_secs(1), TimerKind::CountdownTick);

        assert!(timers.pop_due().is_none());
        assert_eq!(timers.next_deadline(), Some(start + Duration::from_secs(1)));

        timers.set_now(start + Duration::from_secs(5));
        assert_eq!(timers.pop_due(), Some((early, TimerKind::CountdownTick)));
        assert_eq!(timers.pop_due(), Some((late, TimerKind::IdleTransition)));
        assert!(timers.pop_due().is_none());
    }

    #[test]
    fn cancelled_callbacks_never_pop() {
        let mut timers = ManualTimers::new();
        let start = timers.now();
        let handle = timers.schedule(Duration::from_millis(10), TimerKind::IdleTransition);
        timers.cancel(handle);
        // cancelling twice is harmless
        timers.cancel(handle);

        timers.set_now(start + Duration::from_secs(1));
        assert!(timers.pop_due().is_none());
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn clock_never_goes_backwards() {
        let mut timers = ManualTimers::new();
        let start = timers.now();
        timers.set_now(start + Duration::from_secs(3));
        timers.set_now(start);
        assert_eq!(timers.now(), start + Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timers_follow_the_runtime_clock() {
        let mut timers = TokioTimers::new();
        let handle = timers.schedule(Duration::from_secs(5), TimerKind::IdleTransition);
        assert!(timers.pop_due(Instant::now()).is_none());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            timers.pop_due(Instant::now()),
            Some((handle, TimerKind::IdleTransition))
        );
        assert_eq!(timers.pending(), 0);
    }
}
