//! Idle session state machine
//!
//! ```text
//!            timeout expired
//!  Active ─────────────────────► Idle ──┐ countdown tick
//!    ▲  │                          │  ◄─┘ (every second until 0)
//!    │  └── reset (refresh) ──┐    │
//!    └────────────────────────┴────┘ reset / accepted activity
//! ```
//!
//! The timer owns every handle it schedules and is mutated only through
//! `&mut self`, so all callbacks are serialized by whoever owns it. A fired
//! handle that no longer matches the pending one is ignored, which keeps a
//! callback that was dequeued just before a reset from touching the state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{
    config::{validate_signed, ConfigError, TimerConfig},
    facility::{ManualTimers, TimerFacility, TimerHandle, TimerKind, TokioTimers},
    observer::SessionObserver,
};

const TICK: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Active,
    Idle,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    started_at: Instant,
    total_seconds: u64,
    tick: Option<TimerHandle>,
}

/// Idle timer over a host supplied facility and observer
#[derive(Debug)]
pub struct IdleTimer<F, O> {
    config: TimerConfig,
    facility: F,
    observer: O,
    phase: Phase,
    last_activity_at: Instant,
    remaining_ms: u64,
    pending_idle: Option<TimerHandle>,
    countdown: Option<Countdown>,
}

impl<F, O> IdleTimer<F, O>
where
    F: TimerFacility,
    O: SessionObserver,
{
    /// Validate `config` and start in the Active phase. The idle transition
    /// is scheduled right away when the timer is enabled.
    pub fn new(config: TimerConfig, facility: F, observer: O) -> Result<Self, ConfigError> {
        config.validate()?;

        let now = facility.now();
        let mut timer = Self {
            config,
            facility,
            observer,
            phase: Phase::Active,
            last_activity_at: now,
            remaining_ms: config.timeout_ms,
            pending_idle: None,
            countdown: None,
        };
        if config.enabled {
            timer.schedule_idle();
        }
        Ok(timer)
    }

    /// Record activity and restart the inactivity window, leaving Idle if
    /// needed. Does nothing while disabled.
    pub fn reset(&mut self) {
        if !self.config.enabled {
            return;
        }

        // Cancel before mutating so no stale tick can land after the reset.
        self.cancel_countdown();
        self.cancel_idle();

        self.last_activity_at = self.facility.now();
        if self.phase == Phase::Idle {
            self.phase = Phase::Active;
            debug!("Idle timer back to active after reset");
            self.observer.on_active();
        }
        self.remaining_ms = self.config.timeout_ms;
        self.schedule_idle();
    }

    /// Activity reported by the host's event source. Returns false when the
    /// notification was discarded.
    pub fn notify_activity(&mut self) -> bool {
        if !self.config.enabled {
            return false;
        }
        if self.config.stop_on_idle && self.phase == Phase::Idle {
            trace!("Discarding activity while idle");
            return false;
        }
        self.reset();
        true
    }

    /// Deliver a fired callback. Handles that are no longer pending are
    /// ignored.
    pub fn fire(&mut self, handle: TimerHandle) {
        if self.pending_idle == Some(handle) {
            self.pending_idle = None;
            self.enter_idle();
        } else if self.countdown.and_then(|c| c.tick) == Some(handle) {
            self.countdown_tick();
        } else {
            trace!("Ignoring stale timer callback {}", handle);
        }
    }

    /// Enable or disable the timer. Disabling cancels everything scheduled
    /// and freezes phase and countdown where they are.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if enabled {
            if self.phase == Phase::Active && self.pending_idle.is_none() {
                self.schedule_idle();
            }
        } else {
            self.cancel_countdown();
            self.cancel_idle();
        }
    }

    pub fn set_stop_on_idle(&mut self, stop_on_idle: bool) {
        self.config.stop_on_idle = stop_on_idle;
    }

    /// Replace the durations. They apply from the next scheduled cycle; an
    /// in-flight idle callback or countdown keeps its original length.
    pub fn set_durations(&mut self, timeout_ms: i64, warning_ms: i64) -> Result<(), ConfigError> {
        let (timeout_ms, warning_ms) = validate_signed(timeout_ms, warning_ms)?;
        self.config.timeout_ms = timeout_ms;
        self.config.warning_ms = warning_ms;
        Ok(())
    }

    /// Cancel everything scheduled and give the facility back
    pub fn teardown(mut self) -> F {
        self.cancel_countdown();
        self.cancel_idle();
        self.facility
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Countdown value while idle, the full timeout while active
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn last_activity_time(&self) -> Instant {
        self.last_activity_at
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn has_pending_idle(&self) -> bool {
        self.pending_idle.is_some()
    }

    pub fn has_pending_countdown(&self) -> bool {
        self.countdown.is_some_and(|c| c.tick.is_some())
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    pub fn facility_mut(&mut self) -> &mut F {
        &mut self.facility
    }

    fn schedule_idle(&mut self) {
        debug_assert!(self.pending_idle.is_none());
        let delay = Duration::from_millis(self.config.timeout_ms);
        self.pending_idle = Some(self.facility.schedule(delay, TimerKind::IdleTransition));
    }

    fn cancel_idle(&mut self) {
        if let Some(handle) = self.pending_idle.take() {
            self.facility.cancel(handle);
        }
    }

    fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take().and_then(|c| c.tick) {
            self.facility.cancel(handle);
        }
    }

    fn enter_idle(&mut self) {
        self.phase = Phase::Idle;
        debug!("Idle timer expired after {}ms", self.config.timeout_ms);
        self.observer.on_idle();

        // One clock read anchors both the countdown and its first tick.
        let started_at = self.facility.now();
        let total_seconds = self.config.countdown_seconds();
        self.remaining_ms = total_seconds * 1000;
        let tick = if total_seconds > 0 {
            Some(self.facility.schedule_at(started_at + TICK, TimerKind::CountdownTick))
        } else {
            None
        };
        self.countdown = Some(Countdown {
            started_at,
            total_seconds,
            tick,
        });
    }

    fn countdown_tick(&mut self) {
        let Some(mut countdown) = self.countdown else {
            return;
        };

        let elapsed = self.facility.now().saturating_duration_since(countdown.started_at);
        let elapsed_seconds = elapsed.as_secs();
        let remaining_seconds = countdown.total_seconds.saturating_sub(elapsed_seconds);
        self.remaining_ms = remaining_seconds * 1000;
        trace!("Idle countdown at {}s", remaining_seconds);

        countdown.tick = if remaining_seconds > 0 {
            // Align to the next whole second since idle entry to avoid drift.
            let next = countdown.started_at + TICK * (elapsed_seconds as u32 + 1);
            Some(self.facility.schedule_at(next, TimerKind::CountdownTick))
        } else {
            debug!("Idle countdown exhausted");
            None
        };
        self.countdown = Some(countdown);
    }
}

impl<O: SessionObserver> IdleTimer<TokioTimers, O> {
    /// Deadline the owning task should sleep until
    pub fn next_deadline(&self) -> Option<Instant> {
        self.facility.next_deadline()
    }

    /// Fire every callback due on the tokio clock. Returns how many fired.
    pub fn fire_due(&mut self) -> usize {
        let now = Instant::now();
        let mut fired = 0;
        while let Some((handle, _)) = self.facility.pop_due(now) {
            self.fire(handle);
            fired += 1;
        }
        fired
    }
}

impl<O: SessionObserver> IdleTimer<ManualTimers, O> {
    /// Move the manual clock forward by `by`, firing due callbacks in order
    pub fn advance(&mut self, by: Duration) {
        let target = self.facility.now() + by;
        while let Some(deadline) = self.facility.next_deadline().filter(|d| *d <= target) {
            self.facility.set_now(deadline);
            while let Some((handle, _)) = self.facility.pop_due() {
                self.fire(handle);
            }
        }
        self.facility.set_now(target);
    }
}
