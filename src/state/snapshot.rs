//! Read-only views of a session published to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{IdleTimer, Phase, SessionObserver, TimerFacility};

/// Point-in-time state of one idle timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub phase: Phase,
    pub is_idle: bool,
    /// Countdown while idle, full timeout while active
    pub remaining_ms: u64,
    pub enabled: bool,
    pub stop_on_idle: bool,
    pub timeout_ms: u64,
    pub warning_ms: u64,
    pub last_activity_time: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Capture the current state of `timer`
    pub fn capture<F, O>(id: &str, timer: &IdleTimer<F, O>) -> Self
    where
        F: TimerFacility,
        O: SessionObserver,
    {
        let config = timer.config();
        let since_activity = timer
            .facility()
            .now()
            .saturating_duration_since(timer.last_activity_time());
        let since_activity =
            chrono::Duration::from_std(since_activity).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            id: id.to_string(),
            phase: timer.phase(),
            is_idle: timer.is_idle(),
            remaining_ms: timer.remaining_ms(),
            enabled: config.enabled,
            stop_on_idle: config.stop_on_idle,
            timeout_ms: config.timeout_ms,
            warning_ms: config.warning_ms,
            last_activity_time: Utc::now() - since_activity,
        }
    }

    /// Whole seconds left on the idle countdown, if one is showing
    pub fn countdown_seconds(&self) -> Option<u64> {
        if self.is_idle {
            Some(self.remaining_ms / 1000)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionEventKind {
    Idle,
    Active,
    Closed,
}

impl SessionEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// Transition notification broadcast to subscribers and hooks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session: String,
    pub kind: SessionEventKind,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(session: &str, kind: SessionEventKind) -> Self {
        Self {
            session: session.to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }
}
