//! Idle session timer
//!
//! A single-owner state machine that moves a session from Active to Idle
//! after a period of inactivity, runs an advisory countdown while idle and
//! notifies its host on every transition.

pub mod config;
pub mod facility;
pub mod idle_timer;
pub mod observer;

// Re-export main types
pub use config::{ConfigError, TimerConfig, DEFAULT_WARNING_MS, MAX_DURATION_MS};
pub use facility::{ManualTimers, TimerFacility, TimerHandle, TimerKind, TokioTimers};
pub use idle_timer::{IdleTimer, Phase};
pub use observer::{FnObserver, SessionObserver};
