//! Background tasks module
//!
//! This module contains the per-session timer tasks and the hook runner
//! that run alongside the HTTP server.

pub mod hook_runner;
pub mod session_timer;

// Re-export main functions
pub use hook_runner::hook_runner_task;
pub use session_timer::{session_timer_task, spawn_session, EventForwarder};
