//! Idle Sentry - an HTTP daemon hosting idle session timers
//!
//! Every session runs an idle timer that moves it from active to idle after
//! a period of inactivity and then counts down a warning period. Clients
//! forward activity, acknowledge the warning and watch transitions; the
//! daemon can run hook commands when sessions go idle or come back.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod timer;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::SessionError;
pub use state::AppState;
pub use timer::{IdleTimer, Phase, TimerConfig};
pub use utils::signals::shutdown_signal;
