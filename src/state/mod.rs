//! State management module
//!
//! This module contains the session registry, the session handle protocol
//! and the snapshot/event types published to clients.

pub mod app_state;
pub mod session;
pub mod snapshot;

// Re-export main types
pub use app_state::AppState;
pub use session::{ActivityKind, Applied, SessionCommand, SessionHandle, SessionOp, SessionOptions};
pub use snapshot::{SessionEvent, SessionEventKind, SessionSnapshot};
