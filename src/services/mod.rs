//! External side effects module
//!
//! The daemon never logs anyone out itself; it runs operator supplied hook
//! commands in response to session transitions.

pub mod hooks;

// Re-export main functions
pub use hooks::{run_hook, HookConfig};
