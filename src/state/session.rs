//! Handle to a running session timer and its command protocol

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use super::SessionSnapshot;
use crate::{error::SessionError, timer::ConfigError};

/// Source of an activity notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Pointer,
    Key,
    Scroll,
    Touch,
    Click,
    #[default]
    Other,
}

/// Optional timer settings sent by clients. Missing values fall back to the
/// daemon defaults on creation and to the current values on update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionOptions {
    pub timeout_ms: Option<i64>,
    pub warning_ms: Option<i64>,
    pub enabled: Option<bool>,
    pub stop_on_idle: Option<bool>,
}

/// Mutation applied by the session task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// Filtered activity from the host's event source
    Activity(ActivityKind),
    /// Explicit acknowledgement that bypasses the idle filter
    Reset,
    /// Apply every present field in one step. Durations are checked first,
    /// so a rejected value leaves the flags untouched.
    Update(SessionOptions),
}

/// Result of an applied operation
#[derive(Debug, Clone)]
pub struct Applied {
    /// False when the operation was discarded (filtered or disabled)
    pub accepted: bool,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug)]
pub enum SessionCommand {
    Apply {
        op: SessionOp,
        reply: oneshot::Sender<Result<Applied, ConfigError>>,
    },
    Shutdown,
}

/// Cloneable handle used to talk to a session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    commands: mpsc::Sender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn new(
        id: String,
        commands: mpsc::Sender<SessionCommand>,
        snapshot: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            id,
            commands,
            snapshot,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that changes whenever the session publishes a new snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Send an operation and wait until the task applied it
    pub async fn apply(&self, op: SessionOp) -> Result<Applied, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Apply { op, reply })
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))?;

        let applied = response
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))??;
        Ok(applied)
    }

    pub async fn activity(&self, kind: ActivityKind) -> Result<Applied, SessionError> {
        self.apply(SessionOp::Activity(kind)).await
    }

    pub async fn reset(&self) -> Result<Applied, SessionError> {
        self.apply(SessionOp::Reset).await
    }

    /// Ask the task to tear the timer down
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))
    }
}
