//! Operator hook commands run on session transitions

use tokio::process::Command;
use tracing::{debug, info};

use crate::state::{SessionEvent, SessionEventKind};

/// Shell commands to run when a session changes phase
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    pub on_idle: Option<String>,
    pub on_active: Option<String>,
}

impl HookConfig {
    /// Command configured for an event, if any
    pub fn command_for(&self, kind: SessionEventKind) -> Option<&str> {
        match kind {
            SessionEventKind::Idle => self.on_idle.as_deref(),
            SessionEventKind::Active => self.on_active.as_deref(),
            SessionEventKind::Closed => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_idle.is_none() && self.on_active.is_none()
    }
}

/// Run a hook command through `sh -c` with the event in its environment
pub async fn run_hook(command: &str, event: &SessionEvent) -> Result<(), String> {
    debug!("Running {} hook for session {}: {}", event.kind.as_str(), event.session, command);

    let output = Command::new("sh")
        .args(["-c", command])
        .env("IDLE_SENTRY_SESSION", &event.session)
        .env("IDLE_SENTRY_EVENT", event.kind.as_str())
        .output()
        .await
        .map_err(|e| format!("Failed to execute hook: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "Hook exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        ));
    }

    info!("{} hook for session {} completed", event.kind.as_str(), event.session);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_command_by_event() {
        let hooks = HookConfig {
            on_idle: Some("logout".to_string()),
            on_active: None,
        };
        assert_eq!(hooks.command_for(SessionEventKind::Idle), Some("logout"));
        assert_eq!(hooks.command_for(SessionEventKind::Active), None);
        assert_eq!(hooks.command_for(SessionEventKind::Closed), None);
        assert!(!hooks.is_empty());
        assert!(HookConfig::default().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hook_sees_event_environment() {
        let event = SessionEvent::new("desk", SessionEventKind::Idle);
        let command = r#"[ "$IDLE_SENTRY_SESSION" = desk ] && [ "$IDLE_SENTRY_EVENT" = idle ]"#;
        assert!(run_hook(command, &event).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_hook_is_reported() {
        let event = SessionEvent::new("desk", SessionEventKind::Active);
        let err = run_hook("echo nope >&2; exit 3", &event).await.unwrap_err();
        assert!(err.contains("3"));
        assert!(err.contains("nope"));
    }
}
