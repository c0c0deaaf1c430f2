//! Hook runner background task

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use crate::{
    services::{run_hook, HookConfig},
    state::SessionEvent,
};

/// Background task that runs the configured hook for every session event
pub async fn hook_runner_task(mut events_rx: broadcast::Receiver<SessionEvent>, hooks: HookConfig) {
    info!("Starting hook runner task");

    loop {
        match events_rx.recv().await {
            Ok(event) => {
                let Some(command) = hooks.command_for(event.kind) else {
                    continue;
                };
                let command = command.to_string();

                // Hooks may be slow; never hold up the next event.
                tokio::spawn(async move {
                    if let Err(e) = run_hook(&command, &event).await {
                        error!("{} hook for session {} failed: {}",
                               event.kind.as_str(), event.session, e);
                    }
                });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Hook runner lagged, {} session events skipped", skipped);
            }
            Err(RecvError::Closed) => {
                info!("Event bus closed, stopping hook runner");
                break;
            }
        }
    }
}
