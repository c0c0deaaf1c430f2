//! Idle Sentry - an HTTP daemon hosting idle session timers
//!
//! This is the main entry point for the idle-sentry application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use idle_sentry::{
    api::create_router,
    config::Config,
    state::AppState,
    tasks::hook_runner_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("idle_sentry={},tower_http=info", config.log_level()))
        .init();

    info!("Starting idle-sentry v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, timeout={}s, warning={}s, stop_on_idle={}",
          config.host, config.port, config.timeout, config.warning, config.stop_on_idle);

    let defaults = config.timer_defaults();
    defaults.validate()?;

    let state = Arc::new(AppState::new(config.port, config.host.clone(), defaults));

    let hooks = config.hooks();
    if !hooks.is_empty() {
        tokio::spawn(hook_runner_task(state.subscribe_events(), hooks));
    }

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /sessions/:id          - Start a session timer");
    info!("  GET    /sessions[/:id]        - Session phase and countdown");
    info!("  POST   /sessions/:id/activity - Report activity");
    info!("  POST   /sessions/:id/reset    - Acknowledge and reset");
    info!("  PATCH  /sessions/:id          - Change flags or durations");
    info!("  DELETE /sessions/:id          - Stop a session timer");
    info!("  GET    /events                - Transition stream (SSE)");
    info!("  GET    /status, /health");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown_all().await;
    info!("Server shutdown complete");
    Ok(())
}
