//! Per-session idle timer task
//!
//! Each session runs in its own task that exclusively owns the
//! [`IdleTimer`]. Timer expiries and client commands are handled one at a
//! time from the same `select!` loop, so no two callbacks ever touch the
//! timer concurrently.

use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    state::{
        Applied, SessionCommand, SessionEvent, SessionEventKind, SessionHandle, SessionOp,
        SessionSnapshot,
    },
    timer::{ConfigError, IdleTimer, SessionObserver, TimerConfig, TokioTimers},
};

const COMMAND_BUFFER: usize = 64;

/// Forwards timer transitions onto the event bus
pub struct EventForwarder {
    session: String,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl EventForwarder {
    pub fn new(session: &str, events_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            session: session.to_string(),
            events_tx,
        }
    }

    fn publish(&self, kind: SessionEventKind) {
        if let Err(e) = self.events_tx.send(SessionEvent::new(&self.session, kind)) {
            debug!("No listeners for {} event of session {}: {}", kind.as_str(), self.session, e);
        }
    }
}

impl SessionObserver for EventForwarder {
    fn on_idle(&mut self) {
        info!("Session {} went idle", self.session);
        self.publish(SessionEventKind::Idle);
    }

    fn on_active(&mut self) {
        info!("Session {} is active again", self.session);
        self.publish(SessionEventKind::Active);
    }
}

type SessionTimer = IdleTimer<TokioTimers, EventForwarder>;

/// Build the timer for a session and start its task.
///
/// The configuration is validated before anything is spawned, so invalid
/// settings are reported synchronously.
pub fn spawn_session(
    id: &str,
    config: TimerConfig,
    events_tx: broadcast::Sender<SessionEvent>,
) -> Result<(SessionHandle, JoinHandle<()>), ConfigError> {
    let observer = EventForwarder::new(id, events_tx.clone());
    let timer = IdleTimer::new(config, TokioTimers::new(), observer)?;

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::capture(id, &timer));

    let task = tokio::spawn(session_timer_task(
        id.to_string(),
        timer,
        commands_rx,
        snapshot_tx,
        events_tx,
    ));

    Ok((SessionHandle::new(id.to_string(), commands_tx, snapshot_rx), task))
}

/// Drive one session timer until it is shut down or every handle is dropped
pub async fn session_timer_task(
    id: String,
    mut timer: SessionTimer,
    mut commands: mpsc::Receiver<SessionCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
) {
    info!(
        "Starting idle timer for session {} (timeout={}ms, warning={}ms, enabled={})",
        id,
        timer.config().timeout_ms,
        timer.config().warning_ms,
        timer.is_enabled()
    );

    loop {
        let deadline = timer.next_deadline();

        tokio::select! {
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let fired = timer.fire_due();
                debug!("Session {} handled {} timer callback(s), remaining={}ms",
                       id, fired, timer.remaining_ms());
                snapshot_tx.send_replace(SessionSnapshot::capture(&id, &timer));
            }

            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Apply { op, reply }) => {
                        let result = apply_op(&id, &mut timer, op).map(|accepted| {
                            let snapshot = SessionSnapshot::capture(&id, &timer);
                            snapshot_tx.send_replace(snapshot.clone());
                            Applied { accepted, snapshot }
                        });
                        if reply.send(result).is_err() {
                            debug!("Caller for session {} went away before the reply", id);
                        }
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                }
            }
        }
    }

    let timers = timer.teardown();
    debug!("Session {} torn down with {} callback(s) cancelled", id, timers.pending());
    if events_tx.send(SessionEvent::new(&id, SessionEventKind::Closed)).is_err() {
        debug!("No listeners for closed event of session {}", id);
    }
    info!("Stopped idle timer for session {}", id);
}

fn apply_op(id: &str, timer: &mut SessionTimer, op: SessionOp) -> Result<bool, ConfigError> {
    match op {
        SessionOp::Activity(kind) => {
            let accepted = timer.notify_activity();
            debug!("Session {} {:?} activity {}", id, kind,
                   if accepted { "accepted" } else { "discarded" });
            Ok(accepted)
        }
        SessionOp::Reset => {
            if !timer.is_enabled() {
                debug!("Ignoring reset of disabled session {}", id);
                return Ok(false);
            }
            timer.reset();
            Ok(true)
        }
        SessionOp::Update(options) => {
            if options.timeout_ms.is_some() || options.warning_ms.is_some() {
                let timeout_ms = options
                    .timeout_ms
                    .unwrap_or(timer.config().timeout_ms as i64);
                let warning_ms = options
                    .warning_ms
                    .unwrap_or(timer.config().warning_ms as i64);
                timer.set_durations(timeout_ms, warning_ms).map_err(|e| {
                    warn!("Rejected durations for session {}: {}", id, e);
                    e
                })?;
                info!("Session {} durations set to timeout={}ms, warning={}ms (next cycle)",
                      id, timeout_ms, warning_ms);
            }
            if let Some(stop_on_idle) = options.stop_on_idle {
                info!("Session {} stop_on_idle set to {}", id, stop_on_idle);
                timer.set_stop_on_idle(stop_on_idle);
            }
            if let Some(enabled) = options.enabled {
                info!("Session {} {}", id, if enabled { "enabled" } else { "disabled" });
                timer.set_enabled(enabled);
            }
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::{ActivityKind, SessionOptions};
    use crate::timer::Phase;

    fn bus() -> (broadcast::Sender<SessionEvent>, broadcast::Receiver<SessionEvent>) {
        broadcast::channel(16)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn goes_idle_and_counts_down() {
        let (events_tx, mut events_rx) = bus();
        let config = TimerConfig::new(5_000).with_warning_ms(3_000);
        let (handle, _task) = spawn_session("desk", config, events_tx).unwrap();

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        settle().await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.remaining_ms, 3_000);

        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.kind, SessionEventKind::Idle);
        assert_eq!(event.session, "desk");

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        settle().await;
        assert_eq!(handle.snapshot().remaining_ms, 2_000);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        settle().await;
        assert_eq!(handle.snapshot().remaining_ms, 0);
        assert!(handle.snapshot().is_idle);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_keeps_session_active() {
        let (events_tx, _events_rx) = bus();
        let (handle, _task) = spawn_session("desk", TimerConfig::new(5_000), events_tx).unwrap();

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(4_000)).await;
            let applied = handle.activity(ActivityKind::Key).await.unwrap();
            assert!(applied.accepted);
            assert_eq!(applied.snapshot.phase, Phase::Active);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_returns_from_idle_with_active_event() {
        let (events_tx, mut events_rx) = bus();
        let config = TimerConfig::new(1_000).with_stop_on_idle(true);
        let (handle, _task) = spawn_session("desk", config, events_tx).unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        settle().await;
        assert_eq!(events_rx.recv().await.unwrap().kind, SessionEventKind::Idle);

        let applied = handle.activity(ActivityKind::Pointer).await.unwrap();
        assert!(!applied.accepted);
        assert!(applied.snapshot.is_idle);

        let applied = handle.reset().await.unwrap();
        assert!(applied.accepted);
        assert_eq!(applied.snapshot.phase, Phase::Active);
        assert_eq!(applied.snapshot.remaining_ms, 1_000);
        assert_eq!(events_rx.recv().await.unwrap().kind, SessionEventKind::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_durations_are_reported() {
        let (events_tx, _events_rx) = bus();
        let (handle, _task) = spawn_session("desk", TimerConfig::new(1_000), events_tx).unwrap();

        let err = handle
            .apply(SessionOp::Update(SessionOptions {
                timeout_ms: Some(-1),
                enabled: Some(false),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::SessionError::Config(ConfigError::NonPositiveTimeout(-1))
        ));
        // the rejected update left the flags alone
        assert!(handle.snapshot().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn update_applies_all_fields_in_one_turn() {
        let (events_tx, _events_rx) = bus();
        let (handle, _task) = spawn_session("desk", TimerConfig::new(1_000), events_tx).unwrap();
        let mut snapshots = handle.watch();
        let _ = snapshots.borrow_and_update();

        let applied = handle
            .apply(SessionOp::Update(SessionOptions {
                timeout_ms: Some(8_000),
                warning_ms: Some(2_000),
                enabled: Some(false),
                stop_on_idle: Some(true),
            }))
            .await
            .unwrap();

        assert!(applied.accepted);
        assert_eq!(applied.snapshot.timeout_ms, 8_000);
        assert_eq!(applied.snapshot.warning_ms, 2_000);
        assert!(!applied.snapshot.enabled);
        assert!(applied.snapshot.stop_on_idle);

        // one update, one published snapshot carrying every change
        assert!(snapshots.has_changed().unwrap());
        assert_eq!(*snapshots.borrow_and_update(), applied.snapshot);
        assert!(!snapshots.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_emits_closed_and_stops_task() {
        let (events_tx, mut events_rx) = bus();
        let (handle, task) = spawn_session("desk", TimerConfig::new(1_000), events_tx).unwrap();

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(events_rx.recv().await.unwrap().kind, SessionEventKind::Closed);
        assert!(handle.reset().await.is_err());
    }

    #[test]
    fn invalid_config_fails_before_spawning() {
        let (events_tx, _events_rx) = bus();
        // no runtime needed: validation happens before tokio::spawn
        let result = spawn_session("desk", TimerConfig::new(0), events_tx);
        assert!(matches!(result, Err(ConfigError::NonPositiveTimeout(0))));
    }
}
