//! Main application state: the registry of running session timers

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Instant,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

use super::{SessionEvent, SessionHandle, SessionOp, SessionOptions, SessionSnapshot};
use crate::{
    error::SessionError,
    tasks::spawn_session,
    timer::TimerConfig,
};

const EVENT_BUFFER: usize = 256;

#[derive(Debug)]
struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Main application state shared by every handler
#[derive(Debug)]
pub struct AppState {
    /// Running sessions by id
    sessions: Mutex<HashMap<String, SessionEntry>>,
    /// Settings used for values a client leaves out
    pub defaults: TimerConfig,
    /// Idle/active/closed notifications from every session
    pub events_tx: broadcast::Sender<SessionEvent>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    pub fn new(port: u16, host: String, defaults: TimerConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            sessions: Mutex::new(HashMap::new()),
            defaults,
            events_tx,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Subscribe to transitions of every session
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Resolve client options against the defaults
    pub fn resolve_config(&self, options: &SessionOptions) -> Result<TimerConfig, SessionError> {
        let timeout_ms = options
            .timeout_ms
            .unwrap_or(self.defaults.timeout_ms as i64);
        let warning_ms = options
            .warning_ms
            .unwrap_or(self.defaults.warning_ms as i64);

        let config = TimerConfig::from_signed(timeout_ms, warning_ms)?
            .with_enabled(options.enabled.unwrap_or(self.defaults.enabled))
            .with_stop_on_idle(options.stop_on_idle.unwrap_or(self.defaults.stop_on_idle));
        Ok(config)
    }

    /// Start a new session timer
    pub fn create_session(
        &self,
        id: &str,
        options: &SessionOptions,
    ) -> Result<SessionSnapshot, SessionError> {
        let config = self.resolve_config(options)?;

        let mut sessions = self.lock_sessions()?;
        if sessions.contains_key(id) {
            return Err(SessionError::AlreadyExists(id.to_string()));
        }

        let (handle, task) = spawn_session(id, config, self.events_tx.clone())?;
        let snapshot = handle.snapshot();
        sessions.insert(id.to_string(), SessionEntry { handle, task });

        info!("Created session {} (timeout={}ms, warning={}ms)",
              id, config.timeout_ms, config.warning_ms);
        Ok(snapshot)
    }

    /// Handle to a running session
    pub fn session(&self, id: &str) -> Result<SessionHandle, SessionError> {
        self.lock_sessions()?
            .get(id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Snapshots of every session, ordered by id
    pub fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, SessionError> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .lock_sessions()?
            .values()
            .map(|entry| entry.handle.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshots)
    }

    /// Number of sessions and how many of them are idle
    pub fn session_counts(&self) -> Result<(usize, usize), SessionError> {
        let sessions = self.lock_sessions()?;
        let idle = sessions
            .values()
            .filter(|entry| entry.handle.snapshot().is_idle)
            .count();
        Ok((sessions.len(), idle))
    }

    /// Apply a partial update in a single step of the session task
    pub async fn update_session(
        &self,
        id: &str,
        options: &SessionOptions,
    ) -> Result<SessionSnapshot, SessionError> {
        let handle = self.session(id)?;
        Ok(handle.apply(SessionOp::Update(*options)).await?.snapshot)
    }

    /// Tear a session down and return its final snapshot
    pub async fn remove_session(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        let entry = self
            .lock_sessions()?
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        Ok(Self::stop_entry(id, entry).await)
    }

    /// Tear down every session, used on shutdown
    pub async fn shutdown_all(&self) {
        let entries: Vec<(String, SessionEntry)> = match self.lock_sessions() {
            Ok(mut sessions) => sessions.drain().collect(),
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        for (id, entry) in entries {
            Self::stop_entry(&id, entry).await;
        }
    }

    async fn stop_entry(id: &str, entry: SessionEntry) -> SessionSnapshot {
        let snapshot = entry.handle.snapshot();
        if let Err(e) = entry.handle.shutdown().await {
            warn!("Failed to stop session {}: {}", id, e);
        }
        if let Err(e) = entry.task.await {
            warn!("Session {} task ended abnormally: {}", id, e);
        }
        info!("Removed session {}", id);
        snapshot
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionEntry>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Lock(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::ActivityKind;
    use crate::timer::ConfigError;

    fn state() -> AppState {
        AppState::new(0, "127.0.0.1".to_string(), TimerConfig::new(5_000).with_warning_ms(3_000))
    }

    #[tokio::test(start_paused = true)]
    async fn creates_with_defaults() {
        let state = state();
        let snapshot = state.create_session("a", &SessionOptions::default()).unwrap();
        assert_eq!(snapshot.timeout_ms, 5_000);
        assert_eq!(snapshot.warning_ms, 3_000);
        assert!(snapshot.enabled);
        assert!(!snapshot.stop_on_idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_duplicates_and_bad_config() {
        let state = state();
        state.create_session("a", &SessionOptions::default()).unwrap();
        assert!(matches!(
            state.create_session("a", &SessionOptions::default()),
            Err(SessionError::AlreadyExists(_))
        ));

        let options = SessionOptions {
            warning_ms: Some(-10),
            ..Default::default()
        };
        assert!(matches!(
            state.create_session("b", &options),
            Err(SessionError::Config(ConfigError::NegativeWarning(-10)))
        ));
        assert!(matches!(state.session("b"), Err(SessionError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_are_independent() {
        let state = state();
        state.create_session("a", &SessionOptions::default()).unwrap();
        let slow = SessionOptions {
            timeout_ms: Some(60_000),
            ..Default::default()
        };
        state.create_session("b", &slow).unwrap();

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        state.session("b").unwrap().activity(ActivityKind::Click).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        tokio::task::yield_now().await;

        let snapshots = state.list_sessions().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[0].is_idle);
        assert!(!snapshots[1].is_idle);
        assert_eq!(state.session_counts().unwrap(), (2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn update_applies_flags_and_durations() {
        let state = state();
        state.create_session("a", &SessionOptions::default()).unwrap();

        let update = SessionOptions {
            timeout_ms: Some(10_000),
            stop_on_idle: Some(true),
            enabled: Some(false),
            ..Default::default()
        };
        let snapshot = state.update_session("a", &update).await.unwrap();
        assert_eq!(snapshot.timeout_ms, 10_000);
        assert_eq!(snapshot.warning_ms, 3_000);
        assert!(snapshot.stop_on_idle);
        assert!(!snapshot.enabled);

        // disabled: nothing fires
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!state.session("a").unwrap().snapshot().is_idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_update_keeps_flags() {
        let state = state();
        state.create_session("a", &SessionOptions::default()).unwrap();

        let update = SessionOptions {
            timeout_ms: Some(0),
            enabled: Some(false),
            ..Default::default()
        };
        assert!(state.update_session("a", &update).await.is_err());
        assert!(state.session("a").unwrap().snapshot().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_and_shutdown() {
        let state = state();
        let mut events = state.subscribe_events();
        state.create_session("a", &SessionOptions::default()).unwrap();
        state.create_session("b", &SessionOptions::default()).unwrap();

        let snapshot = state.remove_session("a").await.unwrap();
        assert_eq!(snapshot.id, "a");
        assert_eq!(events.recv().await.unwrap().session, "a");
        assert!(matches!(state.remove_session("a").await, Err(SessionError::NotFound(_))));

        state.shutdown_all().await;
        assert_eq!(state.session_counts().unwrap(), (0, 0));
    }

    #[test]
    fn uptime_is_formatted() {
        let state = state();
        assert!(state.get_uptime().ends_with('s'));
    }
}
