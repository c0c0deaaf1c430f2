//! Timer configuration and validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default advisory countdown shown while idle
pub const DEFAULT_WARNING_MS: u64 = 30_000;

/// Upper bound for any configured duration (30 days)
pub const MAX_DURATION_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Rejected timer configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("timeout must be greater than zero, got {0}ms")]
    NonPositiveTimeout(i64),

    #[error("warning must not be negative, got {0}ms")]
    NegativeWarning(i64),

    #[error("{field} of {value_ms}ms exceeds the maximum of {max_ms}ms")]
    DurationTooLong {
        field: &'static str,
        value_ms: u64,
        max_ms: u64,
    },
}

/// Immutable configuration of a single idle timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Inactivity before the Active -> Idle transition
    pub timeout_ms: u64,
    /// Countdown length shown while idle
    pub warning_ms: u64,
    /// When false every scheduled callback is cancelled and resets are ignored
    pub enabled: bool,
    /// Ignore plain activity while idle; only an explicit reset leaves Idle
    pub stop_on_idle: bool,
}

impl TimerConfig {
    /// Create an enabled configuration with the default warning countdown
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            warning_ms: DEFAULT_WARNING_MS,
            enabled: true,
            stop_on_idle: false,
        }
    }

    /// Build a configuration from signed millisecond values as they arrive
    /// from clients, rejecting negative or zero durations.
    pub fn from_signed(timeout_ms: i64, warning_ms: i64) -> Result<Self, ConfigError> {
        let (timeout_ms, warning_ms) = validate_signed(timeout_ms, warning_ms)?;
        Ok(Self::new(timeout_ms).with_warning_ms(warning_ms))
    }

    pub fn with_warning_ms(mut self, warning_ms: u64) -> Self {
        self.warning_ms = warning_ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_stop_on_idle(mut self, stop_on_idle: bool) -> Self {
        self.stop_on_idle = stop_on_idle;
        self
    }

    /// Check the durations are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_durations(self.timeout_ms, self.warning_ms)
    }

    /// Number of whole seconds the idle countdown runs for
    pub fn countdown_seconds(&self) -> u64 {
        self.warning_ms.div_ceil(1000)
    }
}

/// Validate signed client durations and convert them to unsigned milliseconds
pub fn validate_signed(timeout_ms: i64, warning_ms: i64) -> Result<(u64, u64), ConfigError> {
    if timeout_ms <= 0 {
        return Err(ConfigError::NonPositiveTimeout(timeout_ms));
    }
    if warning_ms < 0 {
        return Err(ConfigError::NegativeWarning(warning_ms));
    }
    let (timeout_ms, warning_ms) = (timeout_ms as u64, warning_ms as u64);
    validate_durations(timeout_ms, warning_ms)?;
    Ok((timeout_ms, warning_ms))
}

fn validate_durations(timeout_ms: u64, warning_ms: u64) -> Result<(), ConfigError> {
    if timeout_ms == 0 {
        return Err(ConfigError::NonPositiveTimeout(0));
    }
    if timeout_ms > MAX_DURATION_MS {
        return Err(ConfigError::DurationTooLong {
            field: "timeout",
            value_ms: timeout_ms,
            max_ms: MAX_DURATION_MS,
        });
    }
    if warning_ms > MAX_DURATION_MS {
        return Err(ConfigError::DurationTooLong {
            field: "warning",
            value_ms: warning_ms,
            max_ms: MAX_DURATION_MS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TimerConfig::new(5_000);
        assert_eq!(config.warning_ms, 30_000);
        assert!(config.enabled);
        assert!(!config.stop_on_idle);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert_eq!(
            TimerConfig::new(0).validate(),
            Err(ConfigError::NonPositiveTimeout(0))
        );
        assert_eq!(
            TimerConfig::from_signed(-5, 1_000),
            Err(ConfigError::NonPositiveTimeout(-5))
        );
    }

    #[test]
    fn rejects_negative_warning() {
        assert_eq!(
            TimerConfig::from_signed(1_000, -1),
            Err(ConfigError::NegativeWarning(-1))
        );
    }

    #[test]
    fn rejects_huge_durations() {
        let err = TimerConfig::new(MAX_DURATION_MS + 1).validate().unwrap_err();
        assert!(matches!(err, ConfigError::DurationTooLong { field: "timeout", .. }));

        let err = TimerConfig::new(1_000)
            .with_warning_ms(MAX_DURATION_MS + 1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DurationTooLong { field: "warning", .. }));
    }

    #[test]
    fn zero_warning_is_allowed() {
        let config = TimerConfig::from_signed(1_000, 0).unwrap();
        assert_eq!(config.countdown_seconds(), 0);
    }

    #[test]
    fn countdown_rounds_up_to_whole_seconds() {
        assert_eq!(TimerConfig::new(1).with_warning_ms(3_000).countdown_seconds(), 3);
        assert_eq!(TimerConfig::new(1).with_warning_ms(2_001).countdown_seconds(), 3);
        assert_eq!(TimerConfig::new(1).with_warning_ms(1).countdown_seconds(), 1);
    }
}
