//! Configuration and CLI argument handling

use clap::Parser;

use crate::{services::HookConfig, timer::TimerConfig};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "idle-sentry")]
#[command(about = "An HTTP daemon hosting idle session timers with warning countdowns")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20560")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Default inactivity timeout in seconds
    #[arg(short, long, default_value = "900")]
    pub timeout: u64,

    /// Default idle warning countdown in seconds
    #[arg(short, long, default_value = "30")]
    pub warning: u64,

    /// Ignore activity on idle sessions by default; only an explicit reset
    /// brings them back
    #[arg(long)]
    pub stop_on_idle: bool,

    /// Shell command run when a session goes idle
    #[arg(long)]
    pub on_idle: Option<String>,

    /// Shell command run when a session becomes active again
    #[arg(long)]
    pub on_active: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Timer settings applied to sessions that do not override them
    pub fn timer_defaults(&self) -> TimerConfig {
        TimerConfig::new(self.timeout.saturating_mul(1000))
            .with_warning_ms(self.warning.saturating_mul(1000))
            .with_stop_on_idle(self.stop_on_idle)
    }

    pub fn hooks(&self) -> HookConfig {
        HookConfig {
            on_idle: self.on_idle.clone(),
            on_active: self.on_active.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["idle-sentry"]).unwrap();
        assert_eq!(config.address(), "0.0.0.0:20560");
        assert_eq!(config.log_level(), "info");

        let defaults = config.timer_defaults();
        assert_eq!(defaults.timeout_ms, 900_000);
        assert_eq!(defaults.warning_ms, 30_000);
        assert!(defaults.enabled);
        assert!(!defaults.stop_on_idle);
        assert!(config.hooks().is_empty());
    }

    #[test]
    fn overrides() {
        let config = Config::try_parse_from([
            "idle-sentry",
            "--timeout", "60",
            "--warning", "10",
            "--stop-on-idle",
            "--on-idle", "loginctl lock-session",
            "-v",
        ])
        .unwrap();

        let defaults = config.timer_defaults();
        assert_eq!(defaults.timeout_ms, 60_000);
        assert_eq!(defaults.warning_ms, 10_000);
        assert!(defaults.stop_on_idle);
        assert_eq!(config.hooks().on_idle.as_deref(), Some("loginctl lock-session"));
        assert_eq!(config.log_level(), "debug");
    }
}
