//! Timing knobs for the lifecycle engine.
//!
//! Every wait servman performs is bounded by one of these values. They are
//! heuristics, not guarantees: a server that takes longer than
//! `start_check_delay` to crash is still reported as running.
//!
//! Settings are read from an optional `[settings]` table in config.toml:
//! ```toml
//! [settings]
//! start_check_delay = "2s"
//! restart_settle = "2s"
//! child_grace = "3s"
//! root_grace = "5s"
//! connect_timeout = "200ms"
//! ```

use crate::error::ConfigError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Wait after a background spawn before checking the child is still alive
    pub start_check_delay: Duration,
    /// Pause between stop and start during a restart so ports are released
    pub restart_settle: Duration,
    /// Time descendants get to exit after SIGTERM before they are killed
    pub child_grace: Duration,
    /// Time the root process gets to exit after SIGTERM before it is killed
    pub root_grace: Duration,
    /// Timeout of the loopback connect probe used when the socket table is unreadable
    pub connect_timeout: Duration,
    /// Window over which CPU usage is sampled for status
    pub cpu_sample: Duration,
    /// How often liveness is re-checked while waiting for a process to exit
    pub poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_check_delay: Duration::from_secs(2),
            restart_settle: Duration::from_secs(2),
            child_grace: Duration::from_secs(3),
            root_grace: Duration::from_secs(5),
            connect_timeout: Duration::from_millis(200),
            cpu_sample: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsRaw {
    start_check_delay: Option<String>,
    restart_settle: Option<String>,
    child_grace: Option<String>,
    root_grace: Option<String>,
    connect_timeout: Option<String>,
    cpu_sample: Option<String>,
    poll_interval: Option<String>,
}

impl Settings {
    pub fn parse_duration(s: &str) -> Option<Duration> {
        humantime::parse_duration(s.trim()).ok()
    }

    /// Builds settings from the `[settings]` table, falling back to defaults
    /// for keys that are not set.
    pub fn from_toml(value: toml::Value) -> Result<Self, ConfigError> {
        let raw: SettingsRaw = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::InvalidSetting {
                key: "settings".to_string(),
                reason: e.message().to_string(),
            })?;

        let mut settings = Self::default();
        let fields = [
            ("start_check_delay", raw.start_check_delay, &mut settings.start_check_delay),
            ("restart_settle", raw.restart_settle, &mut settings.restart_settle),
            ("child_grace", raw.child_grace, &mut settings.child_grace),
            ("root_grace", raw.root_grace, &mut settings.root_grace),
            ("connect_timeout", raw.connect_timeout, &mut settings.connect_timeout),
            ("cpu_sample", raw.cpu_sample, &mut settings.cpu_sample),
            ("poll_interval", raw.poll_interval, &mut settings.poll_interval),
        ];
        for (key, value, slot) in fields {
            if let Some(value) = value {
                *slot = Self::parse_duration(&value).ok_or_else(|| ConfigError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("'{value}' is not a duration"),
                })?;
            }
        }
        if settings.poll_interval.is_zero() {
            return Err(ConfigError::InvalidSetting {
                key: "poll_interval".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(settings)
    }

    /// CPU sampling window, never shorter than what sysinfo can measure.
    pub fn cpu_sample_window(&self) -> Duration {
        self.cpu_sample.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
    }
}
