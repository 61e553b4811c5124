//! Webview panel handshake and recovery timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    /// Panel title.
    pub title: String,
    /// First readiness timeout in milliseconds.
    pub ready_timeout_ms: u64,
    /// Added to the readiness timeout after every failed attempt.
    pub backoff_step_ms: u64,
    /// Panel creations before giving up (valid range: 1-50).
    pub max_open_attempts: u32,
    /// Delay before the first periodic persistence push.
    pub recovery_initial_ms: u64,
    /// Period of the persistence push while the panel is active.
    pub recovery_interval_ms: u64,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            title: "Marquee".to_string(),
            ready_timeout_ms: 2000,
            backoff_step_ms: 2000,
            max_open_attempts: 5,
            recovery_initial_ms: 100,
            recovery_interval_ms: 1000,
        }
    }
}

impl GuiConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn recovery_initial(&self) -> Duration {
        Duration::from_millis(self.recovery_initial_ms)
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_millis(self.recovery_interval_ms)
    }
}
