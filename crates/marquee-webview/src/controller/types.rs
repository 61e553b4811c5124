use std::time::Duration;

use marquee_config::GuiConfig;

/// Where the panel is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GuiState {
    #[default]
    Closed,
    Opening,
    AwaitingReady,
    Active,
    /// Readiness retries ran out. A later `open` starts over.
    Failed,
}

/// Timing of the readiness handshake and the recovery push.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub title: String,
    /// Readiness timeout of the first attempt.
    pub ready_timeout: Duration,
    /// Added to the timeout after each failed attempt.
    pub backoff_step: Duration,
    pub max_open_attempts: u32,
    /// First persistence push after the panel becomes active.
    pub recovery_initial: Duration,
    pub recovery_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&GuiConfig::default())
    }
}

impl From<&GuiConfig> for ControllerOptions {
    fn from(config: &GuiConfig) -> Self {
        Self {
            title: config.title.clone(),
            ready_timeout: config.ready_timeout(),
            backoff_step: config.backoff_step(),
            max_open_attempts: config.max_open_attempts.max(1),
            recovery_initial: config.recovery_initial(),
            recovery_interval: config.recovery_interval(),
        }
    }
}

/// How a readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    Ready,
    /// The webview answered `{ ready: false }`.
    Refused,
    TimedOut,
    /// The webview went away before answering.
    Disposed,
}
