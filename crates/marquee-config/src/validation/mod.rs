//! Full configuration validation.
//!
//! Each domain has its own check; this orchestrator runs them all and
//! collects errors into a single `ConfigError`.

mod gui;
mod helpers;


use crate::schema::MarqueeConfig;
use marquee_common::ConfigError;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &MarqueeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    gui::validate_gui(&mut errors, config);

    if config.server.bind.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "server.bind = {:?} is not a socket address",
            config.server.bind
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(format!(
            "logging.level = {:?} must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.widgets.disabled.iter().any(|w| w.trim().is_empty()) {
        errors.push("widgets.disabled contains an empty name".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
