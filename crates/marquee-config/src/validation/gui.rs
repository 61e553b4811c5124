//! Webview handshake timing validation.

use crate::schema::MarqueeConfig;

use super::helpers::validate_range;

pub(crate) fn validate_gui(errors: &mut Vec<String>, config: &MarqueeConfig) {
    let gui = &config.gui;
    validate_range(errors, "gui.ready_timeout_ms", gui.ready_timeout_ms, 100, 600_000);
    validate_range(errors, "gui.backoff_step_ms", gui.backoff_step_ms, 0, 600_000);
    validate_range(
        errors,
        "gui.max_open_attempts",
        u64::from(gui.max_open_attempts),
        1,
        50,
    );
    validate_range(errors, "gui.recovery_initial_ms", gui.recovery_initial_ms, 0, 60_000);
    validate_range(
        errors,
        "gui.recovery_interval_ms",
        gui.recovery_interval_ms,
        100,
        600_000,
    );
}
