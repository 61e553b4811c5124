//! Default TOML config template with inline documentation comments.

pub(crate) fn default_config_toml() -> String {
    r##"# Marquee host configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[gui]
# title = "Marquee"
# ready_timeout_ms = 2000       # first wait for the webview's ready signal
# backoff_step_ms = 2000        # added to the wait after each failed attempt
# max_open_attempts = 5         # 1-50, then the panel is given up on
# recovery_initial_ms = 100     # first persistence push once active
# recovery_interval_ms = 1000   # persistence push period while active

[storage]
# path = "/home/me/.local/share/marquee/state.json"

[server]
# bind = "127.0.0.1:7731"

[logging]
# level = "info"                # trace, debug, info, warn, error

[widgets]
# disabled = []                 # third-party widgets never added to modes
"##
    .to_string()
}
