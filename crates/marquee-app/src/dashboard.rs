//! Host-side access to the dashboard's own namespace.

use marquee_common::{JsonMap, Namespace, StateError};
use marquee_gui::GUI_NAMESPACE;
use marquee_layout::{
    preset_modes, reconcile, repair_modes, ModeConfig, ThirdPartyWidget, WidgetRegistry,
    DEFAULT_MODE,
};
use marquee_state::{StateManager, Tier};
use serde_json::{json, Value};
use tracing::{debug, info};

const MODES: &str = "modes";
const MODE_NAME: &str = "modeName";

/// Declare the GUI namespace: the `default` mode is active and the preset
/// modes are configured until the user changes them.
pub fn register(state: &StateManager) -> Result<(), StateError> {
    let namespace = Namespace::new(GUI_NAMESPACE)?;

    let mut defaults = JsonMap::new();
    defaults.insert(MODE_NAME.into(), json!(DEFAULT_MODE));
    defaults.insert("prevMode".into(), Value::Null);

    let mut configuration = JsonMap::new();
    configuration.insert(MODES.into(), modes_value(&preset_modes()));

    state.register(&namespace, defaults, configuration);
    Ok(())
}

pub fn modes(state: &StateManager) -> ModeConfig {
    let persisted = state.get_field(GUI_NAMESPACE, Tier::Configuration, MODES);
    repair_modes(serde_json::from_value(persisted).ok())
}

pub fn active_mode(state: &StateManager) -> String {
    match state.get_field(GUI_NAMESPACE, Tier::State, MODE_NAME) {
        Value::String(name) => name,
        _ => DEFAULT_MODE.to_string(),
    }
}

/// Record a third-party widget and merge it into every persisted mode.
/// Returns the widgets that changed at least one mode.
pub fn define_widget(
    state: &StateManager,
    registry: &mut WidgetRegistry,
    widget: ThirdPartyWidget,
    disabled: &[String],
) -> Result<Vec<String>, StateError> {
    if !registry.define_widget(widget) {
        return Ok(Vec::new());
    }

    let pending = registry.take_pending();
    let mut modes = modes(state);
    let changed = reconcile(&mut modes, &pending, disabled);
    if changed.is_empty() {
        debug!(pending = pending.len(), "Modes already up to date");
        return Ok(changed);
    }

    state.update_configuration(GUI_NAMESPACE, MODES, modes_value(&modes))?;
    info!(widgets = ?changed, "Modes reconciled");
    Ok(changed)
}

/// One line per mode, `*` marking the active one.
pub fn describe(modes: &ModeConfig, active: &str) -> Vec<String> {
    modes
        .iter()
        .map(|(name, mode)| {
            let marker = if name == active { '*' } else { ' ' };
            let enabled: Vec<&str> = mode.enabled_widgets().collect();
            format!("{marker} {name}: {}", enabled.join(", "))
        })
        .collect()
}

fn modes_value(modes: &ModeConfig) -> Value {
    serde_json::to_value(modes).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_layout::BreakpointSize;
    use marquee_state::MemoryStorage;
    use std::sync::Arc;

    fn state() -> StateManager {
        let state = StateManager::new(Arc::new(MemoryStorage::new())).unwrap();
        register(&state).unwrap();
        state
    }

    #[test]
    fn fresh_state_uses_presets() {
        let state = state();
        assert_eq!(modes(&state), preset_modes());
        assert_eq!(active_mode(&state), DEFAULT_MODE);
    }

    #[test]
    fn defined_widget_lands_in_every_mode() {
        let state = state();
        let mut registry = WidgetRegistry::new();
        let widget = ThirdPartyWidget::new("stateful-marquee-widget", "Stateful", "");

        let changed = define_widget(&state, &mut registry, widget.clone(), &[]).unwrap();
        assert_eq!(changed, vec!["stateful-marquee-widget"]);

        for (name, mode) in modes(&state) {
            assert_eq!(mode.widgets.get("stateful-marquee-widget"), Some(&true), "mode {name}");
            for size in BreakpointSize::ALL {
                let count = mode
                    .layouts
                    .get(size)
                    .iter()
                    .filter(|e| e.i == "stateful-marquee-widget")
                    .count();
                assert_eq!(count, 1, "mode {name} at {size}");
            }
        }

        // a second definition is ignored
        assert!(define_widget(&state, &mut registry, widget, &[]).unwrap().is_empty());
    }

    #[test]
    fn disabled_widget_is_not_injected() {
        let state = state();
        let mut registry = WidgetRegistry::new();
        let changed = define_widget(
            &state,
            &mut registry,
            ThirdPartyWidget::new("noisy-widget", "Noisy", ""),
            &["noisy-widget".to_string()],
        )
        .unwrap();

        assert!(changed.is_empty());
        assert!(modes(&state).values().all(|m| !m.widgets.contains_key("noisy-widget")));
    }

    #[test]
    fn describe_marks_active_mode() {
        let lines = describe(&preset_modes(), "work");
        assert!(lines.iter().any(|l| l.starts_with("* work: ")));
        assert!(lines.iter().any(|l| l.starts_with("  default: ")));
    }
}
