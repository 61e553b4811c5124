//! Mode operations over the GUI's own namespace.
//!
//! State fields: `modeName`, `prevMode`. Configuration field: `modes`.

use std::collections::BTreeMap;

use marquee_common::JsonMap;
use marquee_layout::{
    default_enabled_widgets, default_layouts, preset_modes, reconcile, repair_modes, Layouts, Mode,
    ModeConfig, WidgetRegistry, DEFAULT_MODE,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::provider::Provider;

/// Namespace of the dashboard's own State + Configuration.
pub const GUI_NAMESPACE: &str = "@vscode-marquee/gui";

const MODES: &str = "modes";
const MODE_NAME: &str = "modeName";
const PREV_MODE: &str = "prevMode";

pub struct ModeProvider {
    provider: Provider,
}

impl ModeProvider {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Persisted modes repaired on read, or the presets when none exist.
    /// `default` is always present.
    pub fn modes(&self) -> ModeConfig {
        repair_modes(self.provider.get_as::<ModeConfig>(MODES))
    }

    pub fn mode_name(&self) -> String {
        self.provider
            .get_as::<String>(MODE_NAME)
            .unwrap_or_else(|| DEFAULT_MODE.to_string())
    }

    pub fn prev_mode(&self) -> Option<String> {
        self.provider.get_as::<String>(PREV_MODE)
    }

    /// The active mode; an empty mode if the active name is dangling.
    pub fn mode(&self) -> Mode {
        self.modes().remove(&self.mode_name()).unwrap_or_default()
    }

    /// Switch modes, remembering the previous one.
    pub fn set_mode_name(&self, new_name: &str) -> bool {
        let new_name = mode_key(new_name);
        let new_name = new_name.as_str();
        let current = self.mode_name();
        if new_name == current || !self.modes().contains_key(new_name) {
            return false;
        }

        let mut partial = JsonMap::new();
        partial.insert(MODE_NAME.into(), json!(new_name));
        partial.insert(PREV_MODE.into(), json!(current));
        self.provider.set_many(partial);
        info!(mode = %new_name, prev = %current, "Mode switched");
        true
    }

    pub fn set_current_mode_layout(&self, layouts: Layouts) {
        let name = self.mode_name();
        let mut modes = self.modes();
        let mode = modes.entry(name).or_default();
        mode.layouts = layouts;
        mode.normalize();
        self.set_modes(modes);
    }

    /// Enable or disable a widget in `mode_name`. Enabling also places it
    /// on every breakpoint that lacks it.
    pub fn set_mode_widget(&self, mode_name: &str, widget: &str, enabled: bool) -> bool {
        let mut modes = self.modes();
        let Some(mode) = modes.get_mut(&mode_key(mode_name)) else {
            return false;
        };
        mode.widgets.insert(widget.to_string(), enabled);
        if enabled {
            mode.ensure_entry(widget);
        }
        self.set_modes(modes);
        true
    }

    /// Disable a widget in the active mode.
    pub fn remove_mode_widget(&self, widget: &str) -> bool {
        self.set_mode_widget(&self.mode_name(), widget, false)
    }

    /// Add a mode with the default layout and widget set.
    pub fn add_mode(&self, name: &str, icon: Option<Value>) -> bool {
        self.add_mode_with_params(name, icon, default_layouts(), default_enabled_widgets())
    }

    /// Add a mode under the lowercased `name`. No-op if it already exists.
    pub fn add_mode_with_params(
        &self,
        name: &str,
        icon: Option<Value>,
        layouts: Layouts,
        widgets: BTreeMap<String, bool>,
    ) -> bool {
        let name = mode_key(name);
        if name.is_empty() {
            return false;
        }

        let mut modes = self.modes();
        if modes.contains_key(&name) {
            debug!(mode = %name, "Mode already exists");
            return false;
        }

        let mut mode = Mode {
            layouts,
            widgets,
            icon,
        };
        mode.normalize();
        modes.insert(name.clone(), mode);
        self.set_modes(modes);
        info!(mode = %name, "Mode added");
        true
    }

    /// Copy an existing mode's layouts and widgets under a new name.
    pub fn duplicate_mode(&self, source: &str, new_name: &str, icon: Option<Value>) -> bool {
        let Some(existing) = self.modes().remove(&mode_key(source)) else {
            return false;
        };
        self.add_mode_with_params(new_name, icon, existing.layouts, existing.widgets)
    }

    /// Delete a mode. `default` and unknown names are left alone; deleting
    /// the active mode falls back to `default` and clears `prevMode`.
    pub fn remove_mode(&self, name: &str) -> bool {
        let name = mode_key(name);
        let name = name.as_str();
        if name == DEFAULT_MODE {
            return false;
        }
        let mut modes = self.modes();
        if modes.remove(name).is_none() {
            return false;
        }

        let mut partial = JsonMap::new();
        partial.insert(MODES.into(), modes_value(&modes));
        if name == self.mode_name() {
            partial.insert(MODE_NAME.into(), json!(DEFAULT_MODE));
            partial.insert(PREV_MODE.into(), Value::Null);
        }
        self.provider.set_many(partial);
        info!(mode = %name, "Mode removed");
        true
    }

    /// Back to the presets on the `default` mode.
    pub fn reset_modes(&self) {
        let mut partial = JsonMap::new();
        partial.insert(MODES.into(), modes_value(&preset_modes()));
        partial.insert(MODE_NAME.into(), json!(DEFAULT_MODE));
        partial.insert(PREV_MODE.into(), Value::Null);
        self.provider.set_many(partial);
        info!("Modes reset");
    }

    /// Merge the registry's pending widgets into every mode with a single
    /// update. Returns the widgets that changed something.
    pub fn reconcile_pending(&self, registry: &mut WidgetRegistry, disabled: &[String]) -> Vec<String> {
        let pending = registry.take_pending();
        if pending.is_empty() {
            return Vec::new();
        }

        let mut modes = self.modes();
        let changed = reconcile(&mut modes, &pending, disabled);
        if !changed.is_empty() {
            self.set_modes(modes);
        }
        changed
    }

    fn set_modes(&self, modes: ModeConfig) {
        self.provider.set(MODES, modes_value(&modes));
    }
}

/// Mode names are stored trimmed and lowercased.
fn mode_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn modes_value(modes: &ModeConfig) -> Value {
    serde_json::to_value(modes).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_channel::MemoryEndpoint;
    use marquee_common::{BootstrapPayload, EndpointId, EventBusRegistry};
    use marquee_layout::{BreakpointSize, ThirdPartyWidget, PRESET_MODES};
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn provider() -> (ModeProvider, mpsc::UnboundedReceiver<Value>) {
        let (host, rx) = MemoryEndpoint::new(EndpointId::named("host"));
        let buses = EventBusRegistry::new();
        let provider = Provider::mount(GUI_NAMESPACE, &BootstrapPayload::default(), host, &buses);
        (ModeProvider::new(provider), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Value>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(v) = rx.try_recv() {
            out.push(v);
        }
        out
    }

    #[test]
    fn mode_lookups_ignore_case_and_whitespace() {
        let (modes, _) = provider();
        assert!(modes.add_mode(" Focus ", None));
        assert!(modes.modes().contains_key("focus"));

        assert!(modes.set_mode_name("Focus"));
        assert_eq!(modes.mode_name(), "focus");
        assert!(modes.set_mode_widget("FOCUS", "news", true));
        assert!(modes.mode().is_enabled("news"));

        assert!(modes.duplicate_mode("Focus", "Deep", None));
        assert!(modes.modes().contains_key("deep"));

        assert!(modes.remove_mode("Play"));
        assert!(!modes.modes().contains_key("play"));
        assert!(modes.remove_mode(" FOCUS"));
        assert_eq!(modes.mode_name(), "default");
        assert!(!modes.remove_mode("Default"));
    }

    #[test]
    fn empty_state_falls_back_to_presets() {
        let (modes, _) = provider();
        assert_eq!(modes.mode_name(), "default");
        assert!(modes.prev_mode().is_none());
        assert_eq!(modes.modes().len(), PRESET_MODES.len());
        assert!(modes.mode().is_enabled("welcome"));
    }

    #[test]
    fn set_mode_name_records_previous_in_one_message() {
        let (modes, mut rx) = provider();
        assert!(modes.set_mode_name("work"));

        assert_eq!(modes.mode_name(), "work");
        assert_eq!(modes.prev_mode().as_deref(), Some("default"));
        let sent = drain(&mut rx);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][GUI_NAMESPACE]["modeName"], "work");
        assert_eq!(sent[0][GUI_NAMESPACE]["prevMode"], "default");
    }

    #[test]
    fn set_mode_name_ignores_same_or_unknown() {
        let (modes, mut rx) = provider();
        assert!(!modes.set_mode_name("default"));
        assert!(!modes.set_mode_name("nope"));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn default_mode_cannot_be_removed() {
        let (modes, mut rx) = provider();
        let before = modes.modes();

        assert!(!modes.remove_mode("default"));
        assert_eq!(modes.modes(), before);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn removing_missing_mode_is_a_noop() {
        let (modes, _) = provider();
        assert!(!modes.remove_mode("ghost"));
        assert_eq!(modes.modes().len(), PRESET_MODES.len());
    }

    #[test]
    fn removing_active_mode_falls_back_to_default() {
        let (modes, _) = provider();
        modes.set_mode_name("play");

        assert!(modes.remove_mode("play"));
        assert_eq!(modes.mode_name(), "default");
        assert!(modes.prev_mode().is_none());
        assert!(!modes.modes().contains_key("play"));
    }

    #[test]
    fn removing_inactive_mode_keeps_pointer() {
        let (modes, _) = provider();
        modes.set_mode_name("play");
        assert!(modes.remove_mode("work"));
        assert_eq!(modes.mode_name(), "play");
        assert_eq!(modes.prev_mode().as_deref(), Some("default"));
    }

    #[test]
    fn added_mode_names_are_lowercased_and_unique() {
        let (modes, _) = provider();
        assert!(modes.add_mode("Focus", None));
        assert!(!modes.add_mode("FOCUS", None));

        let all = modes.modes();
        assert!(all.contains_key("focus"));
        assert_eq!(all["focus"].widgets, default_enabled_widgets());
    }

    #[test]
    fn duplicate_copies_layout_and_widgets() {
        let (modes, _) = provider();
        assert!(modes.duplicate_mode("play", "Play Copy", Some(json!({ "id": "tada" }))));
        assert!(!modes.duplicate_mode("ghost", "x", None));

        let all = modes.modes();
        assert_eq!(all["play copy"].widgets, all["play"].widgets);
        assert_eq!(all["play copy"].layouts, all["play"].layouts);
        assert_eq!(all["play copy"].icon, Some(json!({ "id": "tada" })));
    }

    #[test]
    fn remove_mode_widget_disables_in_active_mode() {
        let (modes, _) = provider();
        assert!(modes.remove_mode_widget("news"));
        assert!(!modes.mode().is_enabled("news"));
        assert!(modes.modes()["play"].is_enabled("news"));
    }

    #[test]
    fn enabling_a_widget_places_it() {
        let (modes, _) = provider();
        assert!(modes.set_mode_widget("work", "markdown", true));
        let work = &modes.modes()["work"];
        for size in BreakpointSize::ALL {
            assert!(work.layouts.contains(size, "markdown"));
        }
    }

    #[test]
    fn reset_restores_presets() {
        let (modes, _) = provider();
        modes.add_mode("extra", None);
        modes.set_mode_name("extra");

        modes.reset_modes();
        assert_eq!(modes.modes(), preset_modes());
        assert_eq!(modes.mode_name(), "default");
        assert!(modes.prev_mode().is_none());
    }

    #[test]
    fn reconcile_pending_writes_modes_once() {
        let (modes, mut rx) = provider();
        let mut registry = WidgetRegistry::new();
        registry.define_widget(ThirdPartyWidget::new("stateful-marquee-widget", "Counter", ""));
        registry.define_widget(ThirdPartyWidget::new("stateful-marquee-updatename", "Name", ""));

        let changed = modes.reconcile_pending(&mut registry, &[]);
        assert_eq!(changed.len(), 2);
        assert_eq!(drain(&mut rx).len(), 1);

        for mode in modes.modes().values() {
            assert!(mode.is_enabled("stateful-marquee-widget"));
            assert!(mode.missing_entries().is_empty());
        }

        assert!(modes.reconcile_pending(&mut registry, &[]).is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn mode_invariant_holds_after_mixed_operations() {
        let (modes, _) = provider();
        let mut registry = WidgetRegistry::new();

        modes.add_mode("a", None);
        registry.define_widget(ThirdPartyWidget::new("w1", "", ""));
        modes.reconcile_pending(&mut registry, &[]);
        modes.duplicate_mode("a", "b", None);
        modes.set_mode_widget("b", "dependencies", true);
        modes.remove_mode("work");
        modes.set_current_mode_layout(Layouts::default());
        registry.define_widget(ThirdPartyWidget::new("w2", "", ""));
        modes.reconcile_pending(&mut registry, &[]);

        for (name, mode) in modes.modes() {
            assert!(mode.missing_entries().is_empty(), "mode {name} broke the invariant");
        }
    }
}
