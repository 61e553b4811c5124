//! Merge newly registered third-party widgets into existing modes.

use tracing::{debug, info};

use crate::mode::{BreakpointSize, LayoutEntry, ModeConfig};
use crate::registry::ThirdPartyWidget;

/// Default placement for a widget that has none: full-height card in the
/// first column at row `y`.
pub fn third_party_entry(widget: &str, size: BreakpointSize, y: u32) -> LayoutEntry {
    let w = match size {
        BreakpointSize::Sm => 3,
        BreakpointSize::Lg | BreakpointSize::Md | BreakpointSize::Xs | BreakpointSize::Xxs => 4,
    };
    LayoutEntry::new(widget, 0, y, w, 12)
}

/// Inject one batch of pending registrations into every mode.
///
/// A widget already present in a mode's `widgets` map, enabled or not, is
/// left alone there; otherwise it is enabled and placed at the bottom of
/// every breakpoint. Names in `disabled` are never injected. Returns the
/// names that changed at least one mode, in registration order; an empty
/// result means nothing needs persisting.
pub fn reconcile(
    modes: &mut ModeConfig,
    pending: &[ThirdPartyWidget],
    disabled: &[String],
) -> Vec<String> {
    let mut changed: Vec<String> = Vec::new();

    for widget in pending {
        if disabled.iter().any(|d| d == &widget.name) {
            debug!(widget = %widget.name, "Skipping disabled widget");
            continue;
        }

        for (mode_name, mode) in modes.iter_mut() {
            if mode.widgets.contains_key(&widget.name) {
                continue;
            }
            mode.widgets.insert(widget.name.clone(), true);
            mode.ensure_entry(&widget.name);
            debug!(mode = %mode_name, widget = %widget.name, "Widget added to mode");

            if !changed.contains(&widget.name) {
                changed.push(widget.name.clone());
            }
        }
    }

    if !changed.is_empty() {
        info!(widgets = ?changed, "Modes reconciled");
    }
    changed
}
