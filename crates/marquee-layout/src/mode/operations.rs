//! Invariant checks and repairs on a single mode.

use std::collections::HashSet;

use tracing::debug;

use super::types::{BreakpointSize, LayoutEntry, Mode};
use crate::reconcile::third_party_entry;

impl Mode {
    /// Names with `widgets[name] == true`, in name order.
    pub fn enabled_widgets(&self) -> impl Iterator<Item = &str> {
        self.widgets
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_enabled(&self, widget: &str) -> bool {
        self.widgets.get(widget).copied().unwrap_or(false)
    }

    /// Give `widget` a placement at the bottom of every breakpoint that
    /// lacks one. Returns true if anything was added.
    pub fn ensure_entry(&mut self, widget: &str) -> bool {
        let mut added = false;
        for size in BreakpointSize::ALL {
            if self.layouts.contains(size, widget) {
                continue;
            }
            let y = self.layouts.bottom(size);
            self.layouts.get_mut(size).push(third_party_entry(widget, size, y));
            added = true;
        }
        added
    }

    /// Enabled widgets without an entry, per breakpoint.
    pub fn missing_entries(&self) -> Vec<(BreakpointSize, String)> {
        let mut missing = Vec::new();
        for size in BreakpointSize::ALL {
            for widget in self.enabled_widgets() {
                if !self.layouts.contains(size, widget) {
                    missing.push((size, widget.to_string()));
                }
            }
        }
        missing
    }

    /// Drop duplicate `i` entries (first one wins) and place every enabled
    /// widget that has no entry. Returns true if the mode changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        for size in BreakpointSize::ALL {
            changed |= dedupe(self.layouts.get_mut(size));
        }

        let enabled: Vec<String> = self.enabled_widgets().map(str::to_string).collect();
        for widget in enabled {
            changed |= self.ensure_entry(&widget);
        }

        if changed {
            debug!("Mode layout repaired");
        }
        changed
    }
}

fn dedupe(entries: &mut Vec<LayoutEntry>) -> bool {
    let before = entries.len();
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(e.i.clone()));
    entries.len() != before
}
