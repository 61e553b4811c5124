//! Third-party widget definitions for one webview session.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// What a third-party widget script declares about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThirdPartyWidget {
    /// Unique key, also the custom element name.
    pub name: String,
    #[serde(default)]
    pub icon: Value,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl ThirdPartyWidget {
    pub fn new(name: impl Into<String>, label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: Value::Null,
            label: label.into(),
            tags: Vec::new(),
            description: description.into(),
        }
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            "Unknown Widget"
        } else {
            &self.label
        }
    }
}

/// Widgets defined so far, plus the ones not yet merged into the modes.
///
/// Created once per webview session and handed to whatever reconciles
/// modes; dropping it ends the session's registrations.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    widgets: Vec<ThirdPartyWidget>,
    names: HashSet<String>,
    pending: Vec<ThirdPartyWidget>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a definition. Returns false for an empty or already known name.
    pub fn define_widget(&mut self, widget: ThirdPartyWidget) -> bool {
        if widget.name.trim().is_empty() {
            warn!("Ignoring widget definition without a name");
            return false;
        }
        if !self.names.insert(widget.name.clone()) {
            debug!(widget = %widget.name, "Widget already defined");
            return false;
        }

        debug!(widget = %widget.name, "Widget defined");
        self.pending.push(widget.clone());
        self.widgets.push(widget);
        true
    }

    /// Drain the current batch of definitions awaiting reconciliation.
    pub fn take_pending(&mut self) -> Vec<ThirdPartyWidget> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// All definitions, in registration order.
    pub fn widgets(&self) -> &[ThirdPartyWidget] {
        &self.widgets
    }

    pub fn get(&self, name: &str) -> Option<&ThirdPartyWidget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    /// Widget name to display label.
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.widgets
            .iter()
            .map(|w| (w.name.clone(), w.display_label().to_string()))
            .collect()
    }
}
