//! The payload a panel is created with.
//!
//! A webview reads it once at startup, before its channel handshake, so
//! the first render already shows persisted state.

use marquee_common::{BootstrapPayload, HostMessage, Snapshot};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BootstrapDocument {
    pub title: String,
    pub snapshot: Snapshot,
    /// Scripts of widget extensions, loaded before the widgets render.
    pub widget_scripts: Vec<String>,
}

impl BootstrapDocument {
    pub fn new(title: impl Into<String>, snapshot: Snapshot, widget_scripts: Vec<String>) -> Self {
        Self {
            title: title.into(),
            snapshot,
            widget_scripts,
        }
    }

    pub fn payload(&self) -> BootstrapPayload {
        BootstrapPayload {
            title: self.title.clone(),
            snapshot: self.snapshot.clone(),
            widget_scripts: self.widget_scripts.clone(),
        }
    }

    /// The `{ bootstrap: ... }` frame for transports that carry messages only.
    pub fn to_message(&self) -> Value {
        HostMessage::Bootstrap(self.payload()).to_value()
    }

    /// Script assigning the payload to `window.marqueeBootstrap`, safe to
    /// inline in a `<script>` element.
    pub fn init_script(&self) -> String {
        let json = serde_json::to_string(&self.payload()).unwrap_or_else(|_| "{}".to_string());
        format!(
            "window.marqueeBootstrap = {};",
            json.replace("</", "<\\/")
        )
    }
}
