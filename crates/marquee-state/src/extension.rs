//! Widget extensions and their host-side managers.

use std::sync::{Arc, Mutex, PoisonError};

use marquee_channel::Client;
use marquee_common::{
    Disposable, JsonMap, LifecycleBus, LifecycleEvent, Namespace, NamespaceSnapshot, StateError,
};
use serde_json::Value;
use tracing::{debug, error};

use crate::manager::StateManager;

/// What a widget extension exports to get a channel to its webview code.
pub trait WidgetApi: Send + Sync {
    fn default_state(&self) -> JsonMap;

    fn default_configuration(&self) -> JsonMap;

    /// Called once the widget's channel is acknowledged by a webview.
    fn setup(&self, client: Client) -> Option<Disposable>;
}

/// An installed extension that contributes a widget.
#[derive(Clone)]
pub struct WidgetExtension {
    /// Extension identifier, also its channel namespace.
    pub id: String,
    /// Script the webview loads to define the widget element.
    pub widget_script: Option<String>,
    pub active: bool,
    pub api: Option<Arc<dyn WidgetApi>>,
}

impl WidgetExtension {
    /// The exported API, if the extension is active and has one.
    pub fn channel_api(&self) -> Option<&Arc<dyn WidgetApi>> {
        if self.active {
            self.api.as_ref()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for WidgetExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetExtension")
            .field("id", &self.id)
            .field("widget_script", &self.widget_script)
            .field("active", &self.active)
            .field("api", &self.api.is_some())
            .finish()
    }
}

/// One widget's slice of the [`StateManager`], plus the channel client
/// that talks to its webview code.
pub struct ExtensionManager {
    namespace: Namespace,
    manager: Arc<StateManager>,
    lifecycle: Arc<LifecycleBus>,
    defaults: NamespaceSnapshot,
    broadcaster: Mutex<Option<Client>>,
}

impl ExtensionManager {
    pub fn new(
        namespace: Namespace,
        manager: Arc<StateManager>,
        lifecycle: Arc<LifecycleBus>,
        default_state: JsonMap,
        default_configuration: JsonMap,
    ) -> Self {
        manager.register(&namespace, default_state.clone(), default_configuration.clone());
        Self {
            namespace,
            manager,
            lifecycle,
            defaults: NamespaceSnapshot {
                state: default_state,
                configuration: default_configuration,
            },
            broadcaster: Mutex::new(None),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn state(&self) -> JsonMap {
        self.manager.get_state(self.namespace.as_str())
    }

    pub fn configuration(&self) -> JsonMap {
        self.manager.get_configuration(self.namespace.as_str())
    }

    pub fn update_state(&self, field: &str, value: Value) -> Result<(), StateError> {
        self.manager
            .update_state(self.namespace.as_str(), field, value)
    }

    pub fn update_configuration(&self, field: &str, value: Value) -> Result<(), StateError> {
        self.manager
            .update_configuration(self.namespace.as_str(), field, value)
    }

    /// Push fields to the widget's webview code, one event per field.
    /// Returns 0 until a channel is bound.
    pub fn broadcast(&self, partial: JsonMap) -> usize {
        let Some(client) = self.client() else {
            debug!(namespace = %self.namespace, "No channel bound yet, broadcast dropped");
            return 0;
        };
        partial
            .into_iter()
            .map(|(field, value)| client.emit(&field, value))
            .sum()
    }

    /// Bind the channel client. Every declared field becomes an inbound
    /// event that writes through to the State Manager.
    pub fn set_broadcaster(&self, client: Client) -> Disposable {
        let fields = self
            .defaults
            .state
            .keys()
            .map(|k| (k.clone(), false))
            .chain(self.defaults.configuration.keys().map(|k| (k.clone(), true)));

        let mut listeners = Vec::new();
        for (field, is_configuration) in fields {
            let manager = Arc::clone(&self.manager);
            let namespace = self.namespace.to_string();
            let name = field.clone();
            let id = client.on(field, move |value| {
                let result = if is_configuration {
                    manager.update_configuration(&namespace, &name, value.clone())
                } else {
                    manager.update_state(&namespace, &name, value.clone())
                };
                if let Err(e) = result {
                    error!(namespace = %namespace, field = %name, error = %e, "Failed to apply widget update");
                }
            });
            listeners.push(id);
        }

        *self.broadcaster.lock().unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
        debug!(namespace = %self.namespace, fields = listeners.len(), "Broadcaster bound");

        Disposable::new(move || {
            for id in listeners {
                client.off(id);
            }
        })
    }

    /// Ask the host to open (or reveal) the Marquee panel.
    pub fn request_open(&self) -> usize {
        self.lifecycle.publish(LifecycleEvent::GuiOpenRequested)
    }

    fn client(&self) -> Option<Client> {
        self.broadcaster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WidgetApi for ExtensionManager {
    fn default_state(&self) -> JsonMap {
        self.defaults.state.clone()
    }

    fn default_configuration(&self) -> JsonMap {
        self.defaults.configuration.clone()
    }

    fn setup(&self, client: Client) -> Option<Disposable> {
        Some(self.set_broadcaster(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use marquee_channel::{Channel, MemoryEndpoint};
    use marquee_common::{ChannelFrame, EndpointId};
    use serde_json::json;

    fn notes_manager() -> (ExtensionManager, Arc<StateManager>, Arc<LifecycleBus>) {
        let state = Arc::new(StateManager::new(Arc::new(MemoryStorage::new())).unwrap());
        let lifecycle = Arc::new(LifecycleBus::default());
        let ext = ExtensionManager::new(
            Namespace::new("widgets.notes").unwrap(),
            Arc::clone(&state),
            Arc::clone(&lifecycle),
            json!({ "notes": [] }).as_object().cloned().unwrap(),
            json!({ "sortBy": "date" }).as_object().cloned().unwrap(),
        );
        (ext, state, lifecycle)
    }

    #[test]
    fn new_registers_defaults() {
        let (ext, state, _) = notes_manager();
        assert_eq!(ext.state()["notes"], json!([]));
        assert_eq!(state.get_configuration("widgets.notes")["sortBy"], "date");
    }

    #[test]
    fn broadcast_without_channel_is_dropped() {
        let (ext, _, _) = notes_manager();
        let partial = json!({ "notes": [1] }).as_object().cloned().unwrap();
        assert_eq!(ext.broadcast(partial), 0);
    }

    #[test]
    fn inbound_channel_events_write_through() {
        let (ext, state, _) = notes_manager();
        let channel = Channel::new("widgets.notes", JsonMap::new());
        let (panel, mut rx) = MemoryEndpoint::new(EndpointId::named("panel"));
        let client = channel.attach(panel);

        let disposable = ext.setup(client).unwrap();

        channel.handle_frame(
            &EndpointId::named("panel"),
            &ChannelFrame::event("widgets.notes", "sortBy", json!("title")),
        );
        channel.handle_frame(
            &EndpointId::named("panel"),
            &ChannelFrame::event("widgets.notes", "notes", json!(["n1"])),
        );
        assert_eq!(state.get_configuration("widgets.notes")["sortBy"], "title");
        assert_eq!(state.get_state("widgets.notes")["notes"], json!(["n1"]));

        let partial = json!({ "notes": ["n2"] }).as_object().cloned().unwrap();
        assert_eq!(ext.broadcast(partial), 1);
        assert_eq!(rx.try_recv().unwrap()["channel"]["event"], "notes");

        disposable.dispose();
        channel.handle_frame(
            &EndpointId::named("panel"),
            &ChannelFrame::event("widgets.notes", "notes", json!(["late"])),
        );
        assert_eq!(state.get_state("widgets.notes")["notes"], json!(["n1"]));
    }

    #[tokio::test]
    async fn request_open_publishes_lifecycle_event() {
        let (ext, _, lifecycle) = notes_manager();
        let mut rx = lifecycle.subscribe();
        assert_eq!(ext.request_open(), 1);
        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::GuiOpenRequested);
    }

    #[test]
    fn inactive_extension_exposes_no_api() {
        let (ext, _, _) = notes_manager();
        let mut extension = WidgetExtension {
            id: "widgets.notes".into(),
            widget_script: None,
            active: false,
            api: Some(Arc::new(ext)),
        };
        assert!(extension.channel_api().is_none());
        extension.active = true;
        assert!(extension.channel_api().is_some());
    }
}
