//! Per-namespace mirror of host state inside a webview.

use std::sync::{Arc, Mutex, PoisonError};

use marquee_channel::HostLink;
use marquee_common::{
    BootstrapPayload, EventBus, EventBusRegistry, JsonMap, ListenerId, StateEnvelope, StateError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::Store;

/// Bus event carrying a partial record broadcast by the host.
pub const STATE_EVENT: &str = "state";
/// Bus event carrying a namespace's full record from a persistence push.
pub const PERSISTENCE_EVENT: &str = "persistence";

/// Mirrors one namespace's State + Configuration.
///
/// Setters update the local [`Store`] first, then tell the host. Inbound
/// broadcasts are merged field by field, so a remote update never clobbers
/// a local edit to a different field.
pub struct Provider {
    namespace: String,
    store: Store,
    host: Arc<dyn HostLink>,
    bus: Arc<EventBus>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl Provider {
    /// Seed from the bootstrap snapshot and start listening on the
    /// namespace's bus.
    pub fn mount(
        namespace: impl Into<String>,
        bootstrap: &BootstrapPayload,
        host: Arc<dyn HostLink>,
        buses: &EventBusRegistry,
    ) -> Self {
        let namespace = namespace.into();
        let seed = bootstrap
            .snapshot
            .get(&namespace)
            .map(|snap| snap.merged())
            .unwrap_or_default();

        let store = Store::new(seed);
        let bus = buses.get(Some(namespace.as_str()));

        let listeners = [STATE_EVENT, PERSISTENCE_EVENT]
            .into_iter()
            .map(|event| {
                let store = store.clone();
                bus.on(event, move |payload| {
                    if let Some(partial) = payload.as_object() {
                        store.merge(partial);
                    }
                })
            })
            .collect();

        debug!(namespace = %namespace, "Provider mounted");
        Self {
            namespace,
            store,
            host,
            bus,
            listeners: Mutex::new(listeners),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<JsonMap> {
        self.store.get_snapshot()
    }

    pub fn get(&self, field: &str) -> Value {
        self.store
            .get_snapshot()
            .get(field)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// A field decoded as `T`; `None` when absent or of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        let snapshot = self.store.get_snapshot();
        let value = snapshot.get(field)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set(&self, field: &str, value: Value) {
        let mut partial = JsonMap::new();
        partial.insert(field.to_string(), value);
        self.set_many(partial);
    }

    pub fn set_as<T: Serialize>(&self, field: &str, value: &T) -> Result<(), StateError> {
        let value = serde_json::to_value(value).map_err(|e| StateError::Serialize(e.to_string()))?;
        self.set(field, value);
        Ok(())
    }

    /// Apply several fields locally and send them to the host as one message.
    pub fn set_many(&self, partial: JsonMap) {
        self.store.merge(&partial);

        let mut envelope = StateEnvelope::new();
        envelope.insert_partial(&self.namespace, partial);
        if let Err(e) = self.host.post_message(envelope.to_value()) {
            warn!(namespace = %self.namespace, error = %e, "State update not delivered to host");
        }
    }

    /// Merge a partial record that came from the host.
    pub fn apply_remote(&self, partial: &JsonMap) -> bool {
        self.store.merge(partial)
    }

    /// Stop listening. The store keeps its last snapshot.
    pub fn unmount(&self) {
        let ids = std::mem::take(&mut *self.listeners.lock().unwrap_or_else(PoisonError::into_inner));
        for id in ids {
            self.bus.off(id);
        }
        debug!(namespace = %self.namespace, "Provider unmounted");
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.unmount();
    }
}
