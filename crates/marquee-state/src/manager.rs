//! Per-namespace authoritative store.
//!
//! Every mutation is merged into a copy of the current snapshot, written to
//! [`Storage`], and only then committed and broadcast. The merge and the write
//! happen under one lock, so interleaved updates to different fields of the
//! same namespace never lose each other and never observe a half-merged
//! record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use marquee_channel::{Endpoint, EndpointSet};
use marquee_common::{
    EndpointId, HostMessage, JsonMap, Namespace, NamespaceSnapshot, Snapshot, StateEnvelope,
    StateError,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::storage::Storage;

/// Which record of a namespace a field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    State,
    Configuration,
}

/// A committed change, published to in-process subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub namespace: String,
    pub tier: Tier,
    pub fields: JsonMap,
}

#[derive(Default)]
struct Records {
    current: Snapshot,
    defaults: HashMap<String, NamespaceSnapshot>,
}

impl Records {
    /// Defaults overlaid with whatever has been written.
    fn view(&self, namespace: &str) -> NamespaceSnapshot {
        let mut out = self.defaults.get(namespace).cloned().unwrap_or_default();
        if let Some(current) = self.current.get(namespace) {
            out.state
                .extend(current.state.iter().map(|(k, v)| (k.clone(), v.clone())));
            out.configuration
                .extend(current.configuration.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }

    fn is_configuration_field(&self, namespace: &str, field: &str) -> bool {
        let known = |snap: &NamespaceSnapshot| snap.configuration.contains_key(field);
        self.current.get(namespace).is_some_and(known)
            || self.defaults.get(namespace).is_some_and(known)
    }
}

pub struct StateManager {
    records: Mutex<Records>,
    storage: Arc<dyn Storage>,
    endpoints: EndpointSet,
    changes: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Load the persisted snapshot from `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self, StateError> {
        let current = storage.load()?.unwrap_or_default();
        info!(namespaces = current.len(), "State loaded");

        let (changes, _) = broadcast::channel(256);
        Ok(Self {
            records: Mutex::new(Records {
                current,
                defaults: HashMap::new(),
            }),
            storage,
            endpoints: EndpointSet::new(),
            changes,
        })
    }

    /// Declare a namespace's default records. Persisted values win over
    /// defaults; nothing is written.
    pub fn register(
        &self,
        namespace: &Namespace,
        default_state: JsonMap,
        default_configuration: JsonMap,
    ) -> NamespaceSnapshot {
        let mut records = self.lock();
        records.defaults.insert(
            namespace.to_string(),
            NamespaceSnapshot {
                state: default_state,
                configuration: default_configuration,
            },
        );
        debug!(namespace = %namespace, "Namespace registered");
        records.view(namespace.as_str())
    }

    pub fn get_state(&self, namespace: &str) -> JsonMap {
        self.lock().view(namespace).state
    }

    pub fn get_configuration(&self, namespace: &str) -> JsonMap {
        self.lock().view(namespace).configuration
    }

    /// One field, falling back to the declared default and then to `null`.
    pub fn get_field(&self, namespace: &str, tier: Tier, field: &str) -> Value {
        let view = self.lock().view(namespace);
        let record = match tier {
            Tier::State => view.state,
            Tier::Configuration => view.configuration,
        };
        record.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn update_state(&self, namespace: &str, field: &str, value: Value) -> Result<(), StateError> {
        self.update(namespace, Tier::State, field, value)
    }

    pub fn update_configuration(
        &self,
        namespace: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StateError> {
        self.update(namespace, Tier::Configuration, field, value)
    }

    fn update(&self, namespace: &str, tier: Tier, field: &str, value: Value) -> Result<(), StateError> {
        let namespace = Namespace::new(namespace)?;
        let mut fields = JsonMap::new();
        fields.insert(field.to_string(), value);

        let (state, configuration) = match tier {
            Tier::State => (fields, JsonMap::new()),
            Tier::Configuration => (JsonMap::new(), fields),
        };
        self.commit(namespace.as_str(), state, configuration)?;
        Ok(())
    }

    /// Apply a state message from a webview and relay it to every other
    /// endpoint. Returns how many namespaces were applied.
    ///
    /// Never fails: malformed messages and unwritable namespaces are logged
    /// and dropped.
    pub fn receive(&self, origin: Option<&EndpointId>, message: &Value) -> usize {
        match StateEnvelope::from_value(message) {
            Ok(envelope) => self.receive_envelope(origin, &envelope),
            Err(e) => {
                warn!(error = %e, "Dropping malformed state message");
                0
            }
        }
    }

    /// [`StateManager::receive`] for an already parsed envelope.
    pub fn receive_envelope(&self, origin: Option<&EndpointId>, envelope: &StateEnvelope) -> usize {
        let mut applied = StateEnvelope::new();

        for (namespace, partial) in envelope.iter() {
            if let Err(e) = Namespace::new(namespace) {
                warn!(error = %e, "Dropping state for invalid namespace");
                continue;
            }

            let (state, configuration) = {
                let records = self.lock();
                partial.iter().fold(
                    (JsonMap::new(), JsonMap::new()),
                    |(mut state, mut configuration), (field, value)| {
                        if records.is_configuration_field(namespace, field) {
                            configuration.insert(field.clone(), value.clone());
                        } else {
                            state.insert(field.clone(), value.clone());
                        }
                        (state, configuration)
                    },
                )
            };

            match self.persist(namespace, &state, &configuration) {
                Ok(()) => {
                    self.publish(namespace, state, configuration);
                    applied.insert_partial(namespace, partial.clone());
                }
                Err(e) => error!(namespace = %namespace, error = %e, "Failed to persist received state"),
            }
        }

        if applied.is_empty() {
            return 0;
        }

        let count = applied.iter().count();
        let relayed = self
            .endpoints
            .broadcast(&HostMessage::State(applied).to_value(), origin);
        debug!(namespaces = count, relayed, "State received");
        count
    }

    /// Every namespace's State + Configuration, defaults included.
    pub fn recover(&self) -> Snapshot {
        let records = self.lock();
        let mut names: Vec<&String> = records.current.keys().collect();
        names.extend(records.defaults.keys());
        names
            .into_iter()
            .map(|name| (name.clone(), records.view(name)))
            .collect()
    }

    /// The `{ persistence: ... }` message for a (re)connecting webview.
    pub fn persistence_message(&self) -> Value {
        HostMessage::Persistence(self.recover()).to_value()
    }

    /// Drop everything written for `namespace`; reads fall back to defaults.
    pub fn remove_namespace(&self, namespace: &str) -> Result<bool, StateError> {
        let removed = {
            let mut records = self.lock();
            if !records.current.contains_key(namespace) {
                return Ok(false);
            }
            let mut next = records.current.clone();
            next.remove(namespace);
            self.storage.store(&next)?;
            records.current = next;
            true
        };

        info!(namespace = %namespace, "Namespace reset");
        self.endpoints.broadcast(&self.persistence_message(), None);
        Ok(removed)
    }

    /// Forget every written value.
    pub fn clear(&self) -> Result<(), StateError> {
        {
            let mut records = self.lock();
            self.storage.store(&Snapshot::new())?;
            records.current.clear();
        }

        info!("All state cleared");
        self.endpoints.broadcast(&self.persistence_message(), None);
        Ok(())
    }

    pub fn attach_endpoint(&self, endpoint: Arc<dyn Endpoint>) {
        self.endpoints.attach(endpoint);
    }

    pub fn detach_endpoint(&self, id: &EndpointId) -> bool {
        self.endpoints.detach(id)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Committed changes, in commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Persist, publish and broadcast to every endpoint.
    fn commit(&self, namespace: &str, state: JsonMap, configuration: JsonMap) -> Result<(), StateError> {
        self.persist(namespace, &state, &configuration)?;

        let mut envelope = StateEnvelope::new();
        envelope.insert_partial(namespace, state.clone());
        envelope.insert_partial(namespace, configuration.clone());
        self.publish(namespace, state, configuration);
        self.endpoints
            .broadcast(&HostMessage::State(envelope).to_value(), None);
        Ok(())
    }

    /// Merge into a copy, write it, then swap it in.
    fn persist(&self, namespace: &str, state: &JsonMap, configuration: &JsonMap) -> Result<(), StateError> {
        let mut records = self.lock();
        let mut next = records.current.clone();
        let entry = next.entry(namespace.to_string()).or_default();
        for (k, v) in state {
            entry.state.insert(k.clone(), v.clone());
        }
        for (k, v) in configuration {
            entry.configuration.insert(k.clone(), v.clone());
        }

        self.storage.store(&next)?;
        records.current = next;
        Ok(())
    }

    fn publish(&self, namespace: &str, state: JsonMap, configuration: JsonMap) {
        for (tier, fields) in [(Tier::State, state), (Tier::Configuration, configuration)] {
            if fields.is_empty() {
                continue;
            }
            // No subscribers is fine
            let _ = self.changes.send(StateChange {
                namespace: namespace.to_string(),
                tier,
                fields,
            });
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
