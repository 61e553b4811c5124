use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::StateError;
use crate::protocol::RESERVED_KEYS;

/// A State or Configuration record: field name to JSON value.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Isolation key for one widget's State + Configuration pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a namespace name.
    ///
    /// Names are trimmed; empty names and the protocol's reserved envelope
    /// keys are rejected.
    pub fn new(name: impl AsRef<str>) -> Result<Self, StateError> {
        let name = name.as_ref().trim();
        if name.is_empty() || RESERVED_KEYS.contains(&name) {
            return Err(StateError::InvalidNamespace(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Namespace {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full State + Configuration of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceSnapshot {
    pub state: JsonMap,
    pub configuration: JsonMap,
}

impl NamespaceSnapshot {
    /// Flatten into one record, configuration fields winning on collision.
    pub fn merged(&self) -> JsonMap {
        let mut out = self.state.clone();
        for (k, v) in &self.configuration {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Every namespace's State + Configuration, keyed by namespace name.
pub type Snapshot = BTreeMap<String, NamespaceSnapshot>;

/// A teardown action returned by setup/subscribe style calls.
///
/// Dropping a `Disposable` does not run it; call [`Disposable::dispose`].
pub struct Disposable {
    action: Option<Box<dyn FnOnce() + Send>>,
}

impl Disposable {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    pub fn noop() -> Self {
        Self { action: None }
    }

    /// Combine several disposables; disposing the result disposes each in order.
    pub fn from_all(items: Vec<Disposable>) -> Self {
        Self::new(move || {
            for item in items {
                item.dispose();
            }
        })
    }

    pub fn dispose(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("pending", &self.action.is_some())
            .finish()
    }
}
