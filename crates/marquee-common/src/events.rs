//! In-process named-event bus.
//!
//! One bus per namespace (plus a global one) inside a single runtime: the
//! host process or one webview document. Dispatch is synchronous and
//! unbuffered, so a handler registered after an `emit` never sees it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

/// Handler invoked with the event payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Token returned by [`EventBus::on`], used to detach a single handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    event: String,
    handler: Handler,
}

pub struct EventBus {
    namespace: Option<String>,
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The namespace this bus is scoped to, `None` for the global bus.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Register a handler for `event`.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Listener {
            id,
            event: event.into(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Detach one handler. Returns false if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Call every handler currently registered for `event`, in registration
    /// order. Returns how many handlers ran.
    ///
    /// Handlers are snapshotted before dispatch, so a handler may register or
    /// remove listeners without deadlocking.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let handlers: Vec<Handler> = self
            .lock()
            .iter()
            .filter(|l| l.event == event)
            .map(|l| Arc::clone(&l.handler))
            .collect();

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Detach every handler on this bus.
    pub fn remove_all_listeners(&self) {
        self.lock().clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().iter().filter(|l| l.event == event).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("namespace", &self.namespace)
            .field("listeners", &self.lock().len())
            .finish()
    }
}

/// Owns one [`EventBus`] per namespace for a single runtime.
///
/// Created once per session and passed to whoever needs it; there is no
/// ambient global instance.
#[derive(Default)]
pub struct EventBusRegistry {
    buses: Mutex<HashMap<Option<String>, Arc<EventBus>>>,
}

impl EventBusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or lazily create) the bus for `namespace`; `None` is the global bus.
    pub fn get(&self, namespace: Option<&str>) -> Arc<EventBus> {
        let key = namespace.map(str::to_string);
        let mut buses = self.buses.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            buses
                .entry(key.clone())
                .or_insert_with(|| Arc::new(EventBus::new(key))),
        )
    }

    pub fn global(&self) -> Arc<EventBus> {
        self.get(None)
    }

    /// Detach every handler on every bus. Used when the runtime is torn down.
    pub fn clear(&self) {
        let buses = self.buses.lock().unwrap_or_else(PoisonError::into_inner);
        for bus in buses.values() {
            bus.remove_all_listeners();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emit_reaches_handlers_in_registration_order() {
        let bus = EventBus::new(Some("widgets.todo".into()));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.on("todos", move |_| seen.lock().unwrap().push(tag));
        }

        assert_eq!(bus.emit("todos", &json!([])), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn emit_only_matches_event_name() {
        let bus = EventBus::new(None);
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        bus.on("openSettings", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit("removeWidget", &json!("news")), 0);
        assert_eq!(bus.emit("openSettings", &Value::Null), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_handler_does_not_see_earlier_emit() {
        let bus = EventBus::new(None);
        bus.emit("counter", &json!(1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.on("counter", move |v| s.lock().unwrap().push(v.clone()));

        assert!(seen.lock().unwrap().is_empty());
        bus.emit("counter", &json!(2));
        assert_eq!(*seen.lock().unwrap(), vec![json!(2)]);
    }

    #[test]
    fn off_detaches_single_handler() {
        let bus = EventBus::new(None);
        let a = bus.on("x", |_| {});
        bus.on("x", |_| {});

        assert!(bus.off(a));
        assert!(!bus.off(a));
        assert_eq!(bus.listener_count("x"), 1);
    }

    #[test]
    fn remove_all_listeners_detaches_everything() {
        let bus = EventBus::new(None);
        bus.on("a", |_| {});
        bus.on("b", |_| {});
        bus.remove_all_listeners();

        assert_eq!(bus.emit("a", &Value::Null), 0);
        assert_eq!(bus.emit("b", &Value::Null), 0);
    }

    #[test]
    fn handler_may_register_during_emit() {
        let bus = Arc::new(EventBus::new(None));
        let inner = Arc::clone(&bus);
        bus.on("grow", move |_| {
            inner.on("grow", |_| {});
        });

        assert_eq!(bus.emit("grow", &Value::Null), 1);
        assert_eq!(bus.listener_count("grow"), 2);
    }

    #[test]
    fn registry_scopes_buses_by_namespace() {
        let registry = EventBusRegistry::new();
        let todo = registry.get(Some("widgets.todo"));
        let notes = registry.get(Some("widgets.notes"));

        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        todo.on("update", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        notes.emit("update", &Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        registry.get(Some("widgets.todo")).emit("update", &Value::Null);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&registry.global(), &registry.get(None)));
    }

    #[test]
    fn registry_clear_detaches_all_buses() {
        let registry = EventBusRegistry::new();
        registry.get(Some("a")).on("e", |_| {});
        registry.global().on("e", |_| {});
        registry.clear();

        assert_eq!(registry.get(Some("a")).listener_count("e"), 0);
        assert_eq!(registry.global().listener_count("e"), 0);
    }
}
