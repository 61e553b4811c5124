//! Observable record cache, independent of any rendering framework.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use marquee_common::{Disposable, JsonMap};

type Listener = Arc<dyn Fn(&JsonMap) + Send + Sync>;

#[derive(Default)]
struct StoreInner {
    snapshot: Mutex<Arc<JsonMap>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// A record with change notification.
///
/// Snapshots are immutable `Arc`s: a new one is swapped in on every change,
/// so readers holding an old snapshot never see it mutate.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new(initial: JsonMap) -> Self {
        let store = Self::default();
        *store.lock_snapshot() = Arc::new(initial);
        store
    }

    pub fn get_snapshot(&self) -> Arc<JsonMap> {
        Arc::clone(&self.lock_snapshot())
    }

    /// Call `listener` with the new snapshot after every change.
    pub fn subscribe<F>(&self, listener: F) -> Disposable
    where
        F: Fn(&JsonMap) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, Arc::new(listener)));

        let inner = Arc::clone(&self.inner);
        Disposable::new(move || {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(lid, _)| *lid != id);
        })
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Last-writer-wins merge at field granularity. Fields absent from
    /// `partial` are untouched. Returns true if anything changed.
    pub fn merge(&self, partial: &JsonMap) -> bool {
        let next = {
            let mut snapshot = self.lock_snapshot();
            let changed = partial.iter().any(|(k, v)| snapshot.get(k) != Some(v));
            if !changed {
                return false;
            }
            let mut next = (**snapshot).clone();
            for (k, v) in partial {
                next.insert(k.clone(), v.clone());
            }
            let next = Arc::new(next);
            *snapshot = Arc::clone(&next);
            next
        };
        self.notify(&next);
        true
    }

    fn notify(&self, snapshot: &JsonMap) {
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn lock_snapshot(&self) -> std::sync::MutexGuard<'_, Arc<JsonMap>> {
        self.inner.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_keeps_other_fields() {
        let store = Store::new(map(json!({ "a": 1, "b": 2 })));
        assert!(store.merge(&map(json!({ "b": 3 }))));

        let snap = store.get_snapshot();
        assert_eq!(snap["a"], json!(1));
        assert_eq!(snap["b"], json!(3));
    }

    #[test]
    fn unchanged_merge_does_not_notify() {
        let store = Store::new(map(json!({ "a": 1 })));
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        let _sub = store.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.merge(&map(json!({ "a": 1 }))));
        assert!(store.merge(&map(json!({ "a": 2 }))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn old_snapshots_are_stable() {
        let store = Store::new(map(json!({ "a": 1 })));
        let before = store.get_snapshot();
        store.merge(&map(json!({ "a": 2 })));
        assert_eq!(before["a"], json!(1));
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = Store::default();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        let sub = store.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        store.merge(&map(json!({ "x": true })));
        sub.dispose();
        store.merge(&map(json!({ "x": false })));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_may_read_the_store() {
        let store = Store::default();
        let reader = store.clone();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        let _sub = store.subscribe(move |_| {
            *s.lock().unwrap() = reader.get_snapshot().get("k").cloned();
        });

        store.merge(&map(json!({ "k": "v" })));
        assert_eq!(*seen.lock().unwrap(), Some(json!("v")));
    }
}
