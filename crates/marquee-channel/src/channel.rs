//! Host side of a namespaced event channel.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use marquee_common::{
    ChannelFrame, EndpointId, EventBus, JsonMap, ListenerId, TransportError,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::endpoint::{Endpoint, EndpointSet};

struct ChannelInner {
    namespace: String,
    endpoints: EndpointSet,
    bus: EventBus,
    state: Mutex<JsonMap>,
    acked: Mutex<HashSet<EndpointId>>,
    /// Bumped on every ack.
    ack_tx: watch::Sender<u64>,
}

/// Hub for one namespace. Holds the attached endpoints, the latest value of
/// every event seen, and the handlers registered through its [`Client`]s.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Create a channel whose state starts from `defaults`.
    pub fn new(namespace: impl Into<String>, defaults: JsonMap) -> Self {
        let namespace = namespace.into();
        let (ack_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(ChannelInner {
                bus: EventBus::new(Some(namespace.clone())),
                namespace,
                endpoints: EndpointSet::new(),
                state: Mutex::new(defaults),
                acked: Mutex::new(HashSet::new()),
                ack_tx,
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Bind one endpoint and return a client immediately.
    pub fn attach(&self, endpoint: Arc<dyn Endpoint>) -> Client {
        debug!(namespace = %self.inner.namespace, endpoint = %endpoint.id(), "Channel attached");
        self.inner.endpoints.attach(endpoint);
        self.client()
    }

    /// Bind every endpoint and resolve once any of them acknowledges.
    ///
    /// Each endpoint receives a `hello` frame; the webview side answers with
    /// `ack`. Acks from earlier handshakes or other endpoints do not count.
    /// Dropping the returned future cancels the wait, leaving the endpoints
    /// attached.
    pub async fn register(&self, endpoints: Vec<Arc<dyn Endpoint>>) -> Result<Client, TransportError> {
        if endpoints.is_empty() {
            return Err(TransportError::NoEndpoints);
        }

        let mut ack_rx = self.inner.ack_tx.subscribe();
        let hello = ChannelFrame::Hello {
            namespace: self.inner.namespace.clone(),
        }
        .to_value();

        let ids: Vec<EndpointId> = endpoints.iter().map(|e| e.id().clone()).collect();
        {
            let mut acked = self.lock_acked();
            for id in &ids {
                acked.remove(id);
            }
        }

        for endpoint in endpoints {
            let id = endpoint.id().clone();
            self.inner.endpoints.attach(endpoint);
            self.inner.endpoints.send_to(&id, hello.clone());
        }

        let answered = ack_rx.wait_for(|_| {
            let acked = self.lock_acked();
            ids.iter().any(|id| acked.contains(id))
        });
        if answered.await.is_err() {
            // Sender lives as long as the channel itself
            return Err(TransportError::EndpointClosed(self.inner.namespace.clone()));
        }

        info!(namespace = %self.inner.namespace, "Channel registered");
        Ok(self.client())
    }

    /// [`Channel::register`] bounded by `timeout`.
    pub async fn register_with_timeout(
        &self,
        endpoints: Vec<Arc<dyn Endpoint>>,
        timeout: Duration,
    ) -> Result<Client, TransportError> {
        tokio::time::timeout(timeout, self.register(endpoints))
            .await
            .map_err(|_| TransportError::Timeout(timeout.as_millis() as u64))?
    }

    pub fn detach(&self, id: &EndpointId) -> bool {
        self.lock_acked().remove(id);
        self.inner.endpoints.detach(id)
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints.len()
    }

    pub fn is_acknowledged_by(&self, id: &EndpointId) -> bool {
        self.lock_acked().contains(id)
    }

    /// Process a frame that arrived from `origin`.
    ///
    /// Events update the channel state, run local handlers, and are relayed
    /// to every other attached endpoint.
    pub fn handle_frame(&self, origin: &EndpointId, frame: &ChannelFrame) {
        match frame {
            ChannelFrame::Ack { .. } => {
                self.lock_acked().insert(origin.clone());
                self.inner.ack_tx.send_modify(|count| *count += 1);
                debug!(namespace = %self.inner.namespace, endpoint = %origin, "Channel acknowledged");
            }
            ChannelFrame::Hello { .. } => {
                debug!(namespace = %self.inner.namespace, endpoint = %origin, "Ignoring hello from webview");
            }
            ChannelFrame::Event { event, payload, .. } => {
                self.record(event, payload);
                self.inner.bus.emit(event, payload);
                self.inner.endpoints.broadcast(&frame.to_value(), Some(origin));
            }
        }
    }

    /// Current value of every event seen so far, seeded from the defaults.
    pub fn state(&self) -> JsonMap {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn client(&self) -> Client {
        Client {
            inner: Arc::clone(&self.inner),
        }
    }

    fn record(&self, event: &str, payload: &Value) {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.to_string(), payload.clone());
    }

    fn lock_acked(&self) -> std::sync::MutexGuard<'_, HashSet<EndpointId>> {
        self.inner.acked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle used by host code to talk on a channel.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ChannelInner>,
}

impl Client {
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Send an event to every attached webview. Returns how many accepted it;
    /// delivery failures are dropped.
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.to_string(), payload.clone());

        let frame = ChannelFrame::event(&self.inner.namespace, event, payload);
        self.inner.endpoints.broadcast(&frame.to_value(), None)
    }

    /// Run `handler` for every event named `event` arriving from a webview.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.bus.on(event, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.bus.off(id)
    }

    pub fn remove_all_listeners(&self) {
        self.inner.bus.remove_all_listeners();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::MemoryEndpoint;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<Value>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(v) = rx.try_recv() {
            out.push(v);
        }
        out
    }

    #[test]
    fn client_emit_fans_out_to_all_endpoints() {
        let ch = Channel::new("vscode.marquee", JsonMap::new());
        let (a, mut rx_a) = MemoryEndpoint::new(EndpointId::named("a"));
        let (b, mut rx_b) = MemoryEndpoint::new(EndpointId::named("b"));
        let client = ch.attach(a);
        ch.attach(b);

        assert_eq!(client.emit("removeWidget", json!("news")), 2);

        let expected = ChannelFrame::event("vscode.marquee", "removeWidget", json!("news")).to_value();
        assert_eq!(drain(&mut rx_a), vec![expected.clone()]);
        assert_eq!(drain(&mut rx_b), vec![expected]);
    }

    #[test]
    fn emit_to_disposed_endpoint_is_a_noop() {
        let ch = Channel::new("ns", JsonMap::new());
        let (a, _rx) = MemoryEndpoint::new(EndpointId::named("a"));
        let client = ch.attach(a.clone());
        a.close();

        assert_eq!(client.emit("counter", json!(1)), 0);
        assert_eq!(ch.endpoint_count(), 0);
    }

    #[test]
    fn inbound_event_runs_handlers_and_relays_to_others() {
        let ch = Channel::new("stateful.marquee", JsonMap::new());
        let (a, mut rx_a) = MemoryEndpoint::new(EndpointId::named("a"));
        let (b, mut rx_b) = MemoryEndpoint::new(EndpointId::named("b"));
        let client = ch.attach(a);
        ch.attach(b);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        client.on("changeName", move |v| s.lock().unwrap().push(v.clone()));

        let frame = ChannelFrame::event("stateful.marquee", "changeName", json!("Bar"));
        ch.handle_frame(&EndpointId::named("a"), &frame);

        assert_eq!(*seen.lock().unwrap(), vec![json!("Bar")]);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![frame.to_value()]);
        assert_eq!(ch.state()["changeName"], json!("Bar"));
    }

    #[test]
    fn state_starts_from_defaults() {
        let mut defaults = JsonMap::new();
        defaults.insert("counter".into(), json!(0));
        let ch = Channel::new("ns", defaults);
        assert_eq!(ch.state()["counter"], json!(0));

        ch.client().emit("counter", json!(5));
        assert_eq!(ch.state()["counter"], json!(5));
    }

    #[tokio::test]
    async fn register_resolves_on_first_ack() {
        let ch = Channel::new("widgets.notes", JsonMap::new());
        let (a, mut rx_a) = MemoryEndpoint::new(EndpointId::named("a"));
        let (b, _rx_b) = MemoryEndpoint::new(EndpointId::named("b"));

        let hub = ch.clone();
        let acker = tokio::spawn(async move {
            let hello = rx_a.recv().await.unwrap();
            assert_eq!(hello["channel"]["type"], "hello");
            hub.handle_frame(
                &EndpointId::named("a"),
                &ChannelFrame::Ack {
                    namespace: "widgets.notes".into(),
                },
            );
        });

        let endpoints: Vec<Arc<dyn Endpoint>> = vec![a, b];
        let client = ch.register(endpoints).await.unwrap();
        acker.await.unwrap();

        assert_eq!(client.namespace(), "widgets.notes");
        assert!(ch.is_acknowledged_by(&EndpointId::named("a")));
        assert!(!ch.is_acknowledged_by(&EndpointId::named("b")));
        assert_eq!(ch.endpoint_count(), 2);
    }

    #[tokio::test]
    async fn register_without_endpoints_fails() {
        let ch = Channel::new("ns", JsonMap::new());
        let err = ch.register(Vec::new()).await.err().unwrap();
        assert!(matches!(err, TransportError::NoEndpoints));
    }

    #[tokio::test(start_paused = true)]
    async fn register_times_out_without_ack() {
        let ch = Channel::new("ns", JsonMap::new());
        let (a, _rx) = MemoryEndpoint::new(EndpointId::named("a"));

        let endpoints: Vec<Arc<dyn Endpoint>> = vec![a];
        let err = ch
            .register_with_timeout(endpoints, Duration::from_millis(500))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Timeout(500)));
    }

    #[test]
    fn detach_forgets_ack() {
        let ch = Channel::new("ns", JsonMap::new());
        let (a, _rx) = MemoryEndpoint::new(EndpointId::named("a"));
        ch.attach(a);
        ch.handle_frame(
            &EndpointId::named("a"),
            &ChannelFrame::Ack {
                namespace: "ns".into(),
            },
        );

        assert!(ch.detach(&EndpointId::named("a")));
        assert!(!ch.is_acknowledged_by(&EndpointId::named("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn register_after_detach_needs_a_fresh_ack() {
        let ch = Channel::new("widgets.notes", JsonMap::new());
        let (old, _rx_old) = MemoryEndpoint::new(EndpointId::named("old"));
        ch.attach(old);
        ch.handle_frame(
            &EndpointId::named("old"),
            &ChannelFrame::Ack {
                namespace: "widgets.notes".into(),
            },
        );
        ch.detach(&EndpointId::named("old"));

        let (fresh, _rx_fresh) = MemoryEndpoint::new(EndpointId::named("fresh"));
        let endpoints: Vec<Arc<dyn Endpoint>> = vec![fresh];
        let err = ch
            .register_with_timeout(endpoints, Duration::from_millis(500))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Timeout(500)));
        assert!(!ch.is_acknowledged_by(&EndpointId::named("fresh")));
    }

    #[tokio::test]
    async fn ack_from_another_endpoint_does_not_resolve_register() {
        let ch = Channel::new("widgets.notes", JsonMap::new());
        let (other, _rx_other) = MemoryEndpoint::new(EndpointId::named("other"));
        ch.attach(other);
        let (fresh, mut rx_fresh) = MemoryEndpoint::new(EndpointId::named("fresh"));

        let hub = ch.clone();
        let acker = tokio::spawn(async move {
            rx_fresh.recv().await.unwrap();
            let ack = ChannelFrame::Ack {
                namespace: "widgets.notes".into(),
            };
            hub.handle_frame(&EndpointId::named("other"), &ack);
            tokio::task::yield_now().await;
            hub.handle_frame(&EndpointId::named("fresh"), &ack);
        });

        let endpoints: Vec<Arc<dyn Endpoint>> = vec![fresh];
        ch.register(endpoints).await.unwrap();
        acker.await.unwrap();
        assert!(ch.is_acknowledged_by(&EndpointId::named("fresh")));
    }
}
