//! One webview document's side of the host connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use marquee_channel::{HostLink, WebviewChannel, WebviewClient};
use marquee_common::{
    BootstrapPayload, CommandRequest, EventBusRegistry, HostMessage, Snapshot, WebviewMessage,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::modes::{ModeProvider, GUI_NAMESPACE};
use crate::provider::{Provider, PERSISTENCE_EVENT, STATE_EVENT};

/// Dispatches everything the host sends to this document: state
/// broadcasts and persistence pushes go to the per-namespace buses that
/// providers listen on, channel frames go to the attached channel clients.
pub struct WebviewRuntime {
    host: Arc<dyn HostLink>,
    buses: EventBusRegistry,
    bootstrap: Mutex<BootstrapPayload>,
    clients: Mutex<HashMap<String, WebviewClient>>,
}

impl WebviewRuntime {
    pub fn new(host: Arc<dyn HostLink>, bootstrap: BootstrapPayload) -> Self {
        Self {
            host,
            buses: EventBusRegistry::new(),
            bootstrap: Mutex::new(bootstrap),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn buses(&self) -> &EventBusRegistry {
        &self.buses
    }

    pub fn bootstrap(&self) -> BootstrapPayload {
        self.bootstrap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tell the host the document finished loading.
    pub fn signal_ready(&self) {
        self.post(WebviewMessage::Ready(true));
    }

    pub fn mount(&self, namespace: &str) -> Provider {
        Provider::mount(namespace, &self.bootstrap(), Arc::clone(&self.host), &self.buses)
    }

    pub fn mode_provider(&self) -> ModeProvider {
        ModeProvider::new(self.mount(GUI_NAMESPACE))
    }

    /// Attach (or reuse) the channel client for `namespace`.
    pub fn channel(&self, namespace: &str) -> WebviewClient {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients
            .entry(namespace.to_string())
            .or_insert_with(|| WebviewChannel::new(namespace).attach(Arc::clone(&self.host)))
            .clone()
    }

    /// Ask the host to run commands on the document's behalf.
    pub fn exec_commands(&self, commands: Vec<CommandRequest>) {
        self.post(WebviewMessage::Commands(commands));
    }

    /// Handle one message from the host.
    pub fn handle_message(&self, message: &Value) {
        let parsed = match HostMessage::parse(message) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Dropping malformed host message");
                return;
            }
        };

        match parsed {
            HostMessage::State(envelope) => {
                for (namespace, partial) in envelope.iter() {
                    self.buses
                        .get(Some(namespace.as_str()))
                        .emit(STATE_EVENT, &Value::Object(partial.clone()));
                }
            }
            HostMessage::Persistence(snapshot) => self.push_snapshot(&snapshot),
            HostMessage::Channel(frame) => {
                let client = self
                    .clients
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(frame.namespace())
                    .cloned();
                match client {
                    Some(client) => client.handle_frame(&frame),
                    None => debug!(namespace = %frame.namespace(), "No channel client for frame"),
                }
            }
            HostMessage::Bootstrap(payload) => {
                debug!(namespaces = payload.snapshot.len(), "Bootstrap received");
                let snapshot = payload.snapshot.clone();
                *self.bootstrap.lock().unwrap_or_else(PoisonError::into_inner) = payload;
                self.push_snapshot(&snapshot);
            }
        }
    }

    fn push_snapshot(&self, snapshot: &Snapshot) {
        for (namespace, record) in snapshot {
            self.buses
                .get(Some(namespace.as_str()))
                .emit(PERSISTENCE_EVENT, &Value::Object(record.merged()));
        }
    }

    /// Detach every listener and channel client.
    pub fn teardown(&self) {
        for client in self
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, c)| c)
        {
            client.remove_all_listeners();
        }
        self.buses.clear();
    }

    fn post(&self, message: WebviewMessage) {
        if let Err(e) = self.host.post_message(message.to_value()) {
            warn!(error = %e, "Message not delivered to host");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_channel::MemoryEndpoint;
    use marquee_common::{ChannelFrame, EndpointId, NamespaceSnapshot};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn runtime() -> (WebviewRuntime, mpsc::UnboundedReceiver<Value>) {
        let (host, rx) = MemoryEndpoint::new(EndpointId::named("host"));
        (WebviewRuntime::new(host, BootstrapPayload::default()), rx)
    }

    #[test]
    fn signal_ready_posts_handshake() {
        let (rt, mut rx) = runtime();
        rt.signal_ready();
        assert_eq!(rx.try_recv().unwrap(), json!({ "ready": true }));
    }

    #[test]
    fn state_broadcast_reaches_mounted_provider() {
        let (rt, _rx) = runtime();
        let todo = rt.mount("widgets.todo");

        rt.handle_message(&json!({ "widgets.todo": { "todos": ["T1"] } }));
        assert_eq!(todo.get("todos"), json!(["T1"]));
    }

    #[test]
    fn persistence_push_merges_both_records() {
        let (rt, _rx) = runtime();
        let weather = rt.mount("widgets.weather");

        rt.handle_message(&json!({
            "persistence": {
                "widgets.weather": {
                    "state": { "forecast": [1] },
                    "configuration": { "scale": "C" }
                }
            }
        }));
        assert_eq!(weather.get("forecast"), json!([1]));
        assert_eq!(weather.get("scale"), json!("C"));
    }

    #[test]
    fn bootstrap_seeds_mounts() {
        let (rt, _rx) = runtime();
        let early = rt.mount("widgets.notes");
        let mut snapshot = Snapshot::new();
        let mut notes = NamespaceSnapshot::default();
        notes.state.insert("notes".into(), json!(["n"]));
        snapshot.insert("widgets.notes".into(), notes);

        rt.handle_message(
            &HostMessage::Bootstrap(BootstrapPayload {
                title: "Marquee".into(),
                snapshot,
                widget_scripts: Vec::new(),
            })
            .to_value(),
        );
        assert_eq!(early.get("notes"), json!(["n"]));
        assert_eq!(rt.mount("widgets.notes").get("notes"), json!(["n"]));
    }

    #[test]
    fn channel_frames_reach_the_client() {
        let (rt, mut rx) = runtime();
        let client = rt.channel("stateful.marquee");
        assert_eq!(rx.try_recv().unwrap()["channel"]["type"], "ack");

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        client.on("counter", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        rt.handle_message(&ChannelFrame::event("stateful.marquee", "counter", json!(2)).to_value());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // reuse does not attach twice
        rt.channel("stateful.marquee");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn exec_commands_uses_west_envelope() {
        let (rt, mut rx) = runtime();
        rt.exec_commands(vec![CommandRequest::new("marquee.open")]);
        assert_eq!(
            rx.try_recv().unwrap(),
            json!({ "west": { "execCommands": [{ "command": "marquee.open" }] } })
        );
    }

    #[test]
    fn malformed_message_is_ignored() {
        let (rt, _rx) = runtime();
        rt.handle_message(&json!(42));
        rt.handle_message(&json!({}));
    }

    #[test]
    fn teardown_detaches_providers() {
        let (rt, _rx) = runtime();
        let todo = rt.mount("widgets.todo");
        rt.teardown();

        rt.handle_message(&json!({ "widgets.todo": { "todos": ["late"] } }));
        assert_eq!(todo.get("todos"), Value::Null);
    }
}
