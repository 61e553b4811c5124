//! Webview side of a namespaced event channel.

use std::sync::Arc;

use marquee_common::{ChannelFrame, EventBus, ListenerId, TransportError};
use serde_json::Value;
use tracing::{debug, warn};

/// The single connection a webview document holds back to the host.
pub trait HostLink: Send + Sync {
    fn post_message(&self, message: Value) -> Result<(), TransportError>;
}

/// Webview half of a channel. Attaching yields a [`WebviewClient`] and
/// announces the client to the host with an `ack` frame.
pub struct WebviewChannel {
    namespace: String,
}

impl WebviewChannel {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attach(&self, host: Arc<dyn HostLink>) -> WebviewClient {
        let client = WebviewClient {
            namespace: self.namespace.clone(),
            host,
            bus: Arc::new(EventBus::new(Some(self.namespace.clone()))),
        };
        client.send(ChannelFrame::Ack {
            namespace: self.namespace.clone(),
        });
        client
    }
}

#[derive(Clone)]
pub struct WebviewClient {
    namespace: String,
    host: Arc<dyn HostLink>,
    bus: Arc<EventBus>,
}

impl WebviewClient {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Send an event to the host. Transport failures are logged and dropped.
    pub fn emit(&self, event: &str, payload: Value) {
        self.send(ChannelFrame::event(&self.namespace, event, payload));
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.bus.on(event, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.bus.off(id)
    }

    pub fn remove_all_listeners(&self) {
        self.bus.remove_all_listeners();
    }

    /// Handle a frame the host sent on this client's namespace.
    ///
    /// `hello` is answered with `ack`; events run the local handlers.
    /// Frames for another namespace are ignored.
    pub fn handle_frame(&self, frame: &ChannelFrame) {
        if frame.namespace() != self.namespace {
            return;
        }
        match frame {
            ChannelFrame::Hello { .. } => self.send(ChannelFrame::Ack {
                namespace: self.namespace.clone(),
            }),
            ChannelFrame::Ack { .. } => {
                debug!(namespace = %self.namespace, "Ignoring ack from host");
            }
            ChannelFrame::Event { event, payload, .. } => {
                self.bus.emit(event, payload);
            }
        }
    }

    fn send(&self, frame: ChannelFrame) {
        if let Err(e) = self.host.post_message(frame.to_value()) {
            warn!(namespace = %self.namespace, error = %e, "Failed to post frame to host");
        }
    }
}
