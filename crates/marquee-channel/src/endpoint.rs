//! Webview endpoints and host-side fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use marquee_common::{EndpointId, TransportError};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::webview::HostLink;

/// One live webview connection, as seen from the host.
///
/// `post_message` must preserve call order for a single endpoint.
pub trait Endpoint: Send + Sync {
    fn id(&self) -> &EndpointId;

    fn post_message(&self, message: Value) -> Result<(), TransportError>;

    fn is_closed(&self) -> bool {
        false
    }
}

/// The endpoints currently attached to one hub.
///
/// Cloning shares the same set.
#[derive(Clone, Default)]
pub struct EndpointSet {
    endpoints: Arc<Mutex<Vec<Arc<dyn Endpoint>>>>,
}

impl EndpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an endpoint, replacing any previous one with the same id.
    pub fn attach(&self, endpoint: Arc<dyn Endpoint>) {
        let mut endpoints = self.lock();
        endpoints.retain(|e| e.id() != endpoint.id());
        endpoints.push(endpoint);
    }

    pub fn detach(&self, id: &EndpointId) -> bool {
        let mut endpoints = self.lock();
        let before = endpoints.len();
        endpoints.retain(|e| e.id() != id);
        endpoints.len() != before
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.lock().iter().any(|e| e.id() == id)
    }

    pub fn ids(&self) -> Vec<EndpointId> {
        self.lock().iter().map(|e| e.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Send to one endpoint. Returns false if it is unknown or gone.
    pub fn send_to(&self, id: &EndpointId, message: Value) -> bool {
        let target = self.lock().iter().find(|e| e.id() == id).cloned();
        match target {
            Some(endpoint) => self.deliver(&endpoint, message),
            None => false,
        }
    }

    /// Send to every attached endpoint except `except`. Returns how many
    /// endpoints accepted the message.
    ///
    /// Endpoints that are closed or fail to accept are detached; the failure
    /// is never surfaced to the caller.
    pub fn broadcast(&self, message: &Value, except: Option<&EndpointId>) -> usize {
        let targets: Vec<Arc<dyn Endpoint>> = self
            .lock()
            .iter()
            .filter(|e| Some(e.id()) != except)
            .cloned()
            .collect();

        targets
            .iter()
            .filter(|endpoint| self.deliver(endpoint, message.clone()))
            .count()
    }

    fn deliver(&self, endpoint: &Arc<dyn Endpoint>, message: Value) -> bool {
        if endpoint.is_closed() {
            debug!(endpoint = %endpoint.id(), "Dropping message for closed endpoint");
            self.detach(endpoint.id());
            return false;
        }
        match endpoint.post_message(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(endpoint = %endpoint.id(), error = %e, "Dropping message, endpoint detached");
                self.detach(endpoint.id());
                false
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn Endpoint>>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process endpoint: messages are queued on an unbounded channel whose
/// receiver is held by the other side.
pub struct MemoryEndpoint {
    id: EndpointId,
    tx: mpsc::UnboundedSender<Value>,
    closed: AtomicBool,
}

impl MemoryEndpoint {
    pub fn new(id: EndpointId) -> (Arc<Self>, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let endpoint = Arc::new(Self {
            id,
            tx,
            closed: AtomicBool::new(false),
        });
        (endpoint, rx)
    }

    /// Mark the endpoint disposed; later sends are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Endpoint for MemoryEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }

    fn post_message(&self, message: Value) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::EndpointClosed(self.id.to_string()));
        }
        self.tx
            .send(message)
            .map_err(|_| TransportError::EndpointClosed(self.id.to_string()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

impl HostLink for MemoryEndpoint {
    fn post_message(&self, message: Value) -> Result<(), TransportError> {
        Endpoint::post_message(self, message)
    }
}
