//! What the controller needs from a webview panel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use marquee_channel::{Endpoint, MemoryEndpoint};
use marquee_common::{EndpointId, WebviewError};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::bootstrap::BootstrapDocument;

/// A visible webview surface.
pub trait Panel: Send + Sync {
    /// Bring the panel to the front without re-rendering it.
    fn reveal(&self);

    /// Destroy the panel. Later sends to its endpoint are dropped.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// A freshly created panel: the surface, the endpoint used to post to it,
/// and the queue of messages it posts back. The queue ends when the
/// webview goes away on its own.
pub struct PanelHandle {
    pub panel: Arc<dyn Panel>,
    pub endpoint: Arc<dyn Endpoint>,
    pub inbound: mpsc::UnboundedReceiver<Value>,
}

pub trait PanelFactory: Send + Sync {
    /// Create a panel seeded with `document`.
    fn create(&self, document: &BootstrapDocument) -> Result<PanelHandle, WebviewError>;
}

/// The webview's end of a [`MemoryPanel`].
pub struct PanelPeer {
    pub id: EndpointId,
    /// Messages the host posted, starting with the bootstrap frame.
    pub outbound: mpsc::UnboundedReceiver<Value>,
    /// Send here to post to the host.
    pub inbound: mpsc::UnboundedSender<Value>,
    /// Flips to true when the host disposes the panel.
    pub disposed: watch::Receiver<bool>,
}

/// In-process panel backed by unbounded queues.
pub struct MemoryPanel {
    endpoint: Arc<MemoryEndpoint>,
    disposed: watch::Sender<bool>,
    reveals: AtomicUsize,
}

impl MemoryPanel {
    /// Create a panel whose outbound queue already holds the bootstrap frame.
    pub fn open(document: &BootstrapDocument) -> (Arc<Self>, PanelHandle, PanelPeer) {
        let id = EndpointId::new();
        let (endpoint, outbound) = MemoryEndpoint::new(id.clone());
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (disposed, disposed_rx) = watch::channel(false);

        if let Err(e) = Endpoint::post_message(endpoint.as_ref(), document.to_message()) {
            debug!(endpoint = %id, error = %e, "Bootstrap not queued");
        }

        let panel = Arc::new(Self {
            endpoint: Arc::clone(&endpoint),
            disposed,
            reveals: AtomicUsize::new(0),
        });
        let handle = PanelHandle {
            panel: panel.clone(),
            endpoint,
            inbound: inbound_rx,
        };
        let peer = PanelPeer {
            id,
            outbound,
            inbound: inbound_tx,
            disposed: disposed_rx,
        };
        (panel, handle, peer)
    }

    pub fn id(&self) -> &EndpointId {
        self.endpoint.id()
    }

    pub fn reveal_count(&self) -> usize {
        self.reveals.load(Ordering::SeqCst)
    }
}

impl Panel for MemoryPanel {
    fn reveal(&self) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
        debug!(endpoint = %self.endpoint.id(), "Panel revealed");
    }

    fn dispose(&self) {
        self.endpoint.close();
        self.disposed.send_replace(true);
        debug!(endpoint = %self.endpoint.id(), "Panel disposed");
    }

    fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bootstrap_is_queued_first() {
        let document = BootstrapDocument::new("Marquee", Default::default(), Vec::new());
        let (_panel, handle, mut peer) = MemoryPanel::open(&document);

        handle.endpoint.post_message(json!({ "widgets.todo": {} })).unwrap();
        assert!(peer.outbound.try_recv().unwrap().get("bootstrap").is_some());
        assert_eq!(peer.outbound.try_recv().unwrap(), json!({ "widgets.todo": {} }));
    }

    #[test]
    fn dispose_closes_endpoint_and_signals_peer() {
        let (panel, handle, peer) = MemoryPanel::open(&BootstrapDocument::default());
        assert!(!panel.is_disposed());

        panel.dispose();
        assert!(panel.is_disposed());
        assert!(*peer.disposed.borrow());
        assert!(handle.endpoint.is_closed());
        assert!(handle.endpoint.post_message(json!(1)).is_err());
    }

    #[test]
    fn peer_messages_reach_the_handle() {
        let (panel, mut handle, peer) = MemoryPanel::open(&BootstrapDocument::default());
        peer.inbound.send(json!({ "ready": true })).unwrap();
        assert_eq!(handle.inbound.try_recv().unwrap(), json!({ "ready": true }));

        panel.reveal();
        assert_eq!(panel.reveal_count(), 1);
        assert_eq!(panel.id(), &peer.id);
    }
}
