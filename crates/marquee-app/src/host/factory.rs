//! Panels whose webview is a browser tab that has yet to connect.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use marquee_common::WebviewError;
use marquee_webview::{BootstrapDocument, MemoryPanel, PanelFactory, PanelHandle, PanelPeer};
use tokio::sync::Notify;
use tracing::debug;

/// Creates in-memory panels and parks their webview end until a WebSocket
/// connection claims it. Only the newest panel can be claimed.
#[derive(Default)]
pub struct SocketPanelFactory {
    pending: Mutex<Option<PanelPeer>>,
    created: Notify,
}

impl SocketPanelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parked webview end, unless its panel was disposed meanwhile.
    pub fn take_pending(&self) -> Option<PanelPeer> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .filter(|peer| !*peer.disposed.borrow())
    }

    /// Wait up to `timeout` for a panel to be created and claim it.
    pub async fn wait_pending(&self, timeout: Duration) -> Option<PanelPeer> {
        let claim = async {
            loop {
                let created = self.created.notified();
                if let Some(peer) = self.take_pending() {
                    return peer;
                }
                created.await;
            }
        };
        tokio::time::timeout(timeout, claim).await.ok()
    }
}

impl PanelFactory for SocketPanelFactory {
    fn create(&self, document: &BootstrapDocument) -> Result<PanelHandle, WebviewError> {
        let (_panel, handle, peer) = MemoryPanel::open(document);
        let replaced = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(peer);
        if replaced.is_some() {
            debug!("Unclaimed panel replaced");
        }
        self.created.notify_waiters();
        Ok(handle)
    }
}
