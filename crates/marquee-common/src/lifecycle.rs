use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Host-side lifecycle notifications for external collaborators
/// (tree views, widget extension managers, the binary's main loop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LifecycleEvent {
    WebviewOpen,
    WebviewClose,
    WebviewFailed { attempts: u32 },
    GuiOpenRequested,
    ModesReconciled { widgets: Vec<String> },
    Shutdown,
    #[serde(other)]
    Unknown,
}

pub struct LifecycleBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: LifecycleEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new(64)
    }
}
