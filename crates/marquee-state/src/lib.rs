//! Host-side authoritative widget state.
//!
//! - [`StateManager`]: per-namespace State + Configuration records, persisted
//!   through a [`Storage`] backend and broadcast to every attached webview
//! - [`ExtensionManager`]: one widget's view of the manager, plus its channel
//! - [`WidgetApi`] / [`WidgetExtension`]: the capability a widget extension
//!   exports to get a channel to its webview code

pub mod extension;
pub mod manager;
pub mod storage;

pub use extension::{ExtensionManager, WidgetApi, WidgetExtension};
pub use manager::{StateChange, StateManager, Tier};
pub use storage::{FileStorage, MemoryStorage, Storage};
