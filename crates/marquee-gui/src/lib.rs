//! Webview-side state layer.
//!
//! A [`WebviewRuntime`] owns one document's connection to the host. Each
//! widget mounts a [`Provider`] that mirrors its namespace into a [`Store`];
//! the [`ModeProvider`] adds the mode operations on top of the GUI's own
//! namespace.

pub mod modes;
pub mod provider;
pub mod runtime;
pub mod store;

pub use modes::{ModeProvider, GUI_NAMESPACE};
pub use provider::{Provider, PERSISTENCE_EVENT, STATE_EVENT};
pub use runtime::WebviewRuntime;
pub use store::Store;
