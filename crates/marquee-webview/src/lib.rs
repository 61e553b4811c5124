//! Host side of the Marquee webview panel.
//!
//! Provides:
//! - [`GuiController`]: panel lifecycle, readiness handshake with additive
//!   backoff, periodic persistence push, inbound message routing
//! - [`Panel`] / [`PanelFactory`]: what the controller needs from a panel
//!   implementation, plus the in-process [`MemoryPanel`]
//! - [`CommandRegistry`]: host commands a webview may ask to run
//! - [`BootstrapDocument`]: the payload a panel is created with

pub mod bootstrap;
pub mod commands;
pub mod controller;
pub mod panel;

pub use bootstrap::BootstrapDocument;
pub use commands::CommandRegistry;
pub use controller::{ControllerOptions, GuiController, GuiState, GUI_CHANNEL};
pub use panel::{MemoryPanel, Panel, PanelFactory, PanelHandle, PanelPeer};
