//! Configuration schema types for the Marquee host.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod gui;
mod storage;
mod system;

pub use gui::*;
pub use storage::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration. Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarqueeConfig {
    pub gui: GuiConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub widgets: WidgetsConfig,
}
