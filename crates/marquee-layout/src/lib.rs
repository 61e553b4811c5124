//! Modes: named bundles of enabled widgets and per-breakpoint grid layouts.
//!
//! Third-party widgets register with the [`WidgetRegistry`] at any time;
//! [`reconcile`] merges each batch of new registrations into every existing
//! mode without touching user customisations.

pub mod mode;
pub mod presets;
pub mod reconcile;
pub mod registry;

pub use mode::{BreakpointSize, LayoutEntry, Layouts, Mode, ModeConfig, DEFAULT_MODE};
pub use presets::{
    default_enabled_widgets, default_layouts, preset_modes, repair_modes, BUILTIN_WIDGETS,
    PRESET_MODES,
};
pub use reconcile::{reconcile, third_party_entry};
pub use registry::{ThirdPartyWidget, WidgetRegistry};
