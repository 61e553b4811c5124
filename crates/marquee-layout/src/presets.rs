//! Modes available on first run.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::mode::{BreakpointSize, LayoutEntry, Layouts, Mode, ModeConfig, DEFAULT_MODE};

pub const PRESET_MODES: [&str; 4] = [DEFAULT_MODE, "play", "work", "project"];

pub const BUILTIN_WIDGETS: [&str; 12] = [
    "welcome",
    "todo",
    "weather",
    "github",
    "news",
    "snippets",
    "notes",
    "projects",
    "runme",
    "markdown",
    "npm-stats",
    "dependencies",
];

/// `(x, y, w, h)` for lg, md, sm, xs, xxs.
type Grid = [(u32, u32, u32, u32); 5];

const DEFAULT_GRID: &[(&str, Grid)] = &[
    ("welcome", [(0, 0, 4, 12), (0, 0, 3, 12), (0, 0, 3, 12), (0, 0, 2, 11), (0, 0, 4, 11)]),
    ("todo", [(8, 12, 4, 12), (6, 12, 4, 12), (3, 24, 3, 12), (0, 23, 4, 12), (0, 35, 4, 12)]),
    ("weather", [(8, 0, 4, 12), (7, 0, 3, 12), (3, 12, 3, 12), (2, 0, 2, 11), (0, 11, 4, 12)]),
    ("github", [(4, 12, 4, 12), (3, 12, 3, 12), (0, 24, 3, 12), (0, 74, 4, 12), (0, 86, 4, 12)]),
    ("news", [(0, 12, 4, 12), (0, 12, 3, 12), (0, 12, 3, 12), (0, 61, 4, 13), (0, 73, 4, 13)]),
    ("snippets", [(0, 24, 6, 13), (0, 24, 5, 13), (0, 36, 6, 13), (0, 35, 4, 13), (0, 47, 4, 13)]),
    ("notes", [(6, 24, 6, 13), (5, 24, 5, 13), (0, 49, 6, 13), (0, 48, 4, 13), (0, 60, 4, 13)]),
    ("projects", [(4, 0, 4, 12), (3, 0, 4, 12), (3, 0, 3, 12), (0, 11, 4, 12), (0, 23, 4, 12)]),
];

const PLAY_GRID: &[(&str, Grid)] = &[
    ("welcome", [(0, 0, 6, 14), (0, 0, 5, 12), (0, 0, 3, 11), (0, 0, 4, 13), (0, 0, 4, 13)]),
    ("weather", [(6, 0, 6, 14), (5, 0, 4, 12), (3, 0, 3, 11), (0, 13, 4, 11), (0, 13, 4, 11)]),
    ("github", [(0, 14, 6, 14), (0, 12, 5, 14), (0, 11, 3, 12), (0, 24, 4, 13), (0, 24, 4, 13)]),
    ("news", [(6, 14, 6, 14), (5, 12, 4, 14), (3, 11, 3, 12), (0, 37, 4, 13), (0, 37, 4, 13)]),
];

fn layouts_from(grid: &[(&str, Grid)]) -> Layouts {
    let mut layouts = Layouts::default();
    for (widget, rects) in grid {
        for (size, &(x, y, w, h)) in BreakpointSize::ALL.iter().zip(rects.iter()) {
            layouts.get_mut(*size).push(LayoutEntry::new(*widget, x, y, w, h));
        }
    }
    layouts
}

fn widget_map(enabled: &[&str], disabled: &[&str]) -> BTreeMap<String, bool> {
    enabled
        .iter()
        .map(|w| (w.to_string(), true))
        .chain(disabled.iter().map(|w| (w.to_string(), false)))
        .collect()
}

fn icon(id: &str, name: &str, native: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "short_names": [id],
        "colons": format!(":{id}:"),
        "native": native,
    })
}

/// Widgets enabled in a freshly added mode.
pub fn default_enabled_widgets() -> BTreeMap<String, bool> {
    widget_map(
        &["news", "github", "todo", "weather", "notes", "welcome", "snippets", "projects", "runme"],
        &[],
    )
}

/// Layout of a freshly added mode, with every default widget placed.
pub fn default_layouts() -> Layouts {
    let mut mode = Mode {
        layouts: layouts_from(DEFAULT_GRID),
        widgets: default_enabled_widgets(),
        icon: None,
    };
    mode.normalize();
    mode.layouts
}

/// The four built-in modes, normalised so every enabled widget is placed.
pub fn preset_modes() -> ModeConfig {
    let mut modes = ModeConfig::new();

    modes.insert(
        DEFAULT_MODE.to_string(),
        Mode {
            layouts: default_layouts(),
            widgets: default_enabled_widgets(),
            icon: None,
        },
    );
    modes.insert(
        "play".to_string(),
        Mode {
            layouts: layouts_from(PLAY_GRID),
            widgets: widget_map(
                &["news", "github", "weather", "welcome"],
                &["todo", "notes", "snippets", "projects", "runme"],
            ),
            icon: Some(icon("beach_with_umbrella", "Beach with Umbrella", "\u{1f3d6}\u{fe0f}")),
        },
    );
    modes.insert(
        "work".to_string(),
        Mode {
            layouts: Layouts::default(),
            widgets: widget_map(
                &["todo", "notes", "welcome", "snippets", "projects", "dependencies"],
                &["news", "github", "weather", "runme"],
            ),
            icon: Some(icon("briefcase", "Briefcase", "\u{1f4bc}")),
        },
    );
    modes.insert(
        "project".to_string(),
        Mode {
            layouts: Layouts::default(),
            widgets: widget_map(
                &["todo", "notes", "markdown", "snippets", "projects", "npm-stats"],
                &["news", "github", "weather", "welcome", "runme"],
            ),
            icon: Some(icon("rocket", "Rocket", "\u{1f680}")),
        },
    );

    for mode in modes.values_mut() {
        mode.normalize();
    }
    modes
}

/// Persisted modes made safe to use: the presets stand in for a missing or
/// empty set, `default` is always present, and every mode is normalised.
pub fn repair_modes(persisted: Option<ModeConfig>) -> ModeConfig {
    let mut modes = persisted
        .filter(|m| !m.is_empty())
        .unwrap_or_else(preset_modes);

    if !modes.contains_key(DEFAULT_MODE) {
        if let Some(default) = preset_modes().remove(DEFAULT_MODE) {
            modes.insert(DEFAULT_MODE.to_string(), default);
        }
    }
    for mode in modes.values_mut() {
        mode.normalize();
    }
    modes
}
