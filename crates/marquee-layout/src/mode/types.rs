//! Mode data model: breakpoints, layout entries, modes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The mode that always exists and can never be removed.
pub const DEFAULT_MODE: &str = "default";

/// Responsive grid width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointSize {
    Lg,
    Md,
    Sm,
    Xs,
    Xxs,
}

impl BreakpointSize {
    pub const ALL: [BreakpointSize; 5] = [
        BreakpointSize::Lg,
        BreakpointSize::Md,
        BreakpointSize::Sm,
        BreakpointSize::Xs,
        BreakpointSize::Xxs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BreakpointSize::Lg => "lg",
            BreakpointSize::Md => "md",
            BreakpointSize::Sm => "sm",
            BreakpointSize::Xs => "xs",
            BreakpointSize::Xxs => "xxs",
        }
    }
}

impl fmt::Display for BreakpointSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_min_w() -> u32 {
    3
}

fn default_min_h() -> u32 {
    12
}

/// One widget's rectangle on the grid of one breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    /// Widget name.
    pub i: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default = "default_min_w")]
    pub min_w: u32,
    #[serde(default = "default_min_h")]
    pub min_h: u32,
    #[serde(default)]
    pub moved: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl LayoutEntry {
    pub fn new(i: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            i: i.into(),
            x,
            y,
            w,
            h,
            min_w: default_min_w(),
            min_h: default_min_h(),
            moved: false,
            is_static: false,
        }
    }

    /// First row below this entry.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

/// One layout list per breakpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layouts {
    pub lg: Vec<LayoutEntry>,
    pub md: Vec<LayoutEntry>,
    pub sm: Vec<LayoutEntry>,
    pub xs: Vec<LayoutEntry>,
    pub xxs: Vec<LayoutEntry>,
}

impl Layouts {
    pub fn get(&self, size: BreakpointSize) -> &Vec<LayoutEntry> {
        match size {
            BreakpointSize::Lg => &self.lg,
            BreakpointSize::Md => &self.md,
            BreakpointSize::Sm => &self.sm,
            BreakpointSize::Xs => &self.xs,
            BreakpointSize::Xxs => &self.xxs,
        }
    }

    pub fn get_mut(&mut self, size: BreakpointSize) -> &mut Vec<LayoutEntry> {
        match size {
            BreakpointSize::Lg => &mut self.lg,
            BreakpointSize::Md => &mut self.md,
            BreakpointSize::Sm => &mut self.sm,
            BreakpointSize::Xs => &mut self.xs,
            BreakpointSize::Xxs => &mut self.xxs,
        }
    }

    pub fn contains(&self, size: BreakpointSize, widget: &str) -> bool {
        self.get(size).iter().any(|e| e.i == widget)
    }

    /// First free row at the bottom of a breakpoint's grid.
    pub fn bottom(&self, size: BreakpointSize) -> u32 {
        self.get(size).iter().map(LayoutEntry::bottom).max().unwrap_or(0)
    }
}

/// Widget enablement plus per-breakpoint layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    #[serde(default)]
    pub layouts: Layouts,
    #[serde(default)]
    pub widgets: BTreeMap<String, bool>,
    /// Emoji metadata chosen in the mode picker, stored as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
}

/// Every mode, keyed by lowercase name.
pub type ModeConfig = BTreeMap<String, Mode>;
