//! Severity classification and filtering of reassembled log lines.
//!
//! ESP-IDF prefixes every log line with a level tag and millisecond timestamp
//! (`E (1234) component: message`). Classification is a fixed prefix test in
//! strict priority order; lines from other firmware formats fall through to
//! `Unknown`, which is always visible. The prefix table is one constant so a
//! future configurable policy has a single place to land.

use serde::{Deserialize, Serialize};

/// Severity tag derived from a line's leading characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Debug,
    Verbose,
    /// No recognized prefix. Never filtered.
    Unknown,
}

/// Prefix tests evaluated in this exact order against the line start.
const SEVERITY_PREFIXES: [(&str, Severity); 5] = [
    ("E (", Severity::Error),
    ("W (", Severity::Warning),
    ("I (", Severity::Info),
    ("D (", Severity::Debug),
    ("V (", Severity::Verbose),
];

impl Severity {
    /// Classify a trimmed, non-empty line.
    pub fn of_line(text: &str) -> Self {
        for (prefix, severity) in SEVERITY_PREFIXES {
            if text.starts_with(prefix) {
                return severity;
            }
        }
        Severity::Unknown
    }

    /// Fixed display color for this severity. Derived data stored on the log
    /// line so the classification policy has one source of truth.
    pub fn color(self) -> Color {
        match self {
            Severity::Error => Color::RED,
            Severity::Warning => Color::ORANGE,
            Severity::Info => Color::TEAL,
            Severity::Debug => Color::BLUE,
            Severity::Verbose => Color::PURPLE,
            Severity::Unknown => Color::BLACK,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Verbose => "verbose",
            Severity::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(0xFF, 0x00, 0x00);
    pub const ORANGE: Color = Color::rgb(0xFF, 0xA5, 0x00);
    pub const TEAL: Color = Color::rgb(0x2B, 0xAE, 0x85);
    pub const BLUE: Color = Color::rgb(0x00, 0x00, 0xFF);
    pub const PURPLE: Color = Color::rgb(0x80, 0x00, 0x80);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Operator-controlled visibility mask per severity.
///
/// Filtering is a set-membership test applied at ingest: a line whose flag is
/// off is dropped before storage, never indexed and never searchable. Unknown
/// lines are exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub error: bool,
    pub warning: bool,
    pub info: bool,
    pub debug: bool,
    pub verbose: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            error: true,
            warning: true,
            info: true,
            debug: true,
            verbose: true,
        }
    }
}

impl FilterSet {
    /// Whether lines of this severity pass the filter.
    pub fn is_visible(&self, severity: Severity) -> bool {
        match severity {
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Info => self.info,
            Severity::Debug => self.debug,
            Severity::Verbose => self.verbose,
            Severity::Unknown => true,
        }
    }

    /// Set the visibility flag for one severity. Unknown has no flag and the
    /// call is a no-op for it.
    pub fn set_visible(&mut self, severity: Severity, visible: bool) {
        match severity {
            Severity::Error => self.error = visible,
            Severity::Warning => self.warning = visible,
            Severity::Info => self.info = visible,
            Severity::Debug => self.debug = visible,
            Severity::Verbose => self.verbose = visible,
            Severity::Unknown => {}
        }
    }
}
