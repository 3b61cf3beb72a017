//! Data models shared across almanac components.
//!
//! This module defines the core data structures:
//! - `ReportRecord` - A classified report artifact found by the scanner
//! - `SortKey` - Per-kind ordering key for report records
//! - `ReleaseEvent` - A dated occurrence of a version reaching an environment
//! - `BugStats` - Aggregate defect counts pulled from a metrics document
//! - `RemoteArtifact` - An entry listed by the remote release store

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Classification of a report artifact's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Daily,
    Monthly,
    Release,
    Focus,
}

impl ReportKind {
    /// All kinds, in the order navigation sections list them.
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Daily,
        ReportKind::Monthly,
        ReportKind::Release,
        ReportKind::Focus,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Daily => "daily",
            ReportKind::Monthly => "monthly",
            ReportKind::Release => "release",
            ReportKind::Focus => "focus",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordering key for a report record.
///
/// Keys are only compared within a single kind; see [`ReportRecord::compare`]
/// for the direction each kind sorts in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SortKey {
    /// `YYYY-MM-DD` or `YYYY-MM`; zero-padded so lexical order is chronological
    Date(String),
    /// Parsed numeric version components
    Version(Vec<u64>),
    /// Focus project name
    Project(String),
}

impl SortKey {
    /// Render the key the way it appears in exports.
    pub fn display(&self) -> String {
        match self {
            SortKey::Date(s) | SortKey::Project(s) => s.clone(),
            SortKey::Version(parts) => parts
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("."),
        }
    }
}

/// A classified report artifact.
///
/// Created fresh on every scan and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    /// Path relative to the scanned root, always `/`-separated
    pub path: String,

    /// Report classification
    pub kind: ReportKind,

    /// Ordering key within the kind
    pub sort_key: SortKey,

    /// Display title
    pub title: String,

    /// Kind-specific extra fields (`version`, `project`, `release_date`, ...)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ReportRecord {
    /// Compare two records of the same kind in navigation order.
    ///
    /// Daily and monthly records sort newest first, releases by descending
    /// version tuple, focus reports by ascending project name. Records of
    /// different kinds fall back to kind order.
    pub fn compare(&self, other: &Self) -> Ordering {
        if self.kind != other.kind {
            return self.kind.cmp(&other.kind);
        }
        match (&self.sort_key, &other.sort_key) {
            (SortKey::Date(a), SortKey::Date(b)) => b.cmp(a),
            (SortKey::Version(a), SortKey::Version(b)) => b.cmp(a),
            (SortKey::Project(a), SortKey::Project(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    /// Look up an extra field.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// Type of a release event on the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    #[default]
    Main,
    Branch,
    BranchStart,
    BranchMerge,
}

impl EventType {
    /// Parse from the wire form (`main`, `branch`, `branch-start`, `branch-merge`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(EventType::Main),
            "branch" => Some(EventType::Branch),
            "branch-start" => Some(EventType::BranchStart),
            "branch-merge" => Some(EventType::BranchMerge),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Main => "main",
            EventType::Branch => "branch",
            EventType::BranchStart => "branch-start",
            EventType::BranchMerge => "branch-merge",
        }
    }

    /// Whether events of this type sit on the main line.
    pub fn is_main_line(&self) -> bool {
        !matches!(self, EventType::Branch)
    }
}

/// A single dated occurrence of a version reaching an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
    /// Version string, possibly with a build suffix (e.g. `1.0.15(181)`)
    pub version: String,

    /// Release date
    pub date: NaiveDate,

    /// Event type; events without one are main-line points
    #[serde(rename = "type", default)]
    pub event_type: EventType,

    /// Free-form note (usually the release type label)
    #[serde(default)]
    pub note: String,

    /// Deployment environment label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl ReleaseEvent {
    /// Create a new event with an empty note.
    pub fn new(version: impl Into<String>, date: NaiveDate, event_type: EventType) -> Self {
        Self {
            version: version.into(),
            date,
            event_type,
            note: String::new(),
            environment: None,
        }
    }

    /// Set the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Numeric build suffix in parentheses (`1.0.15(181)` -> 181), or 0.
    pub fn build_number(&self) -> u64 {
        build_number(&self.version)
    }
}

/// Extract the first parenthesised run of digits from a version string.
pub fn build_number(version: &str) -> u64 {
    version
        .split('(')
        .skip(1)
        .filter_map(|chunk| chunk.split_once(')'))
        .map(|(digits, _)| digits)
        .find(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Aggregate defect counts pulled from a metrics document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugStats {
    /// Defects reported this month
    pub monthly_new: u64,

    /// Defects closed this month
    pub monthly_closed: u64,

    /// Valid defects, excluding the in-review sub-state
    pub total_valid: u64,

    /// Valid defects currently in review
    pub in_review: u64,
}

/// An entry listed by the remote release store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtifact {
    /// File name as listed remotely
    pub name: String,

    /// Version derived from the file name, if it follows the naming convention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
