//! Report artifact scanner.
//!
//! Walks a report root and classifies entry documents by the shape of their
//! relative path:
//!
//! - `YYYY/MM/DD/<entry>` - daily report
//! - `YYYY/MM/<entry>` - monthly highlights
//! - `releases/<version>/<entry>` - release report
//! - `focus/<project>/<entry>` - focused test report
//!
//! Matchers are tried in a fixed priority order; the first one that accepts a
//! path wins. Paths that match nothing are skipped silently.

use crate::models::{ReportKind, ReportRecord, SortKey};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Default entry document name inside each report directory.
pub const DEFAULT_ENTRY: &str = "index.html";

/// Directory holding release reports (shared with the sync store default).
pub const RELEASES_DIR: &str = "releases";

/// Directory holding focused test reports.
pub const FOCUS_DIR: &str = "focus";

/// Value stored for a release date when the artifact could not be read.
pub const UNKNOWN_RELEASE_DATE: &str = "unknown";

/// Release-date marker embedded in release report pages.
const RELEASE_DATE_PATTERN: &str = r#"<span class="info-label">发布日期</span>\s*<span class="info-value">(\d{4}年\d{1,2}月\d{1,2}日)</span>"#;

/// Lowest possible version tuple; unparseable versions sort here.
const LOWEST_VERSION: [u64; 4] = [0, 0, 0, 0];

/// Classification of a relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathShape {
    Daily {
        year: String,
        month: String,
        day: String,
    },
    Monthly {
        year: String,
        month: String,
    },
    Release {
        version: String,
    },
    Focus {
        project: String,
    },
    Unrecognized,
}

type Matcher = fn(&[&str], &str) -> Option<PathShape>;

/// Matchers in priority order. Each is a pure predicate + extractor.
const MATCHERS: [Matcher; 4] = [match_daily, match_monthly, match_release, match_focus];

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn match_daily(segments: &[&str], entry: &str) -> Option<PathShape> {
    match segments {
        [year, month, day, file]
            if *file == entry && is_digits(year, 4) && is_digits(month, 2) && is_digits(day, 2) =>
        {
            Some(PathShape::Daily {
                year: year.to_string(),
                month: month.to_string(),
                day: day.to_string(),
            })
        }
        _ => None,
    }
}

fn match_monthly(segments: &[&str], entry: &str) -> Option<PathShape> {
    match segments {
        [year, month, file] if *file == entry && is_digits(year, 4) && is_digits(month, 2) => {
            Some(PathShape::Monthly {
                year: year.to_string(),
                month: month.to_string(),
            })
        }
        _ => None,
    }
}

fn match_release(segments: &[&str], entry: &str) -> Option<PathShape> {
    match segments {
        [dir, version, file] if *dir == RELEASES_DIR && *file == entry && !version.is_empty() => {
            Some(PathShape::Release {
                version: version.to_string(),
            })
        }
        _ => None,
    }
}

fn match_focus(segments: &[&str], entry: &str) -> Option<PathShape> {
    match segments {
        [dir, project, file] if *dir == FOCUS_DIR && *file == entry && !project.is_empty() => {
            Some(PathShape::Focus {
                project: project.to_string(),
            })
        }
        _ => None,
    }
}

/// Classify a `/`-separated path relative to the report root.
pub fn classify(rel_path: &str, entry: &str) -> PathShape {
    let segments: Vec<&str> = rel_path.split('/').collect();
    MATCHERS
        .iter()
        .find_map(|matcher| matcher(&segments, entry))
        .unwrap_or(PathShape::Unrecognized)
}

/// Parse a dotted version into a numeric tuple.
///
/// Any non-numeric component makes the whole version sort as the lowest
/// tuple `(0, 0, 0, 0)`. Short versions are right-padded with zeros to four
/// components so `1.0.16` and `1.0.16.0` compare equal.
pub fn parse_version(version: &str) -> Vec<u64> {
    let parsed: Option<Vec<u64>> = version
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect();

    match parsed {
        Some(mut parts) => {
            while parts.len() < LOWEST_VERSION.len() {
                parts.push(0);
            }
            parts
        }
        None => LOWEST_VERSION.to_vec(),
    }
}

/// Turn a project directory name into a display title.
///
/// `_` and `-` become spaces; each alphabetic run starts upper-case and
/// continues lower-case.
pub fn project_title(project: &str) -> String {
    let mut title = String::with_capacity(project.len());
    let mut prev_alpha = false;
    for ch in project.chars() {
        let ch = if ch == '_' || ch == '-' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if prev_alpha {
                title.extend(ch.to_lowercase());
            } else {
                title.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            title.push(ch);
            prev_alpha = false;
        }
    }
    title
}

fn release_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(RELEASE_DATE_PATTERN).expect("release date pattern is valid"))
}

/// Find the embedded release-date marker in a release page.
pub fn find_release_date(content: &str) -> Option<String> {
    release_date_regex()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Build a record for a classified path, inspecting release pages on disk.
fn build_record(root: &Path, rel_path: &str, shape: PathShape) -> Option<ReportRecord> {
    let mut extra = BTreeMap::new();
    let (kind, sort_key, title) = match shape {
        PathShape::Daily { year, month, day } => {
            let date = format!("{}-{}-{}", year, month, day);
            let title = format!("{} Daily Test Report", date);
            (ReportKind::Daily, SortKey::Date(date), title)
        }
        PathShape::Monthly { year, month } => {
            let date = format!("{}-{}", year, month);
            let title = format!("{} Monthly Highlights", date);
            (ReportKind::Monthly, SortKey::Date(date), title)
        }
        PathShape::Release { version } => {
            match fs::read_to_string(root.join(rel_path)) {
                Ok(content) => {
                    if let Some(date) = find_release_date(&content) {
                        extra.insert("release_date".to_string(), date);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = rel_path, error = %e, "could not inspect release report");
                    extra.insert(
                        "release_date".to_string(),
                        UNKNOWN_RELEASE_DATE.to_string(),
                    );
                }
            }
            let title = format!("Release {}", version);
            let key = SortKey::Version(parse_version(&version));
            extra.insert("version".to_string(), version);
            (ReportKind::Release, key, title)
        }
        PathShape::Focus { project } => {
            let title = format!("{} Focused Test Report", project_title(&project));
            extra.insert("project".to_string(), project.clone());
            (ReportKind::Focus, SortKey::Project(project), title)
        }
        PathShape::Unrecognized => return None,
    };

    Some(ReportRecord {
        path: rel_path.to_string(),
        kind,
        sort_key,
        title,
        extra,
    })
}

/// Scanned records grouped by kind, each group in navigation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub daily: Vec<ReportRecord>,
    pub monthly: Vec<ReportRecord>,
    pub releases: Vec<ReportRecord>,
    pub focus: Vec<ReportRecord>,
}

impl ScanReport {
    /// Records of one kind.
    pub fn of_kind(&self, kind: ReportKind) -> &[ReportRecord] {
        match kind {
            ReportKind::Daily => &self.daily,
            ReportKind::Monthly => &self.monthly,
            ReportKind::Release => &self.releases,
            ReportKind::Focus => &self.focus,
        }
    }

    fn of_kind_mut(&mut self, kind: ReportKind) -> &mut Vec<ReportRecord> {
        match kind {
            ReportKind::Daily => &mut self.daily,
            ReportKind::Monthly => &mut self.monthly,
            ReportKind::Release => &mut self.releases,
            ReportKind::Focus => &mut self.focus,
        }
    }

    /// All records, grouped in `ReportKind::ALL` order.
    pub fn all(&self) -> impl Iterator<Item = &ReportRecord> {
        ReportKind::ALL.into_iter().flat_map(|k| self.of_kind(k).iter())
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.daily.len() + self.monthly.len() + self.releases.len() + self.focus.len()
    }

    /// Whether no records were found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest daily report, if any.
    pub fn latest_daily(&self) -> Option<&ReportRecord> {
        self.daily.first()
    }

    fn push(&mut self, record: ReportRecord) {
        self.of_kind_mut(record.kind).push(record);
    }

    fn sort(&mut self) {
        for kind in ReportKind::ALL {
            self.of_kind_mut(kind).sort_by(|a, b| a.compare(b));
        }
    }
}

/// Scanner over a report root directory.
#[derive(Debug, Clone)]
pub struct Scanner {
    entry: String,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    /// Create a scanner matching the default entry document.
    pub fn new() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
        }
    }

    /// Match a different entry document name.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Scan `root` and return every recognized record, sorted per kind.
    ///
    /// A missing root yields an empty report. Unreadable directory entries
    /// are skipped.
    pub fn scan(&self, root: &Path) -> ScanReport {
        let mut report = ScanReport::default();

        // Daily paths are four segments deep, everything else three.
        let walker = WalkDir::new(root)
            .min_depth(3)
            .max_depth(4)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel_path) = relative_path(root, entry.path()) else {
                continue;
            };
            let shape = classify(&rel_path, &self.entry);
            if let Some(record) = build_record(root, &rel_path, shape) {
                report.push(record);
            }
        }

        report.sort();
        tracing::info!(
            daily = report.daily.len(),
            monthly = report.monthly.len(),
            releases = report.releases.len(),
            focus = report.focus.len(),
            "scan complete"
        );
        report
    }
}

/// Relative `/`-separated path of `path` under `root`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}
