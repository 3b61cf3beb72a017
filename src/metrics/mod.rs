//! Defect metrics extraction from the weekly bug summary document.
//!
//! The document is loosely structured markdown with:
//! - a narrative sentence carrying the monthly reported/closed counts
//! - a "valid bugs" pivot table (includes the in-review sub-state)
//! - a second pivot table that excludes the in-review sub-state
//!
//! Each table has a totals row whose last column is the overall count.
//! Every field is parsed independently; a field whose pattern is missing
//! contributes 0 and a warning, and the extractor always returns a complete
//! [`BugStats`].

use crate::models::BugStats;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Narrative sentence: "reported **N** bugs this month ... closed **M** bugs".
const MONTHLY_PATTERN: &str = r"本月总计新报\*\*(\d+)\*\*个Bug.*?总计关闭\*\*(\d+)\*\*个Bug";

/// Heading of the pivot table that includes in-review bugs.
pub const WITH_REVIEW_HEADING: &str = "### 有效Bug透视图";

/// Heading of the pivot table that excludes in-review bugs.
pub const WITHOUT_REVIEW_HEADING: &str = "### 不含In Review的有效Bug透视图";

/// Label of the totals row in both tables.
const TOTAL_ROW_LABEL: &str = "总数";

/// Marker that starts the next section.
const SECTION_MARKER: &str = "###";

fn monthly_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MONTHLY_PATTERN).expect("monthly pattern is valid"))
}

/// Monthly `(reported, closed)` counts from the narrative sentence.
pub fn find_monthly_counts(text: &str) -> Option<(u64, u64)> {
    let caps = monthly_regex().captures(text)?;
    let new = caps.get(1)?.as_str().parse().ok()?;
    let closed = caps.get(2)?.as_str().parse().ok()?;
    Some((new, closed))
}

/// Body of the section introduced by `heading`, up to the next heading.
pub fn find_section<'a>(text: &'a str, heading: &str) -> Option<&'a str> {
    let start = text.find(heading)? + heading.len();
    let body = &text[start..];
    let end = body.find(SECTION_MARKER).unwrap_or(body.len());
    Some(&body[..end])
}

/// Last column of the totals row of a markdown table.
pub fn find_total(section: &str) -> Option<u64> {
    section.lines().find_map(|line| {
        let line = line.trim();
        if !line.starts_with('|') {
            return None;
        }
        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        let label = cells.first()?.trim_matches('*');
        if label != TOTAL_ROW_LABEL || cells.len() < 2 {
            return None;
        }
        cells.last()?.trim_matches('*').parse().ok()
    })
}

fn section_total(text: &str, heading: &str) -> Option<u64> {
    let Some(section) = find_section(text, heading) else {
        tracing::warn!(heading, "metrics section not found");
        return None;
    };
    let total = find_total(section);
    if total.is_none() {
        tracing::warn!(heading, "totals row not found in metrics section");
    }
    total
}

/// Extract [`BugStats`] from a metrics document.
pub fn parse_bug_stats(text: &str) -> BugStats {
    let mut stats = BugStats::default();

    match find_monthly_counts(text) {
        Some((new, closed)) => {
            stats.monthly_new = new;
            stats.monthly_closed = closed;
        }
        None => tracing::warn!("monthly bug counts not found"),
    }

    let with_review = section_total(text, WITH_REVIEW_HEADING);
    let without_review = section_total(text, WITHOUT_REVIEW_HEADING);

    stats.total_valid = without_review.unwrap_or(0);
    if let (Some(with), Some(without)) = (with_review, without_review) {
        stats.in_review = match with.checked_sub(without) {
            Some(diff) => diff,
            None => {
                tracing::warn!(
                    with_review = with,
                    without_review = without,
                    "in-review total would be negative; clamping to 0"
                );
                0
            }
        };
    }

    tracing::info!(
        monthly_new = stats.monthly_new,
        monthly_closed = stats.monthly_closed,
        total_valid = stats.total_valid,
        in_review = stats.in_review,
        "extracted bug stats"
    );
    stats
}

/// Read a metrics document from disk and extract its stats.
///
/// A missing or unreadable file yields all-zero stats.
pub fn stats_from_file(path: &Path) -> BugStats {
    match fs::read_to_string(path) {
        Ok(text) => parse_bug_stats(&text),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read metrics document");
            BugStats::default()
        }
    }
}
