//! Aggregation of scanned records into navigation and export documents.
//!
//! `write_index` produces, under the report root:
//! - `index.json`: navigation document (cards with display meta)
//! - `api/pages.json`: every record
//! - `api/pages-by-kind.json`: records grouped by kind
//! - `api/summary.json`: counts and the latest daily report
//! - `api/pages-no-release.json`: every record except release reports

use crate::models::{ReportKind, ReportRecord, SortKey};
use crate::scanner::{ScanReport, UNKNOWN_RELEASE_DATE};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Navigation document file name.
pub const INDEX_FILE: &str = "index.json";

/// Directory holding the export documents.
pub const API_DIR: &str = "api";

pub const PAGES_FILE: &str = "pages.json";
pub const PAGES_BY_KIND_FILE: &str = "pages-by-kind.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const PAGES_NO_RELEASE_FILE: &str = "pages-no-release.json";

/// Daily reports shown on the navigation page.
pub const DAILY_LIMIT: usize = 12;

/// A navigation card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub title: String,
    pub path: String,
    pub meta: String,
}

impl Card {
    pub fn new(record: &ReportRecord, today: NaiveDate) -> Self {
        Self {
            title: record.title.clone(),
            path: record.path.clone(),
            meta: card_meta(record, today),
        }
    }
}

/// Record counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub daily: usize,
    pub monthly: usize,
    pub releases: usize,
    pub focus: usize,
}

impl Counts {
    pub fn of(report: &ScanReport) -> Self {
        Self {
            daily: report.daily.len(),
            monthly: report.monthly.len(),
            releases: report.releases.len(),
            focus: report.focus.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.daily + self.monthly + self.releases + self.focus
    }
}

/// The navigation document written to `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Navigation {
    pub generated_on: NaiveDate,
    pub stats: Counts,
    pub latest_daily: Option<Card>,
    /// Newest daily reports, at most [`DAILY_LIMIT`]
    pub daily: Vec<Card>,
    /// Number of daily reports before truncation
    pub daily_total: usize,
    pub monthly: Vec<Card>,
    pub releases: Vec<Card>,
    pub focus: Vec<Card>,
}

/// The `summary.json` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub generated_on: NaiveDate,
    pub total: usize,
    pub by_kind: Counts,
    pub latest_daily: Option<String>,
}

/// Files written by [`write_index`], relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WrittenIndex {
    pub files: Vec<String>,
    pub records: usize,
}

/// Human "age" of a date relative to `today`.
fn age(date: NaiveDate, today: NaiveDate, shown: &str) -> String {
    match (today - date).num_days() {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        days @ 2..=6 => format!("{} days ago", days),
        days @ 7..=29 => match days / 7 {
            1 => "1 week ago".to_string(),
            weeks => format!("{} weeks ago", weeks),
        },
        _ => format!("published {}", shown),
    }
}

fn parse_key_date(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d"))
        .ok()
}

/// Display meta line for a record's navigation card.
pub fn card_meta(record: &ReportRecord, today: NaiveDate) -> String {
    match record.kind {
        ReportKind::Daily | ReportKind::Monthly => {
            let key = match &record.sort_key {
                SortKey::Date(key) => key.clone(),
                other => other.display(),
            };
            match parse_key_date(&key) {
                Some(date) => age(date, today, &key),
                None => format!("published {}", key),
            }
        }
        ReportKind::Release => match record.extra("release_date") {
            Some(date) if date != UNKNOWN_RELEASE_DATE => format!("released {}", date),
            _ => format!(
                "Version {} - features and fixes",
                record.extra("version").unwrap_or_default()
            ),
        },
        ReportKind::Focus => format!(
            "{} focused test report",
            record.extra("project").unwrap_or_default()
        ),
    }
}

fn cards(records: &[ReportRecord], today: NaiveDate) -> Vec<Card> {
    records.iter().map(|r| Card::new(r, today)).collect()
}

/// Build the navigation document.
pub fn navigation(report: &ScanReport, today: NaiveDate) -> Navigation {
    let shown = report.daily.len().min(DAILY_LIMIT);
    Navigation {
        generated_on: today,
        stats: Counts::of(report),
        latest_daily: report.latest_daily().map(|r| Card::new(r, today)),
        daily: cards(&report.daily[..shown], today),
        daily_total: report.daily.len(),
        monthly: cards(&report.monthly, today),
        releases: cards(&report.releases, today),
        focus: cards(&report.focus, today),
    }
}

/// All records, kinds in navigation order.
pub fn pages(report: &ScanReport) -> Vec<&ReportRecord> {
    report.all().collect()
}

/// Records grouped by kind name.
pub fn pages_by_kind(report: &ScanReport) -> BTreeMap<&'static str, &[ReportRecord]> {
    ReportKind::ALL
        .into_iter()
        .map(|kind| (kind.as_str(), report.of_kind(kind)))
        .collect()
}

/// Every record except release reports.
pub fn pages_without_releases(report: &ScanReport) -> Vec<&ReportRecord> {
    report
        .all()
        .filter(|r| r.kind != ReportKind::Release)
        .collect()
}

pub fn summary(report: &ScanReport, today: NaiveDate) -> Summary {
    let by_kind = Counts::of(report);
    Summary {
        generated_on: today,
        total: by_kind.total(),
        by_kind,
        latest_daily: report.latest_daily().map(|r| r.path.clone()),
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> crate::Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    tracing::info!(path = %path.display(), "wrote export document");
    Ok(())
}

/// Write the navigation and export documents under `root`.
///
/// Files already written stay in place if a later write fails.
pub fn write_index(root: &Path, report: &ScanReport, today: NaiveDate) -> crate::Result<WrittenIndex> {
    let api_dir = root.join(API_DIR);
    fs::create_dir_all(&api_dir)?;

    let mut written = WrittenIndex {
        files: Vec::new(),
        records: report.len(),
    };
    let mut record = |path: PathBuf| {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        written.files.push(rel);
    };

    let index_path = root.join(INDEX_FILE);
    write_json(&index_path, &navigation(report, today))?;
    record(index_path);

    let pages_path = api_dir.join(PAGES_FILE);
    write_json(&pages_path, &pages(report))?;
    record(pages_path);

    let by_kind_path = api_dir.join(PAGES_BY_KIND_FILE);
    write_json(&by_kind_path, &pages_by_kind(report))?;
    record(by_kind_path);

    let summary_path = api_dir.join(SUMMARY_FILE);
    write_json(&summary_path, &summary(report, today))?;
    record(summary_path);

    let no_release_path = api_dir.join(PAGES_NO_RELEASE_FILE);
    write_json(&no_release_path, &pages_without_releases(report))?;
    record(no_release_path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;
    use crate::test_utils::write_file;
    use tempfile::TempDir;

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    fn daily(key: &str) -> ReportRecord {
        ReportRecord {
            path: format!("{}/index.html", key.replace('-', "/")),
            kind: ReportKind::Daily,
            sort_key: SortKey::Date(key.to_string()),
            title: format!("{} Daily Test Report", key),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_daily_meta_ages() {
        let today = date("2025-03-20");
        assert_eq!(card_meta(&daily("2025-03-20"), today), "today");
        assert_eq!(card_meta(&daily("2025-03-19"), today), "yesterday");
        assert_eq!(card_meta(&daily("2025-03-15"), today), "5 days ago");
        assert_eq!(card_meta(&daily("2025-03-12"), today), "1 week ago");
        assert_eq!(card_meta(&daily("2025-02-25"), today), "3 weeks ago");
        assert_eq!(
            card_meta(&daily("2025-01-02"), today),
            "published 2025-01-02"
        );
        assert_eq!(
            card_meta(&daily("2025-03-25"), today),
            "published 2025-03-25"
        );
    }

    #[test]
    fn test_monthly_meta_uses_first_of_month() {
        let mut record = daily("2025-03");
        record.kind = ReportKind::Monthly;
        assert_eq!(card_meta(&record, date("2025-03-03")), "2 days ago");
        assert_eq!(card_meta(&record, date("2025-05-03")), "published 2025-03");
    }

    #[test]
    fn test_release_and_focus_meta() {
        let mut extra = BTreeMap::new();
        extra.insert("version".to_string(), "1.0.16".to_string());
        let mut release = ReportRecord {
            path: "releases/1.0.16/index.html".to_string(),
            kind: ReportKind::Release,
            sort_key: SortKey::Version(vec![1, 0, 16, 0]),
            title: "Release 1.0.16".to_string(),
            extra,
        };
        let today = date("2025-03-20");
        assert_eq!(
            card_meta(&release, today),
            "Version 1.0.16 - features and fixes"
        );

        release
            .extra
            .insert("release_date".to_string(), UNKNOWN_RELEASE_DATE.to_string());
        assert_eq!(
            card_meta(&release, today),
            "Version 1.0.16 - features and fixes"
        );

        release
            .extra
            .insert("release_date".to_string(), "2025年3月1日".to_string());
        assert_eq!(card_meta(&release, today), "released 2025年3月1日");

        let mut extra = BTreeMap::new();
        extra.insert("project".to_string(), "door_sensor".to_string());
        let focus = ReportRecord {
            path: "focus/door_sensor/index.html".to_string(),
            kind: ReportKind::Focus,
            sort_key: SortKey::Project("door_sensor".to_string()),
            title: "Door Sensor Focused Test Report".to_string(),
            extra,
        };
        assert_eq!(card_meta(&focus, today), "door_sensor focused test report");
    }

    #[test]
    fn test_navigation_limits_daily() {
        let report = ScanReport {
            daily: (1..=15).rev().map(|d| daily(&format!("2025-03-{:02}", d))).collect(),
            ..Default::default()
        };
        let nav = navigation(&report, date("2025-03-15"));
        assert_eq!(nav.daily.len(), DAILY_LIMIT);
        assert_eq!(nav.daily_total, 15);
        assert_eq!(nav.stats.daily, 15);
        assert_eq!(nav.latest_daily.as_ref().unwrap().meta, "today");
        assert_eq!(nav.daily[0].path, "2025/03/15/index.html");
    }

    #[test]
    fn test_write_index() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_file(root, "2025/03/15/index.html", "<html></html>");
        write_file(root, "2025/03/index.html", "<html></html>");
        write_file(root, "releases/1.0.2/index.html", "<html></html>");
        write_file(root, "focus/door_sensor/index.html", "<html></html>");

        let report = Scanner::new().scan(root);
        let written = write_index(root, &report, date("2025-03-16")).unwrap();

        assert_eq!(written.records, 4);
        assert_eq!(
            written.files,
            vec![
                "index.json",
                "api/pages.json",
                "api/pages-by-kind.json",
                "api/summary.json",
                "api/pages-no-release.json",
            ]
        );

        let nav: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(root.join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(nav["stats"]["releases"], 1);
        assert_eq!(nav["latest_daily"]["meta"], "yesterday");

        let summary: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(root.join("api").join(SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["total"], 4);
        assert_eq!(summary["latest_daily"], "2025/03/15/index.html");

        let by_kind: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(root.join("api").join(PAGES_BY_KIND_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(by_kind["release"][0]["sort_key"], serde_json::json!([1, 0, 2, 0]));

        let no_release: Vec<serde_json::Value> = serde_json::from_str(
            &fs::read_to_string(root.join("api").join(PAGES_NO_RELEASE_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(no_release.len(), 3);
        assert!(no_release.iter().all(|p| p["kind"] != "release"));
    }

    #[test]
    fn test_write_index_empty_root() {
        let temp = TempDir::new().unwrap();
        let report = Scanner::new().scan(temp.path());
        let written = write_index(temp.path(), &report, date("2025-03-16")).unwrap();
        assert_eq!(written.records, 0);

        let nav: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(temp.path().join(INDEX_FILE)).unwrap(),
        )
        .unwrap();
        assert!(nav["latest_daily"].is_null());
        assert_eq!(nav["daily"], serde_json::json!([]));
    }
}
