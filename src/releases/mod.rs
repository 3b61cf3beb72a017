//! Release-event source.
//!
//! Events come from a remote release database when credentials are
//! configured, and from a local `releases.json` otherwise:
//! - `ReleaseDbClient::query`: POST `{api}/databases/{id}/query`
//! - `events_from_query`: rows -> [`ReleaseEvent`]s, with type
//!   classification and the previous-month window
//! - `load_releases`: remote first, then the local file, then nothing,
//!   tagged with a [`ReleaseOrigin`]

use crate::models::{EventType, ReleaseEvent};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Release database API base URL
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// API version header value
const API_VERSION: &str = "2022-06-28";

/// User-Agent header sent with every request
const USER_AGENT: &str = "almanac-cli";

/// Timeout for the database query
const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Default local fallback file name
pub const RELEASES_FILE: &str = "releases.json";

/// Environment label given to fetched events
pub const DEFAULT_ENVIRONMENT: &str = "生产环境";

/// Column names in the release database.
const VERSION_PROPERTY: &str = "版本号";
const DATE_PROPERTY: &str = "Date";

/// Note markers, most specific first.
const START_MARKERS: &[&str] = &["分支版本开始", "开始"];
const MERGE_MARKERS: &[&str] = &["分支合并", "合并", "并入", "回主线", "核入主线"];
const BRANCH_MARKERS: &[&str] = &["分支版本", "分支"];

/// Errors from the release database.
#[derive(Debug, Error)]
pub enum ReleaseSourceError {
    #[error("Release database is not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Release database returned HTTP {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Failed to parse release database response: {0}")]
    Malformed(String),
}

/// Credentials for the release database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDbSettings {
    pub token: String,
    pub database_id: String,
    pub api_base: String,
}

impl ReleaseDbSettings {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/databases/{}/query",
            self.api_base.trim_end_matches('/'),
            self.database_id
        )
    }
}

/// Raw query response (only fields we care about).
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Row>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Row {
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(rename = "版本号", default)]
    version: Option<TitleProperty>,
    #[serde(rename = "Date", default)]
    date: Option<DateProperty>,
    #[serde(rename = "Type", default)]
    kind: Option<SelectProperty>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleProperty {
    #[serde(default)]
    title: Vec<RichText>,
}

#[derive(Debug, Default, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Default, Deserialize)]
struct DateProperty {
    date: Option<DateValue>,
}

#[derive(Debug, Default, Deserialize)]
struct DateValue {
    start: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SelectProperty {
    select: Option<SelectValue>,
}

#[derive(Debug, Default, Deserialize)]
struct SelectValue {
    #[serde(default)]
    name: String,
}

impl Row {
    fn version(&self) -> &str {
        self.properties
            .version
            .as_ref()
            .and_then(|p| p.title.first())
            .map(|t| t.plain_text.as_str())
            .unwrap_or("")
    }

    fn date(&self) -> &str {
        self.properties
            .date
            .as_ref()
            .and_then(|p| p.date.as_ref())
            .and_then(|d| d.start.as_deref())
            .unwrap_or("")
    }

    fn note(&self) -> &str {
        self.properties
            .kind
            .as_ref()
            .and_then(|p| p.select.as_ref())
            .map(|s| s.name.as_str())
            .unwrap_or("")
    }
}

/// Blocking client for the release database.
pub struct ReleaseDbClient {
    agent: ureq::Agent,
    settings: ReleaseDbSettings,
}

impl ReleaseDbClient {
    pub fn new(settings: ReleaseDbSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(QUERY_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, settings }
    }

    /// Query every row with a version, newest first.
    pub fn query(&self) -> Result<QueryResponse, ReleaseSourceError> {
        let body = serde_json::json!({
            "filter": {
                "property": VERSION_PROPERTY,
                "title": { "is_not_empty": true }
            },
            "sorts": [
                { "property": DATE_PROPERTY, "direction": "descending" }
            ]
        });

        let response = self
            .agent
            .post(&self.settings.query_url())
            .set("Authorization", &format!("Bearer {}", self.settings.token))
            .set("Notion-Version", API_VERSION)
            .set("Content-Type", "application/json")
            .send_json(body);

        match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| ReleaseSourceError::Malformed(e.to_string())),
            Err(ureq::Error::Status(code, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                Err(ReleaseSourceError::Status { code, message })
            }
            Err(e) => Err(ReleaseSourceError::Http(e.to_string())),
        }
    }
}

/// Event type implied by a release-type note.
pub fn classify(note: &str) -> EventType {
    let has = |markers: &[&str]| markers.iter().any(|m| note.contains(m));
    if has(START_MARKERS) {
        EventType::BranchStart
    } else if has(MERGE_MARKERS) {
        EventType::BranchMerge
    } else if has(BRANCH_MARKERS) {
        EventType::Branch
    } else {
        EventType::Main
    }
}

/// First day of the month before `today`.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}

/// Convert query rows into events dated on or after [`window_start`].
///
/// Rows missing a version or date are dropped; rows whose date does not
/// parse are dropped with a warning.
pub fn events_from_query(response: &QueryResponse, today: NaiveDate) -> Vec<ReleaseEvent> {
    let cutoff = window_start(today);
    let mut events = Vec::new();

    for row in &response.results {
        let (version, raw_date) = (row.version(), row.date());
        if version.is_empty() || raw_date.is_empty() {
            continue;
        }
        // `start` may carry a time component
        let day = raw_date.get(..10).unwrap_or(raw_date);
        let date = match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                tracing::warn!(version, date = raw_date, "skipping release with bad date");
                continue;
            }
        };
        if date < cutoff {
            continue;
        }

        let note = row.note();
        let mut event = ReleaseEvent::new(version, date, classify(note)).with_note(note);
        event.environment = Some(DEFAULT_ENVIRONMENT.to_string());
        events.push(event);
    }

    tracing::info!(
        rows = response.results.len(),
        kept = events.len(),
        since = %cutoff,
        "parsed release database rows"
    );
    events
}

/// On-disk shape of `releases.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReleasesFile {
    #[serde(default)]
    pub releases: Vec<ReleaseEvent>,
}

/// Read events from a `releases.json` file.
pub fn load_releases_file(path: &Path) -> crate::Result<Vec<ReleaseEvent>> {
    let text = fs::read_to_string(path)?;
    let file: ReleasesFile = serde_json::from_str(&text)?;
    Ok(file.releases)
}

/// Write events to a `releases.json` file.
pub fn save_releases_file(path: &Path, events: &[ReleaseEvent]) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = ReleasesFile {
        releases: events.to_vec(),
    };
    fs::write(path, serde_json::to_string_pretty(&file)?)?;
    Ok(())
}

/// Fetch events from the release database.
pub fn fetch_releases(
    settings: Option<&ReleaseDbSettings>,
    today: NaiveDate,
) -> Result<Vec<ReleaseEvent>, ReleaseSourceError> {
    let settings = settings.ok_or(ReleaseSourceError::NotConfigured)?;
    let response = ReleaseDbClient::new(settings.clone()).query()?;
    Ok(events_from_query(&response, today))
}

/// Where a set of release events came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseOrigin {
    Database,
    File,
    Empty,
}

/// Events together with their origin.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedReleases {
    pub events: Vec<ReleaseEvent>,
    pub origin: ReleaseOrigin,
}

impl LoadedReleases {
    fn empty() -> Self {
        Self {
            events: Vec::new(),
            origin: ReleaseOrigin::Empty,
        }
    }
}

/// Load events: release database first, then `fallback`, then empty.
pub fn load_releases(
    settings: Option<&ReleaseDbSettings>,
    fallback: &Path,
    today: NaiveDate,
) -> LoadedReleases {
    match fetch_releases(settings, today) {
        Ok(events) => {
            return LoadedReleases {
                events,
                origin: ReleaseOrigin::Database,
            };
        }
        Err(e) => tracing::warn!(error = %e, "release database unavailable, using local file"),
    }

    if !fallback.exists() {
        tracing::warn!(path = %fallback.display(), "no local releases file");
        return LoadedReleases::empty();
    }
    match load_releases_file(fallback) {
        Ok(events) => LoadedReleases {
            events,
            origin: ReleaseOrigin::File,
        },
        Err(e) => {
            tracing::warn!(path = %fallback.display(), error = %e, "could not read releases file");
            LoadedReleases::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    fn row(version: &str, date: &str, note: Option<&str>) -> serde_json::Value {
        let select = match note {
            Some(name) => serde_json::json!({ "name": name }),
            None => serde_json::Value::Null,
        };
        serde_json::json!({
            "properties": {
                "版本号": { "title": [ { "plain_text": version } ] },
                "Date": { "date": { "start": date } },
                "Type": { "select": select }
            }
        })
    }

    fn response(rows: Vec<serde_json::Value>) -> QueryResponse {
        serde_json::from_value(serde_json::json!({ "results": rows })).unwrap()
    }

    #[test]
    fn test_classify_most_specific_first() {
        assert_eq!(classify("分支版本开始"), EventType::BranchStart);
        assert_eq!(classify("热修复开始"), EventType::BranchStart);
        assert_eq!(classify("分支合并"), EventType::BranchMerge);
        assert_eq!(classify("分支版本核入主线"), EventType::BranchMerge);
        assert_eq!(classify("分支版本"), EventType::Branch);
        assert_eq!(classify("主线版本(商店发布)"), EventType::Main);
        assert_eq!(classify(""), EventType::Main);
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(date("2025-03-15")), date("2025-02-01"));
        assert_eq!(window_start(date("2025-01-03")), date("2024-12-01"));
    }

    #[test]
    fn test_events_from_query_filters_and_maps() {
        let resp = response(vec![
            row("1.0.16", "2025-03-10", Some("主线版本")),
            row("1.0.15(181)", "2025-02-01", Some("分支版本开始")),
            row("1.0.14", "2025-01-31", Some("主线版本")),
            row("1.0.13", "2025/03/01", None),
            row("", "2025-03-02", None),
        ]);
        let events = events_from_query(&resp, date("2025-03-20"));

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].version, "1.0.16");
        assert_eq!(events[0].event_type, EventType::Main);
        assert_eq!(events[0].note, "主线版本");
        assert_eq!(events[0].environment.as_deref(), Some(DEFAULT_ENVIRONMENT));
        assert_eq!(events[1].event_type, EventType::BranchStart);
    }

    #[test]
    fn test_datetime_start_uses_the_day() {
        let resp = response(vec![row("1.1", "2025-03-11T09:30:00.000+08:00", None)]);
        let events = events_from_query(&resp, date("2025-03-20"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, date("2025-03-11"));
    }

    #[test]
    fn test_row_without_type_is_main_with_empty_note() {
        let resp = response(vec![row("2.0", "2025-03-01", None)]);
        let events = events_from_query(&resp, date("2025-03-02"));
        assert_eq!(events[0].event_type, EventType::Main);
        assert!(events[0].note.is_empty());
    }

    #[test]
    fn test_releases_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data").join(RELEASES_FILE);
        let events = vec![
            ReleaseEvent::new("1.0", date("2025-03-01"), EventType::BranchStart).with_note("开始"),
        ];
        save_releases_file(&path, &events).unwrap();
        assert_eq!(load_releases_file(&path).unwrap(), events);
    }

    #[test]
    fn test_releases_file_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(RELEASES_FILE);
        fs::write(
            &path,
            r#"{"releases": [{"version": "1.0.1", "date": "2025-03-01"}]}"#,
        )
        .unwrap();
        let events = load_releases_file(&path).unwrap();
        assert_eq!(events[0].event_type, EventType::Main);
        assert!(events[0].note.is_empty());
    }

    #[test]
    fn test_load_releases_falls_back_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(RELEASES_FILE);
        fs::write(
            &path,
            r#"{"releases": [{"version": "1.0.1", "date": "2025-03-01", "type": "branch"}]}"#,
        )
        .unwrap();

        let loaded = load_releases(None, &path, date("2025-03-20"));
        assert_eq!(loaded.origin, ReleaseOrigin::File);
        assert_eq!(loaded.events.len(), 1);
        assert_eq!(loaded.events[0].event_type, EventType::Branch);
    }

    #[test]
    fn test_load_releases_nothing_available() {
        let temp = TempDir::new().unwrap();
        let loaded = load_releases(None, &temp.path().join(RELEASES_FILE), date("2025-03-20"));
        assert_eq!(loaded.origin, ReleaseOrigin::Empty);
        assert!(loaded.events.is_empty());
    }

    #[test]
    fn test_unreachable_database_falls_back() {
        let temp = TempDir::new().unwrap();
        let mut settings = ReleaseDbSettings::new("t", "db");
        settings.api_base = "http://127.0.0.1:9".to_string();
        let loaded = load_releases(
            Some(&settings),
            &temp.path().join(RELEASES_FILE),
            date("2025-03-20"),
        );
        assert_eq!(loaded.origin, ReleaseOrigin::Empty);
        assert!(matches!(
            fetch_releases(Some(&settings), date("2025-03-20")),
            Err(ReleaseSourceError::Http(_))
        ));
    }

    #[test]
    fn test_query_url() {
        let settings = ReleaseDbSettings::new("t", "abc123");
        assert_eq!(
            settings.query_url(),
            "https://api.notion.com/v1/databases/abc123/query"
        );
    }
}
