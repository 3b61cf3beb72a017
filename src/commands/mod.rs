//! Command implementations for the Almanac CLI.
//!
//! Each command returns a result type implementing [`Output`] so `main` can
//! print it as JSON (default) or human-readable text.

use crate::Result;
use crate::config::{Resolved, ResolvedConfig};
use crate::export::{self, Counts};
use crate::metrics;
use crate::models::{BugStats, ReportKind};
use crate::releases::{self, LoadedReleases, RELEASES_FILE, ReleaseOrigin};
use crate::scanner::{ScanReport, Scanner};
use crate::sync::{HttpRemoteStore, SyncEngine, SyncReport};
use crate::timeline::{self, LayoutConfig, TimelineLayout};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {}"}}"#, e))
}

// === scan ===

#[derive(Serialize)]
pub struct ScanResult {
    pub root: String,
    pub counts: Counts,
    #[serde(flatten)]
    pub report: ScanReport,
}

impl Output for ScanResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("{} reports under {}", self.counts.total(), self.root);
        for kind in ReportKind::ALL {
            let records = self.report.of_kind(kind);
            if records.is_empty() {
                continue;
            }
            let _ = write!(out, "\n\n{} ({}):", kind, records.len());
            for record in records {
                let _ = write!(out, "\n  {}  {}", record.title, record.path);
            }
        }
        out
    }
}

/// Scan the report root.
pub fn scan(root: &Path) -> Result<ScanResult> {
    let report = Scanner::new().scan(root);
    Ok(ScanResult {
        root: root.display().to_string(),
        counts: Counts::of(&report),
        report,
    })
}

// === index ===

#[derive(Serialize)]
pub struct IndexResult {
    pub root: String,
    pub counts: Counts,
    pub files: Vec<String>,
}

impl Output for IndexResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Indexed {} reports under {} (daily {}, monthly {}, releases {}, focus {})",
            self.counts.total(),
            self.root,
            self.counts.daily,
            self.counts.monthly,
            self.counts.releases,
            self.counts.focus
        );
        for file in &self.files {
            let _ = write!(out, "\n  wrote {}", file);
        }
        out
    }
}

/// Scan the report root and write the navigation and export documents.
pub fn index(root: &Path, today: NaiveDate) -> Result<IndexResult> {
    let report = Scanner::new().scan(root);
    let written = export::write_index(root, &report, today)?;
    Ok(IndexResult {
        root: root.display().to_string(),
        counts: Counts::of(&report),
        files: written.files,
    })
}

// === sync ===

#[derive(Serialize)]
pub struct SyncResult {
    pub synced: usize,
    pub versions: Vec<String>,
    pub failed: Vec<crate::sync::SyncFailure>,
    pub enabled: bool,
    pub store: String,
}

impl SyncResult {
    fn new(report: SyncReport, store: &Path) -> Self {
        Self {
            synced: report.count(),
            versions: report.synced,
            failed: report.failed,
            enabled: report.enabled,
            store: store.display().to_string(),
        }
    }
}

impl Output for SyncResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if !self.enabled {
            return "Sync disabled: remote-url and remote-token are not configured".to_string();
        }
        let mut out = format!("Synced {} new release report(s) into {}", self.synced, self.store);
        for version in &self.versions {
            let _ = write!(out, "\n  + {}", version);
        }
        for failure in &self.failed {
            let _ = write!(out, "\n  ! {}: {}", failure.version, failure.error);
        }
        out
    }
}

/// Fetch release reports missing from the local store.
pub fn sync(config: &ResolvedConfig) -> Result<SyncResult> {
    let store_dir = config.store_dir();
    let remote = config.remote_settings().map(HttpRemoteStore::new);
    let report = SyncEngine::new(remote, &store_dir).sync()?;
    Ok(SyncResult::new(report, &store_dir))
}

// === metrics ===

#[derive(Serialize)]
pub struct MetricsResult {
    pub file: String,
    #[serde(flatten)]
    pub stats: BugStats,
}

impl Output for MetricsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Metrics from {}:\n  reported this month: {}\n  closed this month:   {}\n  valid (excl. review): {}\n  in review:           {}",
            self.file,
            self.stats.monthly_new,
            self.stats.monthly_closed,
            self.stats.total_valid,
            self.stats.in_review
        )
    }
}

/// Extract defect metrics from a document.
pub fn metrics(file: &Path) -> Result<MetricsResult> {
    Ok(MetricsResult {
        file: file.display().to_string(),
        stats: metrics::stats_from_file(file),
    })
}

// === timeline ===

#[derive(Serialize)]
pub struct TimelineResult {
    pub events: usize,
    pub source: ReleaseOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<String>,
    #[serde(flatten)]
    pub layout: TimelineLayout,
}

impl Output for TimelineResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let layout = &self.layout;
        let source = match self.source {
            ReleaseOrigin::Database => "release database",
            ReleaseOrigin::File => "releases file",
            ReleaseOrigin::Empty => "no source",
        };
        let mut out = format!(
            "Timeline: {} events from {}, {} branch line(s), canvas {}x{}",
            self.events,
            source,
            layout.branches.len(),
            layout.width,
            layout.height
        );
        for node in &layout.nodes {
            let _ = write!(
                out,
                "\n  {:<16} {}  {:<12} x={:.1} y={:.1}",
                node.version,
                node.date,
                node.event_type.as_str(),
                node.x,
                node.y
            );
        }
        for branch in &layout.branches {
            let state = if branch.merged { "merged" } else { "open" };
            let _ = write!(
                out,
                "\n  branch {} from {} ({})",
                branch.index, branch.start_version, state
            );
        }
        if let Some(saved) = &self.saved {
            let _ = write!(out, "\nSaved events to {}", saved);
        }
        out
    }
}

/// Options for the `timeline` command.
#[derive(Debug, Clone, Default)]
pub struct TimelineOptions {
    pub input: Option<PathBuf>,
    pub fetch: bool,
    /// Write fetched events back to the input file
    pub save: bool,
    pub width: Option<f64>,
}

/// Load release events and lay out the timeline.
pub fn timeline(
    config: &ResolvedConfig,
    options: &TimelineOptions,
    today: NaiveDate,
) -> Result<TimelineResult> {
    let input = options
        .input
        .clone()
        .unwrap_or_else(|| config.root.value.join(RELEASES_FILE));

    let loaded = if options.fetch {
        releases::load_releases(config.release_db_settings().as_ref(), &input, today)
    } else if input.exists() {
        LoadedReleases {
            events: releases::load_releases_file(&input)?,
            origin: ReleaseOrigin::File,
        }
    } else if options.input.is_some() {
        return Err(crate::Error::InvalidInput(format!(
            "Releases file does not exist: {}",
            input.display()
        )));
    } else {
        tracing::warn!(path = %input.display(), "no releases file; timeline is empty");
        LoadedReleases {
            events: Vec::new(),
            origin: ReleaseOrigin::Empty,
        }
    };

    let mut layout_config = LayoutConfig::default();
    if let Some(width) = options.width {
        if !(width.is_finite() && width > 0.0) {
            return Err(crate::Error::InvalidInput(format!(
                "width must be a positive number, got {}",
                width
            )));
        }
        layout_config.min_width = width;
    }

    let saved = if options.save && loaded.origin == ReleaseOrigin::Database {
        releases::save_releases_file(&input, &loaded.events)?;
        Some(input.display().to_string())
    } else {
        None
    };

    Ok(TimelineResult {
        events: loaded.events.len(),
        source: loaded.origin,
        saved,
        layout: timeline::layout_timeline(&loaded.events, &layout_config),
    })
}

// === config show ===

#[derive(Serialize)]
pub struct ConfigShowResult {
    pub root: Resolved<PathBuf>,
    pub store_path: Resolved<PathBuf>,
    pub store_dir: PathBuf,
    pub remote_url: Option<Resolved<String>>,
    pub remote_token: Option<Resolved<String>>,
    pub remote_path: Resolved<String>,
    pub release_db_token: Option<Resolved<String>>,
    pub release_db_id: Option<Resolved<String>>,
    pub sync_enabled: bool,
    pub release_db_enabled: bool,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        fn line<T: std::fmt::Display>(out: &mut String, key: &str, value: Option<(T, String)>) {
            let _ = match value {
                Some((value, source)) => write!(out, "\n  {:<18} {}  ({})", key, value, source),
                None => write!(out, "\n  {:<18} (not set)", key),
            };
        }
        fn pair<T: std::fmt::Display>(r: &Option<Resolved<T>>) -> Option<(String, String)> {
            r.as_ref().map(|r| (r.value.to_string(), r.source.to_string()))
        }

        let mut out = "Configuration:".to_string();
        line(
            &mut out,
            "root",
            Some((self.root.value.display(), self.root.source.to_string())),
        );
        line(
            &mut out,
            "store-path",
            Some((self.store_path.value.display(), self.store_path.source.to_string())),
        );
        line(&mut out, "remote-url", pair(&self.remote_url));
        line(&mut out, "remote-token", pair(&self.remote_token));
        line(
            &mut out,
            "remote-path",
            Some((&self.remote_path.value, self.remote_path.source.to_string())),
        );
        line(&mut out, "release-db-token", pair(&self.release_db_token));
        line(&mut out, "release-db-id", pair(&self.release_db_id));
        let _ = write!(
            out,
            "\n\nSync: {}\nRelease database: {}",
            if self.sync_enabled { "enabled" } else { "disabled" },
            if self.release_db_enabled { "enabled" } else { "disabled" }
        );
        out
    }
}

/// Show the resolved configuration with tokens masked.
pub fn config_show(config: &ResolvedConfig) -> Result<ConfigShowResult> {
    let masked = |r: &Option<Resolved<String>>, value: Option<String>| {
        r.as_ref()
            .zip(value)
            .map(|(r, value)| Resolved::new(value, r.source.clone()))
    };
    Ok(ConfigShowResult {
        root: config.root.clone(),
        store_path: config.store_path.clone(),
        store_dir: config.store_dir(),
        remote_url: config.remote_url.clone(),
        remote_token: masked(&config.remote_token, config.masked_remote_token()),
        remote_path: config.remote_path.clone(),
        release_db_token: masked(
            &config.release_db_token,
            config.masked_release_db_token(),
        ),
        release_db_id: config.release_db_id.clone(),
        sync_enabled: config.remote_settings().is_some(),
        release_db_enabled: config.release_db_settings().is_some(),
    })
}
