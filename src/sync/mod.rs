//! Remote release-report synchronization.
//!
//! Brings release reports published on a remote file store into the local
//! release store exactly once. The sync is idempotent: versions already
//! present locally are never fetched or touched again, so a second run
//! against an unchanged remote performs zero writes.
//!
//! Remote files follow the naming convention `v<version>_release_report.html`
//! and are stored locally as `<store>/<version>/index.html`.

pub mod http;

pub use http::{HttpRemoteStore, RemoteSettings};

use crate::models::RemoteArtifact;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of synced artifacts (remote and local).
pub const ARTIFACT_EXTENSION: &str = "html";

/// Prefix of remote artifact names.
const NAME_PREFIX: &str = "v";

/// Suffix of remote artifact names, before the extension.
const NAME_SUFFIX: &str = "_release_report";

/// Errors that can occur while talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network or transport failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Remote answered with a non-success status
    #[error("Remote returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Malformed remote response: {0}")]
    Malformed(String),
}

/// A remote file store that can list, resolve and fetch artifacts.
pub trait RemoteStore {
    /// List entry names under the configured directory.
    fn list(&self) -> Result<Vec<String>, RemoteError>;

    /// Resolve a listed entry name to a direct content locator.
    fn resolve(&self, name: &str) -> Result<String, RemoteError>;

    /// Retrieve the bytes behind a content locator.
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Derive a version from a remote artifact name.
///
/// `v1.0.16.220_release_report.html` -> `1.0.16.220`. Names that don't follow
/// the convention yield `None`.
pub fn extract_version(name: &str) -> Option<String> {
    let stem = name.strip_suffix(&format!(".{}", ARTIFACT_EXTENSION))?;
    let version = stem.strip_prefix(NAME_PREFIX)?.strip_suffix(NAME_SUFFIX)?;
    let valid = !version.is_empty()
        && !version.contains(['/', '\\'])
        && version != "."
        && version != "..";
    valid.then(|| version.to_string())
}

/// A version that could not be synced this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub version: String,
    pub error: String,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Whether the remote store was configured at all
    pub enabled: bool,
    /// Versions listed remotely (after filtering)
    pub remote: usize,
    /// Versions already present locally before the run
    pub local: usize,
    /// Versions newly persisted this run
    pub synced: Vec<String>,
    /// Versions that failed to fetch or save
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    /// Number of newly persisted versions.
    pub fn count(&self) -> usize {
        self.synced.len()
    }
}

/// Sync engine over an optional remote store and a local release store.
pub struct SyncEngine<S> {
    remote: Option<S>,
    store_dir: PathBuf,
}

impl<S: RemoteStore> SyncEngine<S> {
    /// Create an engine. A `None` remote disables syncing.
    pub fn new(remote: Option<S>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            store_dir: store_dir.into(),
        }
    }

    /// Local release store directory.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// List remote artifacts with the expected extension.
    ///
    /// Transport and status failures are logged and reported as an empty
    /// listing so the run continues without touching local state.
    pub fn list_remote(&self) -> Vec<RemoteArtifact> {
        let Some(remote) = &self.remote else {
            tracing::warn!("remote store not configured; skipping listing");
            return Vec::new();
        };

        let names = match remote.list() {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "remote listing failed; treating as empty");
                return Vec::new();
            }
        };

        let suffix = format!(".{}", ARTIFACT_EXTENSION);
        names
            .into_iter()
            .filter(|name| name.ends_with(&suffix))
            .map(|name| RemoteArtifact {
                version: extract_version(&name),
                name,
            })
            .collect()
    }

    /// Version directories already present in the local store.
    ///
    /// Creates the store directory if it does not exist yet.
    pub fn local_versions(&self) -> crate::Result<BTreeSet<String>> {
        fs::create_dir_all(&self.store_dir)?;

        let mut versions = BTreeSet::new();
        for entry in fs::read_dir(&self.store_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                versions.insert(name.to_string());
            }
        }
        Ok(versions)
    }

    /// Fetch and persist every remote version missing locally.
    ///
    /// Each version is handled independently: a failure is recorded in the
    /// report and the remaining versions are still processed. Existing local
    /// versions are never modified.
    pub fn sync(&self) -> crate::Result<SyncReport> {
        let Some(remote) = &self.remote else {
            tracing::warn!("remote store not configured; sync disabled");
            return Ok(SyncReport::default());
        };

        let remote_versions: BTreeSet<(String, String)> = self
            .list_remote()
            .into_iter()
            .filter_map(|artifact| artifact.version.map(|v| (v, artifact.name)))
            .collect();
        let local = self.local_versions()?;

        let mut report = SyncReport {
            enabled: true,
            remote: remote_versions.len(),
            local: local.len(),
            ..Default::default()
        };

        let missing = remote_versions
            .iter()
            .filter(|(version, _)| !local.contains(version));

        for (version, name) in missing {
            match self.fetch_one(remote, version, name) {
                Ok(path) => {
                    tracing::info!(version = %version, path = %path.display(), "synced release report");
                    report.synced.push(version.clone());
                }
                Err(e) => {
                    tracing::warn!(version = %version, error = %e, "failed to sync release report");
                    report.failed.push(SyncFailure {
                        version: version.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            "sync complete"
        );
        Ok(report)
    }

    /// Resolve, fetch and write a single version.
    ///
    /// Bytes are fetched before anything is created locally; if the write
    /// fails the half-created version directory is removed so the version is
    /// retried next run.
    fn fetch_one(&self, remote: &S, version: &str, name: &str) -> crate::Result<PathBuf> {
        let locator = remote.resolve(name)?;
        let bytes = remote.fetch(&locator)?;

        let dir = self.store_dir.join(version);
        let path = dir.join(format!("index.{}", ARTIFACT_EXTENSION));
        let existed = dir.exists();
        let written = fs::create_dir_all(&dir).and_then(|_| fs::write(&path, &bytes));
        if let Err(e) = written {
            if !existed {
                discard_partial(&dir);
            }
            return Err(e.into());
        }
        Ok(path)
    }
}

/// Remove a half-written version directory.
///
/// A directory left behind is counted as synced by later runs, so a failed
/// removal is logged loudly. Returns whether the directory is gone.
fn discard_partial(dir: &Path) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "could not remove partial version directory; remove it to retry"
            );
            false
        }
    }
}
