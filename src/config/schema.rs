//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The `AlmanacConfig` struct mirroring the file
//! - Conversion to and from KDL documents
//! - Validation and layered merging

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Config file name at every level.
pub const CONFIG_FILE: &str = "config.kdl";

/// Settings stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// report-root "/srv/reports"
/// store-path "releases"
/// remote-url "https://files.example.com"
/// remote-token "alist-xxxxxxxx"
/// remote-path "/reports/releases"
/// release-db-token "secret_xxxxxxxx"
/// release-db-id "0123456789abcdef"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlmanacConfig {
    /// Remote file store base address
    pub remote_url: Option<String>,

    /// Remote file store auth token (sensitive)
    pub remote_token: Option<String>,

    /// Directory listed on the remote file store
    pub remote_path: Option<String>,

    /// Local release store, relative to the report root unless absolute
    pub store_path: Option<String>,

    /// Release database token (sensitive)
    pub release_db_token: Option<String>,

    /// Release database id
    pub release_db_id: Option<String>,

    /// Report root directory
    pub report_root: Option<String>,
}

/// KDL node names, in the order `to_kdl` writes them.
const NODES: [&str; 7] = [
    "report-root",
    "store-path",
    "remote-url",
    "remote-token",
    "remote-path",
    "release-db-token",
    "release-db-id",
];

fn string_node(doc: &KdlDocument, name: &str) -> Option<String> {
    let entry = doc.get(name)?.entries().first()?;
    entry.value().as_string().map(str::to_string)
}

impl AlmanacConfig {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(&self, node: &str) -> Option<&String> {
        match node {
            "report-root" => self.report_root.as_ref(),
            "store-path" => self.store_path.as_ref(),
            "remote-url" => self.remote_url.as_ref(),
            "remote-token" => self.remote_token.as_ref(),
            "remote-path" => self.remote_path.as_ref(),
            "release-db-token" => self.release_db_token.as_ref(),
            "release-db-id" => self.release_db_id.as_ref(),
            _ => None,
        }
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref url) = self.remote_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "remote-url must start with http:// or https://, got {}",
                    url
                ));
            }
        }
        if let Some(ref path) = self.remote_path {
            if !path.starts_with('/') {
                return Err(format!("remote-path must be absolute, got {}", path));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            remote_url: string_node(doc, "remote-url"),
            remote_token: string_node(doc, "remote-token"),
            remote_path: string_node(doc, "remote-path"),
            store_path: string_node(doc, "store-path"),
            release_db_token: string_node(doc, "release-db-token"),
            release_db_id: string_node(doc, "release-db-id"),
            report_root: string_node(doc, "report-root"),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        for name in NODES {
            if let Some(value) = self.field(name) {
                let mut node = KdlNode::new(name);
                node.push(KdlEntry::new(KdlValue::String(value.clone())));
                doc.nodes_mut().push(node);
            }
        }
        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &AlmanacConfig) {
        let pairs = [
            (&mut self.remote_url, &other.remote_url),
            (&mut self.remote_token, &other.remote_token),
            (&mut self.remote_path, &other.remote_path),
            (&mut self.store_path, &other.store_path),
            (&mut self.release_db_token, &other.release_db_token),
            (&mut self.release_db_id, &other.release_db_id),
            (&mut self.report_root, &other.report_root),
        ];
        for (mine, theirs) in pairs {
            if theirs.is_some() {
                mine.clone_from(theirs);
            }
        }
    }

    /// Load and validate a config file. A missing file is an empty config.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let doc: KdlDocument = text.parse()?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|e| crate::Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write the config as KDL, creating parent directories.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_kdl().to_string())?;
        Ok(())
    }
}
