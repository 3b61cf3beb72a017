//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (`--root`, `--store`)
//! 2. `ALMANAC_*` environment variables
//! 3. Project config.kdl (`<root>/.almanac/config.kdl`)
//! 4. User config.kdl (`~/.config/almanac/config.kdl`)
//! 5. Built-in defaults

use crate::Result;
use crate::config::schema::{AlmanacConfig, CONFIG_FILE};
use crate::releases::ReleaseDbSettings;
use crate::sync::RemoteSettings;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const REMOTE_URL_ENV: &str = "ALMANAC_REMOTE_URL";
pub const REMOTE_TOKEN_ENV: &str = "ALMANAC_REMOTE_TOKEN";
pub const REMOTE_PATH_ENV: &str = "ALMANAC_REMOTE_PATH";
pub const STORE_PATH_ENV: &str = "ALMANAC_STORE_PATH";
pub const RELEASE_DB_TOKEN_ENV: &str = "ALMANAC_RELEASE_DB_TOKEN";
pub const RELEASE_DB_ID_ENV: &str = "ALMANAC_RELEASE_DB_ID";

/// Overrides the user config directory (mainly for tests).
pub const CONFIG_DIR_ENV: &str = "ALMANAC_CONFIG_DIR";

/// Project-level config directory under the report root.
pub const PROJECT_DIR: &str = ".almanac";

pub const DEFAULT_STORE_PATH: &str = "releases";
pub const DEFAULT_REMOTE_PATH: &str = "/";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from the project config.kdl
    Project,
    /// Value from the user config.kdl
    User,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Project => write!(f, "project"),
            ValueSource::User => write!(f, "user"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub root: Resolved<PathBuf>,
    pub store_path: Resolved<PathBuf>,
    pub remote_url: Option<Resolved<String>>,
    pub remote_token: Option<Resolved<String>>,
    pub remote_path: Resolved<String>,
    pub release_db_token: Option<Resolved<String>>,
    pub release_db_id: Option<Resolved<String>>,
}

impl ResolvedConfig {
    /// Absolute-or-root-relative local release store directory.
    pub fn store_dir(&self) -> PathBuf {
        self.root.value.join(&self.store_path.value)
    }

    /// Remote store settings, if both url and token are configured.
    pub fn remote_settings(&self) -> Option<RemoteSettings> {
        let url = self.remote_url.as_ref()?;
        let token = self.remote_token.as_ref()?;
        Some(RemoteSettings {
            base_url: url.value.clone(),
            token: token.value.clone(),
            path: self.remote_path.value.clone(),
        })
    }

    /// Release database settings, if both token and id are configured.
    pub fn release_db_settings(&self) -> Option<ReleaseDbSettings> {
        let token = self.release_db_token.as_ref()?;
        let id = self.release_db_id.as_ref()?;
        Some(ReleaseDbSettings::new(token.value.clone(), id.value.clone()))
    }

    /// Get the masked remote token for display purposes.
    pub fn masked_remote_token(&self) -> Option<String> {
        self.remote_token.as_ref().map(|r| mask(&r.value))
    }

    /// Get the masked release database token for display purposes.
    pub fn masked_release_db_token(&self) -> Option<String> {
        self.release_db_token.as_ref().map(|r| mask(&r.value))
    }
}

/// Show the first and last 4 characters of a secret.
pub fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        let head: String = chars.iter().take(4).collect();
        format!("{}...", head)
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// User-level config file path.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join(CONFIG_FILE));
        }
    }
    dirs::config_dir().map(|d| d.join("almanac").join(CONFIG_FILE))
}

/// Project-level config file path under `root`.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(CONFIG_FILE)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Pick the highest-precedence value among env, project and user.
fn layered(env: &str, project: &Option<String>, user: &Option<String>) -> Option<Resolved<String>> {
    if let Some(value) = env_value(env) {
        return Some(Resolved::new(value, ValueSource::EnvVar(env.to_string())));
    }
    if let Some(value) = project {
        return Some(Resolved::new(value.clone(), ValueSource::Project));
    }
    user.as_ref()
        .map(|value| Resolved::new(value.clone(), ValueSource::User))
}

/// Resolve configuration from already-loaded config layers.
///
/// `report-root` is only honored from the user file; a project file lives
/// inside the root it would name.
pub fn resolve_layers(
    user: &AlmanacConfig,
    project: &AlmanacConfig,
    overrides: &ConfigOverrides,
    cwd: &Path,
) -> ResolvedConfig {
    let root = match (&overrides.root, &user.report_root) {
        (Some(root), _) => Resolved::new(root.clone(), ValueSource::CliFlag),
        (None, Some(root)) => Resolved::new(PathBuf::from(root), ValueSource::User),
        (None, None) => Resolved::new(cwd.to_path_buf(), ValueSource::Default),
    };

    let store_path = match &overrides.store_path {
        Some(path) => Resolved::new(path.clone(), ValueSource::CliFlag),
        None => layered(STORE_PATH_ENV, &project.store_path, &user.store_path)
            .map(|r| Resolved::new(PathBuf::from(r.value), r.source))
            .unwrap_or_else(|| {
                Resolved::new(PathBuf::from(DEFAULT_STORE_PATH), ValueSource::Default)
            }),
    };

    let remote_path = layered(REMOTE_PATH_ENV, &project.remote_path, &user.remote_path)
        .unwrap_or_else(|| Resolved::new(DEFAULT_REMOTE_PATH.to_string(), ValueSource::Default));

    ResolvedConfig {
        root,
        store_path,
        remote_url: layered(REMOTE_URL_ENV, &project.remote_url, &user.remote_url),
        remote_token: layered(REMOTE_TOKEN_ENV, &project.remote_token, &user.remote_token),
        remote_path,
        release_db_token: layered(
            RELEASE_DB_TOKEN_ENV,
            &project.release_db_token,
            &user.release_db_token,
        ),
        release_db_id: layered(RELEASE_DB_ID_ENV, &project.release_db_id, &user.release_db_id),
    }
}

/// Load one config layer, treating an unreadable or invalid file as empty.
fn load_layer(path: &Path) -> AlmanacConfig {
    AlmanacConfig::load(path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
        AlmanacConfig::new()
    })
}

/// Resolve configuration with full precedence chain, reading both files.
///
/// A config file that fails to parse or validate is logged and skipped, so
/// commands that never touch remote settings keep working.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_with(overrides, |path| Ok(load_layer(path)))
}

/// Like [`resolve_config`], but an invalid config file is an error.
pub fn resolve_config_strict(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    resolve_with(overrides, AlmanacConfig::load)
}

fn resolve_with(
    overrides: &ConfigOverrides,
    load: impl Fn(&Path) -> Result<AlmanacConfig>,
) -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir()?;

    let user = match user_config_path() {
        Some(path) => load(&path)?,
        None => AlmanacConfig::new(),
    };

    // The project file is found under the root picked without it.
    let root = overrides
        .root
        .clone()
        .or_else(|| user.report_root.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| cwd.clone());
    let project = load(&project_config_path(&root))?;

    let resolved = resolve_layers(&user, &project, overrides, &cwd);
    tracing::debug!(
        root = %resolved.root.value.display(),
        store = %resolved.store_dir().display(),
        remote = resolved.remote_settings().is_some(),
        "resolved configuration"
    );
    Ok(resolved)
}
