//! Common test utilities for almanac integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't read the
//! user's `~/.config/almanac/` directory or inherited `ALMANAC_*` variables.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::Path;
pub use tempfile::TempDir;

/// Variables that would leak the caller's configuration into a test.
const ISOLATED_ENV: [&str; 9] = [
    "ALMANAC_ROOT",
    "ALMANAC_REMOTE_URL",
    "ALMANAC_REMOTE_TOKEN",
    "ALMANAC_REMOTE_PATH",
    "ALMANAC_STORE_PATH",
    "ALMANAC_RELEASE_DB_TOKEN",
    "ALMANAC_RELEASE_DB_ID",
    "ALMANAC_LOG",
    "RUST_LOG",
];

/// A test environment with an isolated report root and config directory.
///
/// - `root_dir`: the report root (also the working directory)
/// - `config_dir`: user config directory (via `ALMANAC_CONFIG_DIR`)
pub struct TestEnv {
    pub root_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            root_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the almanac binary, isolated per invocation.
    pub fn almanac(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_almanac"));
        cmd.current_dir(self.root_dir.path());
        cmd.env("ALMANAC_CONFIG_DIR", self.config_dir.path());
        for name in ISOLATED_ENV {
            cmd.env_remove(name);
        }
        cmd
    }

    pub fn root(&self) -> &Path {
        self.root_dir.path()
    }

    /// Write a file under the report root, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    /// Write the user-level config.kdl.
    pub fn write_user_config(&self, contents: &str) {
        fs::write(self.config_dir.path().join("config.kdl"), contents).unwrap();
    }

    /// Read and parse a JSON file under the report root.
    pub fn read_json(&self, rel: &str) -> serde_json::Value {
        let text = fs::read_to_string(self.root().join(rel)).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse command stdout as JSON.
pub fn parse_stdout(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}
