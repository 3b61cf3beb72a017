//! Configuration for Almanac.
//!
//! ## config.kdl
//!
//! Located at:
//! - User: `~/.config/almanac/config.kdl` (or `$ALMANAC_CONFIG_DIR/config.kdl`)
//! - Project: `<root>/.almanac/config.kdl`
//!
//! Contains:
//! - `report-root` - Report root directory (user level only)
//! - `store-path` - Local release store (default `releases`)
//! - `remote-url`, `remote-token`, `remote-path` - Remote file store
//! - `release-db-token`, `release-db-id` - Release database
//!
//! Missing remote settings disable sync; missing release database
//! settings make the timeline use the local `releases.json`. An invalid
//! file is skipped with a warning; only `config show` reports it.
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedConfig, ValueSource, mask, resolve_config,
    resolve_config_strict, resolve_layers,
};
pub use schema::{AlmanacConfig, CONFIG_FILE};
