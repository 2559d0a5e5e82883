//! Locating, parsing and overriding the search tree configuration.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Relative paths probed for a `config.toml`, in order.
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",
    // Running from inside a crate directory
    "../config.toml",
];

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SEARCH_TREE_CONFIG";

/// Find the config file to use: `SEARCH_TREE_CONFIG` if it names an existing
/// file, otherwise the first of [`CONFIG_SEARCH_PATHS`] that exists.
fn find_config_file() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
        if explicit.is_file() {
            return Some(explicit);
        }
        warn!(
            path = %explicit.display(),
            "{} does not name a file, probing search paths", CONFIG_PATH_ENV
        );
    }

    CONFIG_SEARCH_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
}

/// Load the search tree configuration.
///
/// The file is located by `find_config_file`; without one the built-in
/// defaults are used. Environment overrides are applied last either way.
pub fn load_config() -> CentralConfig {
    match find_config_file() {
        Some(path) => {
            info!(path = %path.display(), "Loading search tree config");
            load_from_path(&path)
        }
        None => {
            debug!("No config.toml found, using built-in defaults");
            apply_env_overrides(CentralConfig::default())
        }
    }
}

fn read_config(path: &Path) -> Result<CentralConfig, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("cannot read: {e}"))?;
    toml::from_str(&content).map_err(|e| format!("cannot parse: {e}"))
}

/// Load configuration from a specific path.
///
/// Unreadable or unparsable files fall back to the built-in defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    let config = read_config(path).unwrap_or_else(|reason| {
        warn!(path = %path.display(), "Config {}, using defaults", reason);
        CentralConfig::default()
    });
    apply_env_overrides(config)
}

/// Overwrite `$section.$field` from the environment variable `$key`.
macro_rules! env_override {
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Fields parsed with `FromStr`
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = v,
            Ok(Err(_)) => warn!("Ignoring unparsable {}", $key),
            Err(_) => {}
        }
    };
}

/// Apply `SEARCH_TREE_<SECTION>_<KEY>` overrides on top of `config`.
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    env_override!(config, common.log_level, "SEARCH_TREE_COMMON_LOG_LEVEL");

    env_override!(config, tree.batch_size, "SEARCH_TREE_TREE_BATCH_SIZE", parse);
    env_override!(
        config,
        tree.num_simulations,
        "SEARCH_TREE_TREE_NUM_SIMULATIONS",
        parse
    );
    env_override!(
        config,
        tree.num_actions,
        "SEARCH_TREE_TREE_NUM_ACTIONS",
        parse
    );

    env_override!(
        config,
        compaction.propagation,
        "SEARCH_TREE_COMPACTION_PROPAGATION"
    );
    env_override!(
        config,
        compaction.parallel,
        "SEARCH_TREE_COMPACTION_PARALLEL",
        parse
    );

    config
}
