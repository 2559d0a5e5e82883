//! Built-in defaults from `config.defaults.toml`.
//!
//! The file is embedded with `include_str!` and parsed on first access.

use once_cell::sync::Lazy;
use serde::Deserialize;

const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// Every key is required here: a missing default is a build mistake.
#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    tree: TreeDefaults,
    compaction: CompactionDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct TreeDefaults {
    batch_size: usize,
    num_simulations: usize,
    num_actions: usize,
}

#[derive(Debug, Deserialize)]
struct CompactionDefaults {
    propagation: String,
    parallel: bool,
}

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Tree
pub fn batch_size() -> usize {
    DEFAULTS.tree.batch_size
}
pub fn num_simulations() -> usize {
    DEFAULTS.tree.num_simulations
}
pub fn num_actions() -> usize {
    DEFAULTS.tree.num_actions
}

// Compaction
pub fn propagation() -> &'static str {
    &DEFAULTS.compaction.propagation
}
pub fn parallel() -> bool {
    DEFAULTS.compaction.parallel
}
