//! Deserialised configuration sections.
//!
//! Every field is optional in `config.toml` and falls back to the embedded
//! defaults.

use crate::defaults;
use serde::Deserialize;

// `#[serde(default = "...")]` needs plain functions

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_batch_size() -> usize {
    defaults::batch_size()
}
fn d_num_sims() -> usize {
    defaults::num_simulations()
}
fn d_num_actions() -> usize {
    defaults::num_actions()
}
fn d_propagation() -> String {
    defaults::propagation().into()
}
fn d_parallel() -> bool {
    defaults::parallel()
}

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub compaction: CompactionSettings,
}

/// Settings shared by every consumer
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Arena dimensions
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TreeConfig {
    /// Number of independent trees processed together (`B`).
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    /// Node capacity minus the root (`N - 1`).
    #[serde(default = "d_num_sims")]
    pub num_simulations: usize,
    /// Discrete actions per node (`A`).
    #[serde(default = "d_num_actions")]
    pub num_actions: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            num_simulations: defaults::num_simulations(),
            num_actions: defaults::num_actions(),
        }
    }
}

/// Subtree compaction settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompactionSettings {
    /// `"fixed_rounds"` or `"until_converged"`.
    #[serde(default = "d_propagation")]
    pub propagation: String,
    /// Compute per-tree translations on the rayon pool.
    #[serde(default = "d_parallel")]
    pub parallel: bool,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            propagation: defaults::propagation().into(),
            parallel: defaults::parallel(),
        }
    }
}
