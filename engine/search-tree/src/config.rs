//! Subtree compaction settings.

use std::fmt;
use std::str::FromStr;

use engine_config::{CentralConfig, CompactionSettings};
use tracing::warn;

/// How subtree tags are propagated along parent links.
///
/// Both strategies produce identical translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Always run `N - 1` rounds, the longest possible parent chain. Every
    /// tree executes the same number of steps regardless of its depth.
    #[default]
    FixedRounds,

    /// Stop after the first round that changes no tag.
    UntilConverged,
}

impl FromStr for Propagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_rounds" => Ok(Self::FixedRounds),
            "until_converged" => Ok(Self::UntilConverged),
            other => Err(format!("unknown propagation strategy: {other}")),
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedRounds => write!(f, "fixed_rounds"),
            Self::UntilConverged => write!(f, "until_converged"),
        }
    }
}

/// Configuration for [`BatchTree::extract_subtree_with`](crate::BatchTree::extract_subtree_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionConfig {
    /// Tag propagation strategy.
    pub propagation: Propagation,

    /// Compute per-tree translations on the rayon thread pool.
    /// Trees are independent, so the result does not depend on this flag.
    pub parallel: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            propagation: Propagation::FixedRounds,
            parallel: true,
        }
    }
}

impl CompactionConfig {
    /// Single-threaded compaction with the default propagation.
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    /// Read the `[compaction]` section of the central config.
    pub fn from_central(config: &CentralConfig) -> Self {
        Self::from(&config.compaction)
    }
}

impl From<&CompactionSettings> for CompactionConfig {
    fn from(settings: &CompactionSettings) -> Self {
        let propagation = settings.propagation.parse().unwrap_or_else(|e| {
            warn!("{}, using {}", e, Propagation::default());
            Propagation::default()
        });
        Self {
            propagation,
            parallel: settings.parallel,
        }
    }
}
