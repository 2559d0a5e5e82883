//! Shared configuration for the search tree workspace.
//!
//! Values come from three layers, later layers winning:
//!
//! - `config.defaults.toml`, compiled into the crate
//! - a `config.toml` found by [`load_config`] (or named by `SEARCH_TREE_CONFIG`)
//! - `SEARCH_TREE_<SECTION>_<KEY>` environment variables
//!
//! ```text
//! SEARCH_TREE_TREE_NUM_SIMULATIONS=128
//! SEARCH_TREE_COMPACTION_PROPAGATION=until_converged
//! SEARCH_TREE_COMPACTION_PARALLEL=false
//! ```
//!
//! [`init_tracing`] installs the `tracing` subscriber used by benches and
//! tools, filtered at `common.log_level` unless `RUST_LOG` is set.

mod defaults;
mod loader;
mod logging;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, CONFIG_PATH_ENV, CONFIG_SEARCH_PATHS,
};
pub use logging::init_tracing;
pub use structs::*;
