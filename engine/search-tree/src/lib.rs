//! Batched flat-array search trees for AlphaZero/MuZero-style planning.
//!
//! This crate stores a batch of Monte Carlo search trees as fixed-capacity
//! arrays indexed by integer node ids, and provides the operations that run
//! between searches:
//!
//! - **Statistics**: per-node Q-values and a root [`SearchSummary`]
//!   (visit counts, visit distribution, value, Q-values).
//! - **Subtree extraction**: re-root every tree onto a chosen child of its
//!   root, dropping everything else and renumbering the survivors into a
//!   contiguous range while preserving their relative order.
//! - **Reset**: return selected trees to the empty initial state.
//!
//! The search loop that grows the trees (selection, expansion, backup) lives
//! with the caller; it writes into the public fields of [`BatchTree`] and
//! uses [`BatchTree::add_child`] to allocate nodes.
//!
//! # Usage
//!
//! ```
//! use search_tree::{BatchTree, NodeId, TreeShape};
//!
//! // Two trees, room for 8 expansions each, 3 actions per node
//! let mut tree: BatchTree = BatchTree::new(TreeShape::new(2, 8, 3), ()).unwrap();
//!
//! for b in 0..2 {
//!     let child = tree.add_child(b, NodeId::ROOT, 1).unwrap();
//!     tree.add_child(b, child, 0).unwrap();
//!     tree.add_child(b, NodeId::ROOT, 2).unwrap();
//!
//!     let root_edges = tree.edges(b, 0);
//!     tree.children_visits[root_edges].copy_from_slice(&[0, 3, 1]);
//! }
//!
//! let summary = tree.summary().unwrap();
//! assert_eq!(summary.visit_probs[0], vec![0.0, 0.75, 0.25]);
//!
//! // Play action 1 in both trees and keep the subtree below it
//! tree.reroot(&[1, 1]).unwrap();
//! assert_eq!(tree.next_node_index, vec![2, 2]);
//! assert_eq!(tree.parent(0, 1), NodeId::ROOT);
//! ```
//!
//! # Layout
//!
//! ```text
//! node fields   [B * N]       node_visits, raw_values, node_values,
//!                             parents, action_from_parent, embeddings
//! edge fields   [B * N * A]   children_index, children_prior_logits,
//!                             children_visits, children_rewards,
//!                             children_discounts, children_values
//! tree fields   [B]           next_node_index, extra_data
//!               [B * A]       root_invalid_actions
//! ```
//!
//! # Configuration
//!
//! Arena dimensions and compaction settings can be read from the shared
//! config (see the `engine-config` crate) with [`BatchTree::from_config`] and
//! [`CompactionConfig::from_central`].

pub mod config;
pub mod node;
mod reset;
pub mod subtree;
pub mod summary;
pub mod tree;

// Re-export main types
pub use config::{CompactionConfig, Propagation};
pub use node::{NodeId, NO_ACTION};
pub use subtree::SubtreeTranslation;
pub use summary::{NodeSelector, SearchSummary};
pub use tree::{BatchTree, TreeError, TreeShape};
