//! Batched search trees stored as flat arrays.
//!
//! A [`BatchTree`] holds `B` independent trees, each with capacity for `N`
//! nodes and `A` actions per node. Every per-node field is a row-major
//! `[B * N]` vector and every per-edge field a `[B * N * A]` vector, so the
//! same array operations apply to every tree in the batch. Nodes are
//! referenced by [`NodeId`] instead of pointers; the root is always slot 0.

use std::ops::Range;

use engine_config::{CentralConfig, TreeConfig};
use thiserror::Error;
use tracing::trace;

use crate::node::{NodeId, NO_ACTION};

/// Errors reported by tree operations.
///
/// Every operation checks its inputs before touching the arena, so an error
/// always leaves the tree unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Tree is not batched: the batch dimension is empty")]
    NotBatched,

    #[error("Tree shape has an empty dimension: {0:?}")]
    EmptyShape(TreeShape),

    #[error("Field `{field}` has length {actual}, expected {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Batch index {batch} out of range (batch size {batch_size})")]
    BatchOutOfRange { batch: usize, batch_size: usize },

    #[error("Node {node} out of range (limit {limit})")]
    NodeOutOfRange { node: usize, limit: usize },

    #[error("Action {action} out of range ({num_actions} actions)")]
    ActionOutOfRange { action: usize, num_actions: usize },

    #[error("Action {action} at the root of tree {batch} has never been expanded")]
    UnexpandedAction { batch: usize, action: usize },

    #[error("Action {action} of node {node} in tree {batch} is already expanded")]
    ActionAlreadyExpanded {
        batch: usize,
        node: usize,
        action: usize,
    },

    #[error("Tree {batch} is full ({num_nodes} nodes)")]
    CapacityExhausted { batch: usize, num_nodes: usize },
}

/// Dimensions of a [`BatchTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    /// Number of independent trees (`B`).
    pub batch_size: usize,
    /// Node capacity per tree including the root (`N`).
    pub num_nodes: usize,
    /// Discrete actions per node (`A`).
    pub num_actions: usize,
}

impl TreeShape {
    /// Shape for a search of `num_simulations` expansions: one node per
    /// simulation plus the root.
    pub fn new(batch_size: usize, num_simulations: usize, num_actions: usize) -> Self {
        Self {
            batch_size,
            num_nodes: num_simulations + 1,
            num_actions,
        }
    }

    #[inline]
    fn node_len(&self) -> usize {
        self.batch_size * self.num_nodes
    }

    #[inline]
    fn edge_len(&self) -> usize {
        self.node_len() * self.num_actions
    }

    #[inline]
    fn action_len(&self) -> usize {
        self.batch_size * self.num_actions
    }
}

impl From<&TreeConfig> for TreeShape {
    fn from(config: &TreeConfig) -> Self {
        Self::new(config.batch_size, config.num_simulations, config.num_actions)
    }
}

/// State of a batch of search trees.
///
/// Fields are public so the expansion step can write node and edge
/// statistics directly; [`BatchTree::validate`] re-checks that every field
/// still matches the shape.
///
/// `E` is the per-node embedding (its `Default` is the zero embedding) and
/// `X` is an opaque per-tree payload that tree operations never inspect.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTree<E = f32, X = ()> {
    pub(crate) shape: TreeShape,

    /// `[B, N]` visit count of each node.
    pub node_visits: Vec<u32>,
    /// `[B, N]` raw evaluation of each node.
    pub raw_values: Vec<f32>,
    /// `[B, N]` cumulative search value of each node.
    pub node_values: Vec<f32>,
    /// `[B, N]` parent of each node, `NO_PARENT` for the root.
    pub parents: Vec<NodeId>,
    /// `[B, N]` action taken at the parent to reach each node.
    pub action_from_parent: Vec<i32>,

    /// `[B, N, A]` child reached by each action, `UNVISITED` if unexpanded.
    pub children_index: Vec<NodeId>,
    /// `[B, N, A]` prior logits.
    pub children_prior_logits: Vec<f32>,
    /// `[B, N, A]` visit counts per edge.
    pub children_visits: Vec<u32>,
    /// `[B, N, A]` immediate reward per edge.
    pub children_rewards: Vec<f32>,
    /// `[B, N, A]` discount between reward and child value.
    pub children_discounts: Vec<f32>,
    /// `[B, N, A]` value of the node reached by each edge.
    pub children_values: Vec<f32>,

    /// `[B]` next free slot; equals the number of populated nodes.
    pub next_node_index: Vec<u32>,
    /// `[B, N]` per-node state embeddings.
    pub embeddings: Vec<E>,
    /// `[B, A]` actions disallowed at the root.
    pub root_invalid_actions: Vec<bool>,
    /// `[B]` caller payload.
    pub extra_data: Vec<X>,
}

impl<E: Default, X: Clone> BatchTree<E, X> {
    /// Create a batch of empty trees: only the root slot is allocated and
    /// every field holds its zero or sentinel value.
    pub fn new(shape: TreeShape, extra_data: X) -> Result<Self, TreeError> {
        if shape.num_nodes == 0 || shape.num_actions == 0 {
            return Err(TreeError::EmptyShape(shape));
        }

        let nodes = shape.node_len();
        let edges = shape.edge_len();

        Ok(Self {
            shape,
            node_visits: vec![0; nodes],
            raw_values: vec![0.0; nodes],
            node_values: vec![0.0; nodes],
            parents: vec![NodeId::NO_PARENT; nodes],
            action_from_parent: vec![NO_ACTION; nodes],
            children_index: vec![NodeId::UNVISITED; edges],
            children_prior_logits: vec![0.0; edges],
            children_visits: vec![0; edges],
            children_rewards: vec![0.0; edges],
            children_discounts: vec![0.0; edges],
            children_values: vec![0.0; edges],
            next_node_index: vec![1; shape.batch_size],
            embeddings: std::iter::repeat_with(E::default).take(nodes).collect(),
            root_invalid_actions: vec![false; shape.action_len()],
            extra_data: vec![extra_data; shape.batch_size],
        })
    }

    /// Create empty trees sized by the `[tree]` config section.
    pub fn from_config(config: &CentralConfig, extra_data: X) -> Result<Self, TreeError> {
        Self::new(TreeShape::from(&config.tree), extra_data)
    }
}

impl<E, X> BatchTree<E, X> {
    #[inline]
    pub fn shape(&self) -> TreeShape {
        self.shape
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.shape.batch_size
    }

    /// Node capacity per tree, root included.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.shape.num_nodes
    }

    /// Number of expansions a tree can hold besides its root.
    #[inline]
    pub fn num_simulations(&self) -> usize {
        self.shape.num_nodes - 1
    }

    #[inline]
    pub fn num_actions(&self) -> usize {
        self.shape.num_actions
    }

    /// Check that every field has the length implied by the shape.
    pub fn validate(&self) -> Result<(), TreeError> {
        let s = self.shape;
        check_len("node_visits", self.node_visits.len(), s.node_len())?;
        check_len("raw_values", self.raw_values.len(), s.node_len())?;
        check_len("node_values", self.node_values.len(), s.node_len())?;
        check_len("parents", self.parents.len(), s.node_len())?;
        check_len(
            "action_from_parent",
            self.action_from_parent.len(),
            s.node_len(),
        )?;
        check_len("children_index", self.children_index.len(), s.edge_len())?;
        check_len(
            "children_prior_logits",
            self.children_prior_logits.len(),
            s.edge_len(),
        )?;
        check_len("children_visits", self.children_visits.len(), s.edge_len())?;
        check_len("children_rewards", self.children_rewards.len(), s.edge_len())?;
        check_len(
            "children_discounts",
            self.children_discounts.len(),
            s.edge_len(),
        )?;
        check_len("children_values", self.children_values.len(), s.edge_len())?;
        check_len("next_node_index", self.next_node_index.len(), s.batch_size)?;
        check_len("embeddings", self.embeddings.len(), s.node_len())?;
        check_len(
            "root_invalid_actions",
            self.root_invalid_actions.len(),
            s.action_len(),
        )?;
        check_len("extra_data", self.extra_data.len(), s.batch_size)
    }

    /// Recover the batch size, rejecting unbatched or inconsistent trees.
    pub fn infer_batch_size(&self) -> Result<usize, TreeError> {
        if self.shape.batch_size == 0 {
            return Err(TreeError::NotBatched);
        }
        self.validate()?;
        Ok(self.shape.batch_size)
    }

    /// Number of populated nodes in tree `batch`.
    #[inline]
    pub fn node_count(&self, batch: usize) -> usize {
        self.next_node_index[batch] as usize
    }

    /// Flat offset of node `node` of tree `batch` in the `[B, N]` fields.
    #[inline]
    pub fn node_offset(&self, batch: usize, node: usize) -> usize {
        batch * self.shape.num_nodes + node
    }

    /// Flat offset of edge `(node, action)` of tree `batch` in the
    /// `[B, N, A]` fields.
    #[inline]
    pub fn edge_offset(&self, batch: usize, node: usize, action: usize) -> usize {
        self.node_offset(batch, node) * self.shape.num_actions + action
    }

    /// Range of tree `batch` in the `[B, N]` fields.
    #[inline]
    pub fn node_row(&self, batch: usize) -> Range<usize> {
        let start = self.node_offset(batch, 0);
        start..start + self.shape.num_nodes
    }

    /// Range of tree `batch` in the `[B, N, A]` fields.
    #[inline]
    pub fn edge_row(&self, batch: usize) -> Range<usize> {
        let start = self.edge_offset(batch, 0, 0);
        start..start + self.shape.num_nodes * self.shape.num_actions
    }

    /// Range of the outgoing edges of `node` in the `[B, N, A]` fields.
    #[inline]
    pub fn edges(&self, batch: usize, node: usize) -> Range<usize> {
        let start = self.edge_offset(batch, node, 0);
        start..start + self.shape.num_actions
    }

    /// Range of tree `batch` in the `[B, A]` fields.
    #[inline]
    pub fn action_row(&self, batch: usize) -> Range<usize> {
        let start = batch * self.shape.num_actions;
        start..start + self.shape.num_actions
    }

    #[inline]
    pub fn parent(&self, batch: usize, node: usize) -> NodeId {
        self.parents[self.node_offset(batch, node)]
    }

    #[inline]
    pub fn child(&self, batch: usize, node: usize, action: usize) -> NodeId {
        self.children_index[self.edge_offset(batch, node, action)]
    }

    pub(crate) fn check_batch(&self, batch: usize) -> Result<(), TreeError> {
        if batch >= self.shape.batch_size {
            return Err(TreeError::BatchOutOfRange {
                batch,
                batch_size: self.shape.batch_size,
            });
        }
        Ok(())
    }

    pub(crate) fn check_action(&self, action: usize) -> Result<(), TreeError> {
        if action >= self.shape.num_actions {
            return Err(TreeError::ActionOutOfRange {
                action,
                num_actions: self.shape.num_actions,
            });
        }
        Ok(())
    }

    /// Allocate a new node reached from `parent` by `action` in tree `batch`.
    ///
    /// This is the insertion primitive of the expansion step: it links the
    /// node into `parents`, `action_from_parent` and `children_index` and
    /// advances `next_node_index`. Statistics are left at zero for the caller
    /// to fill in.
    pub fn add_child(
        &mut self,
        batch: usize,
        parent: NodeId,
        action: usize,
    ) -> Result<NodeId, TreeError> {
        self.check_batch(batch)?;
        self.check_action(action)?;

        let populated = self.node_count(batch);
        let parent_idx = match parent.index() {
            Some(idx) if idx < populated => idx,
            _ => {
                return Err(TreeError::NodeOutOfRange {
                    node: parent.0.max(0) as usize,
                    limit: populated,
                })
            }
        };

        let edge = self.edge_offset(batch, parent_idx, action);
        if !self.children_index[edge].is_sentinel() {
            return Err(TreeError::ActionAlreadyExpanded {
                batch,
                node: parent_idx,
                action,
            });
        }
        if populated >= self.shape.num_nodes {
            return Err(TreeError::CapacityExhausted {
                batch,
                num_nodes: self.shape.num_nodes,
            });
        }

        let child = NodeId::from(populated);
        let offset = self.node_offset(batch, populated);
        self.parents[offset] = parent;
        self.action_from_parent[offset] = action as i32;
        self.children_index[edge] = child;
        self.next_node_index[batch] += 1;

        trace!(batch, %parent, action, %child, "Added child");
        Ok(child)
    }
}

fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), TreeError> {
    if actual != expected {
        return Err(TreeError::ShapeMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}
