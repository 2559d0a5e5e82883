//! Read-only statistics over a [`BatchTree`].

use tracing::trace;

use crate::node::NodeId;
use crate::tree::{BatchTree, TreeError};

/// Which node to read in each tree of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSelector<'a> {
    /// The same node in every tree.
    Shared(usize),
    /// One node per tree; the slice length must equal the batch size.
    PerBatch(&'a [usize]),
}

impl NodeSelector<'_> {
    fn node_for(&self, batch: usize) -> usize {
        match self {
            Self::Shared(node) => *node,
            Self::PerBatch(nodes) => nodes[batch],
        }
    }
}

impl From<usize> for NodeSelector<'_> {
    fn from(node: usize) -> Self {
        Self::Shared(node)
    }
}

impl From<NodeId> for NodeSelector<'_> {
    fn from(node: NodeId) -> Self {
        Self::Shared(node.index().unwrap_or(usize::MAX))
    }
}

impl<'a> From<&'a [usize]> for NodeSelector<'a> {
    fn from(nodes: &'a [usize]) -> Self {
        Self::PerBatch(nodes)
    }
}

impl<'a> From<&'a Vec<usize>> for NodeSelector<'a> {
    fn from(nodes: &'a Vec<usize>) -> Self {
        Self::PerBatch(nodes)
    }
}

/// Root statistics extracted after a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSummary {
    /// `[B][A]` visit count of each root action.
    pub visit_counts: Vec<Vec<f32>>,
    /// `[B][A]` visit counts normalised to a distribution; uniform when the
    /// root has no visits.
    pub visit_probs: Vec<Vec<f32>>,
    /// `[B]` search value of each root.
    pub value: Vec<f32>,
    /// `[B][A]` Q-value of each root action.
    pub qvalues: Vec<Vec<f32>>,
}

impl SearchSummary {
    pub fn batch_size(&self) -> usize {
        self.value.len()
    }
}

impl<E, X> BatchTree<E, X> {
    /// Q-values `r + gamma * v` of every action at the selected nodes.
    ///
    /// Returns one `[A]` row per tree.
    pub fn qvalues<'a>(
        &self,
        nodes: impl Into<NodeSelector<'a>>,
    ) -> Result<Vec<Vec<f32>>, TreeError> {
        let nodes = nodes.into();
        let batch_size = self.infer_batch_size()?;

        if let NodeSelector::PerBatch(ids) = nodes {
            if ids.len() != batch_size {
                return Err(TreeError::ShapeMismatch {
                    field: "node_indices",
                    expected: batch_size,
                    actual: ids.len(),
                });
            }
        }

        (0..batch_size)
            .map(|batch| {
                let node = nodes.node_for(batch);
                if node >= self.num_nodes() {
                    return Err(TreeError::NodeOutOfRange {
                        node,
                        limit: self.num_nodes(),
                    });
                }
                Ok(self.node_qvalues(batch, node))
            })
            .collect()
    }

    fn node_qvalues(&self, batch: usize, node: usize) -> Vec<f32> {
        self.edges(batch, node)
            .map(|e| self.children_rewards[e] + self.children_discounts[e] * self.children_values[e])
            .collect()
    }

    /// Summary statistics for the root of every tree.
    pub fn summary(&self) -> Result<SearchSummary, TreeError> {
        let batch_size = self.infer_batch_size()?;
        let root = NodeId::ROOT.0 as usize;
        let uniform = 1.0 / self.num_actions() as f32;

        let value = (0..batch_size)
            .map(|b| self.node_values[self.node_offset(b, root)])
            .collect();
        let qvalues = self.qvalues(NodeSelector::Shared(root))?;

        let visit_counts: Vec<Vec<f32>> = (0..batch_size)
            .map(|b| {
                self.edges(b, root)
                    .map(|e| self.children_visits[e] as f32)
                    .collect()
            })
            .collect();

        let visit_probs = visit_counts
            .iter()
            .map(|counts| {
                let total: f32 = counts.iter().sum();
                if total > 0.0 {
                    counts.iter().map(|c| c / total.max(1.0)).collect()
                } else {
                    vec![uniform; counts.len()]
                }
            })
            .collect();

        trace!(batch_size, "Extracted root summary");

        Ok(SearchSummary {
            visit_counts,
            visit_probs,
            value,
            qvalues,
        })
    }
}
