//! Returning trees to their empty initial state.

use tracing::debug;

use crate::node::{NodeId, NO_ACTION};
use crate::tree::{BatchTree, TreeError};

impl<E: Default, X> BatchTree<E, X> {
    /// Reset the trees selected by `select_batch` (all trees when `None`)
    /// to an empty root. Unselected trees and `extra_data` are untouched.
    pub fn reset(&mut self, select_batch: Option<&[bool]>) -> Result<(), TreeError> {
        self.validate()?;
        let batch_size = self.batch_size();
        if let Some(mask) = select_batch {
            if mask.len() != batch_size {
                return Err(TreeError::ShapeMismatch {
                    field: "select_batch",
                    expected: batch_size,
                    actual: mask.len(),
                });
            }
        }

        let mut reset = 0;
        for batch in 0..batch_size {
            if select_batch.map_or(true, |mask| mask[batch]) {
                self.reset_tree(batch);
                reset += 1;
            }
        }

        debug!(reset, batch_size, "Reset search trees");
        Ok(())
    }

    /// Reset every tree in the batch.
    pub fn reset_all(&mut self) -> Result<(), TreeError> {
        self.reset(None)
    }

    fn reset_tree(&mut self, batch: usize) {
        let nodes = self.node_row(batch);
        self.node_visits[nodes.clone()].fill(0);
        self.raw_values[nodes.clone()].fill(0.0);
        self.node_values[nodes.clone()].fill(0.0);
        self.parents[nodes.clone()].fill(NodeId::NO_PARENT);
        self.action_from_parent[nodes.clone()].fill(NO_ACTION);
        self.embeddings[nodes].fill_with(E::default);

        let edges = self.edge_row(batch);
        self.children_index[edges.clone()].fill(NodeId::UNVISITED);
        self.children_prior_logits[edges.clone()].fill(0.0);
        self.children_visits[edges.clone()].fill(0);
        self.children_rewards[edges.clone()].fill(0.0);
        self.children_discounts[edges.clone()].fill(0.0);
        self.children_values[edges].fill(0.0);

        let actions = self.action_row(batch);
        self.root_invalid_actions[actions].fill(false);
        self.next_node_index[batch] = 1;
    }
}
