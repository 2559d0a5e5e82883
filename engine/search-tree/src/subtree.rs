//! Re-rooting a batch of trees onto a child of each root.
//!
//! Extraction keeps only the nodes under the chosen child, makes that child
//! the new root and packs the survivors into slots `0..k` in their original
//! relative order. Every tree in the batch goes through the same steps:
//!
//! 1. Tag each node with the id of its highest ancestor below the root by
//!    propagating tags down parent links for a fixed number of rounds.
//! 2. Retain the nodes whose tag equals the chosen child's id.
//! 3. Number the survivors with a running count in ascending old-id order.
//! 4. Gather every field through that translation, rewriting node
//!    references and leaving sentinels alone.

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::config::{CompactionConfig, Propagation};
use crate::node::{NodeId, NO_ACTION};
use crate::tree::{BatchTree, TreeError};

/// Mapping from old node ids to new ones for a single tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeTranslation {
    /// Old id -> new id, `UNVISITED` for dropped nodes.
    translation: Vec<NodeId>,
    /// Old ids of the survivors in ascending order; the position is the new id.
    old_indices: Vec<usize>,
}

impl SubtreeTranslation {
    /// Build the translation for one tree.
    ///
    /// `parents` is the tree's `[N]` parent row and `subtree_root` the old id
    /// of the child that becomes the new root.
    pub fn new(parents: &[NodeId], subtree_root: usize, propagation: Propagation) -> Self {
        let tags = subtree_tags(parents, propagation);

        let mut translation = Vec::with_capacity(tags.len());
        let mut old_indices = Vec::new();
        for (old, &tag) in tags.iter().enumerate() {
            if tag == subtree_root {
                translation.push(NodeId::from(old_indices.len()));
                old_indices.push(old);
            } else {
                translation.push(NodeId::UNVISITED);
            }
        }

        Self {
            translation,
            old_indices,
        }
    }

    /// Translate a node reference. Sentinels map to themselves; dropped
    /// nodes map to `UNVISITED`.
    #[inline]
    pub fn new_id(&self, old: NodeId) -> NodeId {
        match old.index() {
            Some(idx) => self
                .translation
                .get(idx)
                .copied()
                .unwrap_or(NodeId::UNVISITED),
            None => old,
        }
    }

    #[inline]
    pub fn is_retained(&self, old: usize) -> bool {
        self.translation
            .get(old)
            .is_some_and(|id| !id.is_sentinel())
    }

    /// Old ids copied into new slots `0, 1, 2, ...`.
    #[inline]
    pub fn old_indices(&self) -> &[usize] {
        &self.old_indices
    }

    /// Number of surviving nodes, i.e. the new `next_node_index`.
    #[inline]
    pub fn new_next_node_index(&self) -> usize {
        self.old_indices.len()
    }
}

/// Tag every node with the id of its highest ancestor whose tag is positive.
///
/// Each round reads the previous round's tags only, so a round is a single
/// gather over the whole row. After `N - 1` rounds every parent chain has
/// been fully traversed.
fn subtree_tags(parents: &[NodeId], propagation: Propagation) -> Vec<usize> {
    let num_nodes = parents.len();
    let mut tags: Vec<usize> = (0..num_nodes).collect();
    let mut next = vec![0; num_nodes];

    for round in 0..num_nodes.saturating_sub(1) {
        let mut changed = false;
        for (i, parent) in parents.iter().enumerate() {
            let parent_tag = parent
                .index()
                .and_then(|p| tags.get(p).copied())
                .unwrap_or(0);
            next[i] = if parent_tag > 0 { parent_tag } else { tags[i] };
            changed |= next[i] != tags[i];
        }
        std::mem::swap(&mut tags, &mut next);

        if !changed && propagation == Propagation::UntilConverged {
            trace!(round, "Subtree tags converged");
            break;
        }
    }

    tags
}

/// Append the survivor rows of `row` to `out` in new-id order, then pad the
/// remaining slots with `null`.
fn gather_into<T: Clone>(
    out: &mut Vec<T>,
    row: &[T],
    width: usize,
    translation: &SubtreeTranslation,
    null: &T,
) {
    let num_nodes = row.len() / width;
    for &old in translation.old_indices() {
        out.extend_from_slice(&row[old * width..(old + 1) * width]);
    }
    let erased = num_nodes - translation.new_next_node_index();
    out.extend(std::iter::repeat(null).take(erased * width).cloned());
}

/// Like [`gather_into`], but each copied id is itself translated.
fn gather_ids_into(
    out: &mut Vec<NodeId>,
    row: &[NodeId],
    width: usize,
    translation: &SubtreeTranslation,
    null: NodeId,
) {
    let num_nodes = row.len() / width;
    for &old in translation.old_indices() {
        out.extend(
            row[old * width..(old + 1) * width]
                .iter()
                .map(|&id| translation.new_id(id)),
        );
    }
    let erased = num_nodes - translation.new_next_node_index();
    out.extend(std::iter::repeat(null).take(erased * width));
}

impl<E, X> BatchTree<E, X> {
    /// Old id of the child reached from the root of tree `batch` by `action`.
    fn subtree_root(&self, batch: usize, action: usize) -> Result<usize, TreeError> {
        self.check_action(action)?;
        let child = self.child(batch, NodeId::ROOT.0 as usize, action);
        match child.index() {
            Some(idx) if idx < self.num_nodes() => Ok(idx),
            Some(idx) => Err(TreeError::NodeOutOfRange {
                node: idx,
                limit: self.num_nodes(),
            }),
            None => Err(TreeError::UnexpandedAction { batch, action }),
        }
    }

    /// Translation for re-rooting tree `batch` onto the child reached by
    /// `action`.
    pub fn translation_for(
        &self,
        batch: usize,
        action: usize,
        config: &CompactionConfig,
    ) -> Result<SubtreeTranslation, TreeError> {
        self.validate()?;
        self.check_batch(batch)?;
        let subtree_root = self.subtree_root(batch, action)?;
        Ok(SubtreeTranslation::new(
            &self.parents[self.node_row(batch)],
            subtree_root,
            config.propagation,
        ))
    }

    fn translations(
        &self,
        child_actions: &[usize],
        config: &CompactionConfig,
    ) -> Result<Vec<SubtreeTranslation>, TreeError> {
        let batch_size = self.infer_batch_size()?;
        if child_actions.len() != batch_size {
            return Err(TreeError::ShapeMismatch {
                field: "child_index",
                expected: batch_size,
                actual: child_actions.len(),
            });
        }

        let roots = child_actions
            .iter()
            .enumerate()
            .map(|(batch, &action)| self.subtree_root(batch, action))
            .collect::<Result<Vec<_>, _>>()?;

        let parents = &self.parents;
        let num_nodes = self.num_nodes();
        let propagation = config.propagation;
        let translate = |(batch, &root): (usize, &usize)| {
            let row = &parents[batch * num_nodes..(batch + 1) * num_nodes];
            SubtreeTranslation::new(row, root, propagation)
        };

        Ok(if config.parallel {
            roots.par_iter().enumerate().map(translate).collect()
        } else {
            roots.iter().enumerate().map(translate).collect()
        })
    }
}

impl<E: Clone + Default, X: Clone> BatchTree<E, X> {
    /// Extract the subtree under `children_index[ROOT, child_actions[b]]`
    /// of every tree `b`, using the default [`CompactionConfig`].
    ///
    /// The input is left untouched; capacity is unchanged.
    pub fn extract_subtree(&self, child_actions: &[usize]) -> Result<Self, TreeError> {
        self.extract_subtree_with(child_actions, &CompactionConfig::default())
    }

    /// Extract subtrees with explicit compaction settings.
    ///
    /// Fails without doing any work if `child_actions` does not have one
    /// entry per tree or names an action that was never expanded at a root.
    pub fn extract_subtree_with(
        &self,
        child_actions: &[usize],
        config: &CompactionConfig,
    ) -> Result<Self, TreeError> {
        let translations = self.translations(child_actions, config)?;

        let shape = self.shape();
        let a = shape.num_actions;
        let node_len = shape.batch_size * shape.num_nodes;
        let edge_len = node_len * a;

        let mut out = Self {
            shape,
            node_visits: Vec::with_capacity(node_len),
            raw_values: Vec::with_capacity(node_len),
            node_values: Vec::with_capacity(node_len),
            parents: Vec::with_capacity(node_len),
            action_from_parent: Vec::with_capacity(node_len),
            children_index: Vec::with_capacity(edge_len),
            children_prior_logits: Vec::with_capacity(edge_len),
            children_visits: Vec::with_capacity(edge_len),
            children_rewards: Vec::with_capacity(edge_len),
            children_discounts: Vec::with_capacity(edge_len),
            children_values: Vec::with_capacity(edge_len),
            next_node_index: Vec::with_capacity(shape.batch_size),
            embeddings: Vec::with_capacity(node_len),
            // A fresh root never inherits the old root's restrictions
            root_invalid_actions: vec![false; shape.batch_size * a],
            extra_data: self.extra_data.clone(),
        };
        let zero_embedding = E::default();

        for (b, t) in translations.iter().enumerate() {
            let nodes = self.node_row(b);
            let edges = self.edge_row(b);

            gather_into(&mut out.node_visits, &self.node_visits[nodes.clone()], 1, t, &0);
            gather_into(&mut out.raw_values, &self.raw_values[nodes.clone()], 1, t, &0.0);
            gather_into(&mut out.node_values, &self.node_values[nodes.clone()], 1, t, &0.0);
            gather_into(
                &mut out.embeddings,
                &self.embeddings[nodes.clone()],
                1,
                t,
                &zero_embedding,
            );

            // The old root is never retained, so the new root's parent
            // already translates to NO_PARENT; pin it regardless.
            let new_root = out.parents.len();
            gather_ids_into(
                &mut out.parents,
                &self.parents[nodes.clone()],
                1,
                t,
                NodeId::NO_PARENT,
            );
            out.parents[new_root] = NodeId::NO_PARENT;

            gather_into(
                &mut out.action_from_parent,
                &self.action_from_parent[nodes],
                1,
                t,
                &NO_ACTION,
            );
            out.action_from_parent[new_root] = NO_ACTION;

            gather_ids_into(
                &mut out.children_index,
                &self.children_index[edges.clone()],
                a,
                t,
                NodeId::UNVISITED,
            );
            gather_into(
                &mut out.children_prior_logits,
                &self.children_prior_logits[edges.clone()],
                a,
                t,
                &0.0,
            );
            gather_into(
                &mut out.children_visits,
                &self.children_visits[edges.clone()],
                a,
                t,
                &0,
            );
            gather_into(
                &mut out.children_rewards,
                &self.children_rewards[edges.clone()],
                a,
                t,
                &0.0,
            );
            gather_into(
                &mut out.children_discounts,
                &self.children_discounts[edges.clone()],
                a,
                t,
                &0.0,
            );
            gather_into(
                &mut out.children_values,
                &self.children_values[edges],
                a,
                t,
                &0.0,
            );

            out.next_node_index.push(t.new_next_node_index() as u32);

            trace!(
                batch = b,
                action = child_actions[b],
                retained = t.new_next_node_index(),
                dropped = self.node_count(b).saturating_sub(t.new_next_node_index()),
                "Extracted subtree"
            );
        }

        debug!(
            batch_size = shape.batch_size,
            propagation = %config.propagation,
            parallel = config.parallel,
            retained = ?out.next_node_index,
            "Re-rooted batch"
        );

        Ok(out)
    }

    /// Re-root every tree in place. On error the tree is unchanged.
    pub fn reroot(&mut self, child_actions: &[usize]) -> Result<(), TreeError> {
        *self = self.extract_subtree(child_actions)?;
        Ok(())
    }
}
