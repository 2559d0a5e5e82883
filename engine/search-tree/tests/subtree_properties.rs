//! Property-based tests for subtree extraction, summaries and reset.
//!
//! Trees are grown at random by attaching each new node to a random
//! populated parent through one of its unexpanded actions, then:
//! - extraction keeps exactly the nodes reachable from the chosen child
//! - survivors keep their relative order
//! - the new root has no parent, no parent action and no invalid actions
//! - sentinels are never translated and real ids never become sentinels
//! - all propagation strategies produce the same tree
//! - reset of an empty tree changes nothing

use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use search_tree::{BatchTree, CompactionConfig, NodeId, Propagation, TreeShape, NO_ACTION};

/// Tolerance for probability sums
const PROB_TOLERANCE: f32 = 1e-5;

// =============================================================================
// Tree generation
// =============================================================================

/// Grow a batch of random trees. Every tree gets at least one root child.
fn random_tree(
    seed: u64,
    batch_size: usize,
    num_simulations: usize,
    num_actions: usize,
) -> BatchTree<[f32; 2], u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let shape = TreeShape::new(batch_size, num_simulations, num_actions);
    let mut tree = BatchTree::new(shape, 0u64).unwrap();

    for b in 0..batch_size {
        let first = rng.gen_range(0..num_actions);
        tree.add_child(b, NodeId::ROOT, first).unwrap();

        let target = rng.gen_range(1..=num_simulations);
        for _ in 1..target {
            let populated = tree.node_count(b);
            let parent = rng.gen_range(0..populated);
            let action = rng.gen_range(0..num_actions);
            // Occupied edges are simply skipped, keeping trees irregular
            if tree.child(b, parent, action) == NodeId::UNVISITED {
                tree.add_child(b, NodeId::from(parent), action).unwrap();
            }
        }

        for node in 0..tree.node_count(b) {
            let offset = tree.node_offset(b, node);
            tree.node_visits[offset] = rng.gen_range(0..100);
            tree.raw_values[offset] = rng.gen_range(-1.0..1.0);
            tree.node_values[offset] = rng.gen_range(-1.0..1.0);
            tree.embeddings[offset] = [offset as f32, rng.gen()];
            for e in tree.edges(b, node) {
                tree.children_prior_logits[e] = rng.gen_range(-2.0..2.0);
                tree.children_rewards[e] = rng.gen_range(-1.0..1.0);
                tree.children_discounts[e] = rng.gen_range(0.0..1.0);
                tree.children_values[e] = rng.gen_range(-1.0..1.0);
                if tree.children_index[e] != NodeId::UNVISITED {
                    tree.children_visits[e] = rng.gen_range(0..20);
                }
            }
        }

        let actions = tree.action_row(b);
        for a in actions {
            tree.root_invalid_actions[a] = rng.gen_bool(0.3);
        }
        tree.extra_data[b] = rng.gen();
    }

    tree
}

/// One expanded root action per tree.
fn expanded_root_actions(tree: &BatchTree<[f32; 2], u64>, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..tree.batch_size())
        .map(|b| {
            let expanded: Vec<usize> = (0..tree.num_actions())
                .filter(|&a| tree.child(b, 0, a) != NodeId::UNVISITED)
                .collect();
            expanded[rng.gen_range(0..expanded.len())]
        })
        .collect()
}

/// Old ids reachable from `start` through `children_index`, in ascending order.
fn reachable_from(tree: &BatchTree<[f32; 2], u64>, batch: usize, start: usize) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            for a in 0..tree.num_actions() {
                if let Some(child) = tree.child(batch, node, a).index() {
                    stack.push(child);
                }
            }
        }
    }
    seen.into_iter().collect()
}

// =============================================================================
// Strategies
// =============================================================================

fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

fn arb_batch_size() -> impl Strategy<Value = usize> {
    1usize..5
}

fn arb_simulations() -> impl Strategy<Value = usize> {
    1usize..40
}

fn arb_actions() -> impl Strategy<Value = usize> {
    1usize..6
}

// =============================================================================
// Subtree extraction
// =============================================================================

proptest! {
    /// Exactly the nodes reachable from the chosen child survive, in order.
    #[test]
    fn prop_extraction_keeps_reachable_nodes_in_order(
        seed in arb_seed(),
        batch_size in arb_batch_size(),
        sims in arb_simulations(),
        actions in arb_actions(),
    ) {
        let tree = random_tree(seed, batch_size, sims, actions);
        let choice = expanded_root_actions(&tree, seed ^ 1);
        let out = tree.extract_subtree(&choice).unwrap();

        for b in 0..batch_size {
            let child = tree.child(b, 0, choice[b]).index().unwrap();
            let expected = reachable_from(&tree, b, child);

            let t = tree.translation_for(b, choice[b], &CompactionConfig::default()).unwrap();
            prop_assert_eq!(t.old_indices(), &expected[..]);
            prop_assert_eq!(out.node_count(b), expected.len());

            // New slot j holds old node expected[j]
            for (new, &old) in expected.iter().enumerate() {
                let src = tree.node_offset(b, old);
                let dst = out.node_offset(b, new);
                prop_assert_eq!(out.node_values[dst], tree.node_values[src]);
                prop_assert_eq!(out.node_visits[dst], tree.node_visits[src]);
                prop_assert_eq!(out.embeddings[dst], tree.embeddings[src]);
                prop_assert_eq!(
                    &out.children_visits[out.edges(b, new)],
                    &tree.children_visits[tree.edges(b, old)]
                );
                prop_assert_eq!(
                    &out.children_values[out.edges(b, new)],
                    &tree.children_values[tree.edges(b, old)]
                );
            }
        }
    }

    /// The new root has no parent, no parent action and no invalid actions.
    #[test]
    fn prop_new_root_is_clean(
        seed in arb_seed(),
        batch_size in arb_batch_size(),
        sims in arb_simulations(),
        actions in arb_actions(),
    ) {
        let tree = random_tree(seed, batch_size, sims, actions);
        let choice = expanded_root_actions(&tree, seed);
        let out = tree.extract_subtree(&choice).unwrap();

        for b in 0..batch_size {
            prop_assert_eq!(out.parent(b, 0), NodeId::NO_PARENT);
            prop_assert_eq!(out.action_from_parent[out.node_offset(b, 0)], NO_ACTION);
        }
        prop_assert!(out.root_invalid_actions.iter().all(|&x| !x));
        prop_assert_eq!(&out.extra_data, &tree.extra_data);
        prop_assert!(out.validate().is_ok());
    }

    /// Links stay consistent and sentinels are neither created nor translated.
    #[test]
    fn prop_references_are_translated_consistently(
        seed in arb_seed(),
        batch_size in arb_batch_size(),
        sims in arb_simulations(),
        actions in arb_actions(),
    ) {
        let tree = random_tree(seed, batch_size, sims, actions);
        let choice = expanded_root_actions(&tree, seed.rotate_left(7));
        let out = tree.extract_subtree(&choice).unwrap();

        for b in 0..batch_size {
            let t = tree.translation_for(b, choice[b], &CompactionConfig::default()).unwrap();
            let count = out.node_count(b);

            for (new, &old) in t.old_indices().iter().enumerate() {
                for a in 0..actions {
                    let before = tree.child(b, old, a);
                    let after = out.child(b, new, a);
                    prop_assert_eq!(before.is_sentinel(), after.is_sentinel());
                    if let Some(idx) = after.index() {
                        prop_assert!(idx < count);
                        prop_assert_eq!(after, t.new_id(before));
                        prop_assert_eq!(out.parent(b, idx), NodeId::from(new));
                        prop_assert_eq!(
                            out.action_from_parent[out.node_offset(b, idx)],
                            a as i32
                        );
                    }
                }

                if new > 0 {
                    let parent = out.parent(b, new);
                    prop_assert!(!parent.is_sentinel());
                    prop_assert!(parent.0 < new as i32);
                }
            }

            for slot in count..out.num_nodes() {
                prop_assert_eq!(out.parent(b, slot), NodeId::NO_PARENT);
                prop_assert!((0..actions).all(|a| out.child(b, slot, a) == NodeId::UNVISITED));
                prop_assert_eq!(out.node_visits[out.node_offset(b, slot)], 0);
                prop_assert_eq!(out.embeddings[out.node_offset(b, slot)], [0.0, 0.0]);
            }
        }
    }

    /// Propagation strategy and parallelism do not change the result.
    #[test]
    fn prop_compaction_strategies_agree(
        seed in arb_seed(),
        batch_size in arb_batch_size(),
        sims in arb_simulations(),
        actions in arb_actions(),
    ) {
        let tree = random_tree(seed, batch_size, sims, actions);
        let choice = expanded_root_actions(&tree, seed);

        let reference = tree
            .extract_subtree_with(&choice, &CompactionConfig::serial())
            .unwrap();
        let converged = tree
            .extract_subtree_with(
                &choice,
                &CompactionConfig {
                    propagation: Propagation::UntilConverged,
                    parallel: true,
                },
            )
            .unwrap();
        prop_assert_eq!(&converged, &reference);
        prop_assert_eq!(&tree.extract_subtree(&choice).unwrap(), &reference);
    }
}

// =============================================================================
// Summary and reset
// =============================================================================

proptest! {
    /// Visit probabilities always form a distribution.
    #[test]
    fn prop_visit_probs_sum_to_one(
        seed in arb_seed(),
        batch_size in arb_batch_size(),
        sims in arb_simulations(),
        actions in arb_actions(),
    ) {
        let tree = random_tree(seed, batch_size, sims, actions);
        let summary = tree.summary().unwrap();

        prop_assert_eq!(summary.batch_size(), batch_size);
        for b in 0..batch_size {
            let total: f32 = summary.visit_probs[b].iter().sum();
            prop_assert!(
                (total - 1.0).abs() < PROB_TOLERANCE,
                "visit probs sum to {}",
                total
            );
            if summary.visit_counts[b].iter().all(|&c| c == 0.0) {
                let uniform = 1.0 / actions as f32;
                prop_assert!(summary.visit_probs[b].iter().all(|&p| (p - uniform).abs() < PROB_TOLERANCE));
            }
        }
    }

    /// Resetting a tree twice is the same as resetting it once, and a reset
    /// tree equals a fresh one apart from the caller payload.
    #[test]
    fn prop_reset_restores_empty_tree(
        seed in arb_seed(),
        batch_size in arb_batch_size(),
        sims in arb_simulations(),
        actions in arb_actions(),
    ) {
        let mut tree = random_tree(seed, batch_size, sims, actions);
        tree.reset_all().unwrap();

        let mut fresh = BatchTree::<[f32; 2], u64>::new(tree.shape(), 0).unwrap();
        fresh.extra_data = tree.extra_data.clone();
        prop_assert_eq!(&tree, &fresh);

        tree.reset_all().unwrap();
        prop_assert_eq!(&tree, &fresh);
    }
}
