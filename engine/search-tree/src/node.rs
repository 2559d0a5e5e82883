//! Node identifiers and sentinel conventions.
//!
//! Nodes live in flat per-tree arrays and are referenced by integer id.
//! Index-like fields (`parents`, `children_index`) store `NodeId`s, where a
//! negative id is a sentinel meaning "absent" rather than a slot.

use std::fmt;

/// Index into a tree's node arrays. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub i32);

impl NodeId {
    /// The root node is always at index 0.
    pub const ROOT: NodeId = NodeId(0);

    /// Parent of the root (and of unpopulated slots).
    pub const NO_PARENT: NodeId = NodeId(-1);

    /// Child slot of an action that has never been expanded.
    pub const UNVISITED: NodeId = NodeId(-1);

    /// Whether this id is a sentinel rather than a node slot.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        self.0 < 0
    }

    /// The slot index, or `None` for sentinels.
    #[inline]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        debug_assert!(index <= i32::MAX as usize, "node index {index} overflows i32");
        NodeId(index as i32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "-")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Value of `action_from_parent` for nodes without a parent.
pub const NO_ACTION: i32 = NodeId::NO_PARENT.0;
