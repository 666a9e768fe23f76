#![forbid(unsafe_code)]

//! Node handles and tree-structure errors shared by the 1D and 2D trees.

use std::fmt;

/// Stable identifier for tree nodes.
///
/// `0` is reserved/invalid so IDs are always non-zero. IDs are allocated per
/// tree and are never reused within one tree's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Lowest valid node ID.
    pub const MIN: Self = Self(1);

    /// Create a new node ID, rejecting 0.
    pub fn new(raw: u64) -> Result<Self, TreeError> {
        if raw == 0 {
            return Err(TreeError::ZeroNodeId);
        }
        Ok(Self(raw))
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Return the next ID, or an error on overflow.
    pub fn checked_next(self) -> Result<Self, TreeError> {
        let Some(next) = self.0.checked_add(1) else {
            return Err(TreeError::NodeIdOverflow { current: self });
        };
        Self::new(next)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator for [`NodeId`]s.
#[derive(Debug, Clone)]
pub(crate) struct NodeIdAllocator {
    next: NodeId,
}

impl NodeIdAllocator {
    /// Hand out the next ID.
    pub(crate) fn allocate(&mut self) -> Result<NodeId, TreeError> {
        let current = self.next;
        self.next = self.next.checked_next()?;
        Ok(current)
    }
}

impl Default for NodeIdAllocator {
    fn default() -> Self {
        Self { next: NodeId::MIN }
    }
}

/// Structural errors for tree mutation.
///
/// Invalid *configurations* are never errors (they are normalized on
/// ingestion); only structural misuse of the tree itself is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// An ID of 0 was supplied.
    ZeroNodeId,
    /// The ID does not name a live node in this tree.
    UnknownNode { id: NodeId },
    /// A node cannot be linked to itself.
    SelfLink { id: NodeId },
    /// Linking would make the parent a descendant of itself.
    LinkWouldCycle { child: NodeId, parent: NodeId },
    /// The ID space is exhausted.
    NodeIdOverflow { current: NodeId },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroNodeId => write!(f, "node id 0 is invalid"),
            Self::UnknownNode { id } => write!(f, "node {id} not found in this tree"),
            Self::SelfLink { id } => write!(f, "node {id} cannot be its own parent"),
            Self::LinkWouldCycle { child, parent } => write!(
                f,
                "linking {child} under {parent} would create a cycle"
            ),
            Self::NodeIdOverflow { current } => {
                write!(f, "node id overflow after {current}")
            }
        }
    }
}

impl std::error::Error for TreeError {}
