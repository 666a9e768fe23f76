#![forbid(unsafe_code)]

//! One-dimensional segment trees.
//!
//! A [`SegmentTree`] owns its nodes in an arena keyed by [`NodeId`]; parent
//! and child references are ids, so the no-cycle invariant is enforced
//! structurally at link time rather than by ownership. Each node carries its
//! immutable [`SegmentConfig`], the solver-owned [`SegmentContent`], and
//! cached [`SegmentAggregates`] over its direct children so `Auto` lengths
//! resolve in O(1) during a solve.
//!
//! Aggregates are maintained on every link/unlink by walking the affected
//! ancestor chain; `greater_*` maxima are recomputed from the surviving
//! children since a max cannot be reversed incrementally.

use std::collections::BTreeMap;

use discadelta_core::geometry::clamp_length;
use discadelta_core::{Length, trace};

use crate::distribute::{DistributeEntry, distribute};
use crate::node::{NodeId, NodeIdAllocator, TreeError};

/// Immutable per-node declaration.
///
/// Only [`order`](Self::order) may change after creation (via
/// [`SegmentTree::set_order`]); it is placement-only and carries no aggregate
/// dependency. All other fields feed cached aggregates, so rewriting them
/// would require an unlink/link round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentConfig {
    /// Identifier for debugging and driver lookups.
    pub name: String,
    /// Declared length on the main axis.
    pub base: Length,
    /// Hard lower clamp.
    pub min: f32,
    /// Hard upper clamp; may be infinite.
    pub max: f32,
    /// Share of `base` that compression may remove, non-negative.
    pub flex_compress: f32,
    /// Weight for sharing expansion surplus, non-negative.
    pub flex_expand: f32,
    /// Rendering order; lower places first, declaration order breaks ties.
    pub order: i32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base: Length::Flat(0.0),
            min: 0.0,
            max: f32::INFINITY,
            flex_compress: 1.0,
            flex_expand: 1.0,
            order: 0,
        }
    }
}

impl SegmentConfig {
    /// Start a config with a name and defaults everywhere else.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the declared base length.
    #[must_use]
    pub fn base(mut self, base: Length) -> Self {
        self.base = base;
        self
    }

    /// Set the hard clamps.
    #[must_use]
    pub fn bounds(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set both flex weights.
    #[must_use]
    pub fn flex(mut self, compress: f32, expand: f32) -> Self {
        self.flex_compress = compress;
        self.flex_expand = expand;
        self
    }

    /// Set the rendering order.
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Force the declaration into a consistent state.
    ///
    /// `min <= base <= max` holds afterwards (for the `Auto` fallback too),
    /// and flex weights are non-negative.
    fn normalized(mut self) -> Self {
        self.min = self.min.max(0.0);
        self.max = self.max.max(self.min);
        self.base = match self.base {
            Length::Flat(v) => Length::Flat(clamp_length(v, self.min, self.max)),
            Length::Auto { fallback } => Length::Auto {
                fallback: clamp_length(fallback, self.min, self.max),
            },
        };
        self.flex_compress = self.flex_compress.max(0.0);
        self.flex_expand = self.flex_expand.max(0.0);
        self
    }
}

/// Mutable solver output for one node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentContent {
    /// Resolved base after compression (the declared base otherwise).
    pub base: f32,
    /// Contribution of the expansion pass.
    pub expand_delta: f32,
    /// Resolved main-axis length.
    pub distance: f32,
    /// Main-axis position, absolute from the placement origin.
    pub offset: f32,
}

/// Cached aggregates over a node's direct children.
///
/// `accumulate_*` are sums, `greater_*` are maxima; bases are *effective*
/// (recursively `Auto`-resolved and clamped).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentAggregates {
    /// Sum of the children's effective bases.
    pub accumulate_base: f32,
    /// Sum of the children's min clamps.
    pub accumulate_min: f32,
    /// Sum of the children's expand weights.
    pub accumulate_expand_ratio: f32,
    /// Sum of the children's compression-resistant portions.
    pub compress_solidify: f32,
    /// Sum of the children's compressible portions.
    pub compress_capacity: f32,
    /// Largest effective base among the children.
    pub greater_base: f32,
    /// Largest min clamp among the children.
    pub greater_min: f32,
}

#[derive(Debug, Clone)]
struct SegmentNode {
    config: SegmentConfig,
    content: SegmentContent,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: u32,
    branch_count: u64,
    aggregates: SegmentAggregates,
}

impl SegmentNode {
    fn new(config: SegmentConfig) -> Self {
        Self {
            config,
            content: SegmentContent::default(),
            parent: None,
            children: Vec::new(),
            depth: 0,
            branch_count: 0,
            aggregates: SegmentAggregates::default(),
        }
    }

    /// The length this node contributes to its parent's axis before solving.
    ///
    /// `Auto` resolves to the accumulated child bases, or to the declared
    /// fallback for a childless node.
    fn effective_base(&self) -> f32 {
        let raw = match self.config.base {
            Length::Flat(v) => v,
            Length::Auto { fallback } => {
                if self.children.is_empty() {
                    fallback
                } else {
                    self.aggregates.accumulate_base
                }
            }
        };
        clamp_length(raw, self.config.min, self.config.max)
    }
}

/// An arena-owned tree of 1D segments.
#[derive(Debug, Clone, Default)]
pub struct SegmentTree {
    nodes: BTreeMap<NodeId, SegmentNode>,
    ids: NodeIdAllocator,
}

impl SegmentTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validate and insert a detached node, returning its handle.
    pub fn create(&mut self, config: SegmentConfig) -> Result<NodeId, TreeError> {
        let id = self.ids.allocate()?;
        self.nodes.insert(id, SegmentNode::new(config.normalized()));
        Ok(id)
    }

    fn get(&self, id: NodeId) -> Result<&SegmentNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::UnknownNode { id })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut SegmentNode, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode { id })
    }

    /// The node's normalized declaration.
    pub fn config(&self, id: NodeId) -> Result<&SegmentConfig, TreeError> {
        Ok(&self.get(id)?.config)
    }

    /// The node's latest solver output.
    pub fn content(&self, id: NodeId) -> Result<&SegmentContent, TreeError> {
        Ok(&self.get(id)?.content)
    }

    /// The node's parent, if linked.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.get(id)?.parent)
    }

    /// The node's children in declared order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        Ok(&self.get(id)?.children)
    }

    /// Distance from the node's root (roots are at depth 0).
    pub fn depth(&self, id: NodeId) -> Result<u32, TreeError> {
        Ok(self.get(id)?.depth)
    }

    /// Total number of descendants.
    pub fn branch_count(&self, id: NodeId) -> Result<u64, TreeError> {
        Ok(self.get(id)?.branch_count)
    }

    /// Cached aggregates over the node's direct children.
    pub fn aggregates(&self, id: NodeId) -> Result<&SegmentAggregates, TreeError> {
        Ok(&self.get(id)?.aggregates)
    }

    /// The node's effective (Auto-resolved, clamped) base length.
    pub fn effective_base(&self, id: NodeId) -> Result<f32, TreeError> {
        Ok(self.get(id)?.effective_base())
    }

    /// Attach `child` under `parent`, unlinking it from any previous parent.
    ///
    /// Fails without mutating the tree if the link would form a cycle.
    pub fn link(&mut self, child: NodeId, parent: NodeId) -> Result<(), TreeError> {
        self.get(child)?;
        self.get(parent)?;
        if child == parent {
            return Err(TreeError::SelfLink { id: child });
        }
        // Reject if `parent` already sits inside `child`'s subtree.
        let mut probe = self.get(parent)?.parent;
        while let Some(ancestor) = probe {
            if ancestor == child {
                return Err(TreeError::LinkWouldCycle { child, parent });
            }
            probe = self.get(ancestor)?.parent;
        }

        self.detach(child)?;
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        let child_depth = self.get(parent)?.depth + 1;
        self.assign_depths(child, child_depth)?;
        self.refresh_upwards(Some(parent))?;
        trace!(child = child.get(), parent = parent.get(), "segment linked");
        Ok(())
    }

    /// Detach a node from its parent; a no-op for roots.
    pub fn unlink(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.get(id)?;
        self.detach(id)
    }

    /// Destroy a node. Its children survive as detached roots.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.get(id)?;
        self.detach(id)?;
        let children = self.get(id)?.children.clone();
        for child in children {
            self.get_mut(child)?.parent = None;
            self.assign_depths(child, 0)?;
        }
        self.nodes.remove(&id);
        Ok(())
    }

    /// Rewrite the rendering order. Takes effect on the next placement.
    pub fn set_order(&mut self, id: NodeId, order: i32) -> Result<(), TreeError> {
        self.get_mut(id)?.config.order = order;
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent_id) = self.get(id)?.parent else {
            return Ok(());
        };
        self.get_mut(parent_id)?.children.retain(|&c| c != id);
        self.get_mut(id)?.parent = None;
        self.assign_depths(id, 0)?;
        self.refresh_upwards(Some(parent_id))?;
        Ok(())
    }

    fn assign_depths(&mut self, id: NodeId, depth: u32) -> Result<(), TreeError> {
        let mut stack = vec![(id, depth)];
        while let Some((node_id, node_depth)) = stack.pop() {
            let node = self.get_mut(node_id)?;
            node.depth = node_depth;
            for &child in &node.children {
                stack.push((child, node_depth + 1));
            }
        }
        Ok(())
    }

    /// Recompute cached aggregates from `start` up to its root.
    ///
    /// Effective bases change transitively through `Auto` ancestors, so the
    /// whole chain is refreshed; each step scans direct children only.
    fn refresh_upwards(&mut self, start: Option<NodeId>) -> Result<(), TreeError> {
        let mut cursor = start;
        while let Some(id) = cursor {
            self.refresh_aggregates(id)?;
            cursor = self.get(id)?.parent;
        }
        Ok(())
    }

    fn refresh_aggregates(&mut self, id: NodeId) -> Result<(), TreeError> {
        let children = self.get(id)?.children.clone();
        let mut aggregates = SegmentAggregates::default();
        let mut branches = 0u64;
        for child_id in children {
            let child = self.get(child_id)?;
            let effective = child.effective_base();
            let capacity = effective * child.config.flex_compress;
            aggregates.accumulate_base += effective;
            aggregates.accumulate_min += child.config.min;
            aggregates.accumulate_expand_ratio += child.config.flex_expand;
            aggregates.compress_capacity += capacity;
            aggregates.compress_solidify += (effective - capacity).max(0.0);
            aggregates.greater_base = aggregates.greater_base.max(effective);
            aggregates.greater_min = aggregates.greater_min.max(child.config.min);
            branches += 1 + child.branch_count;
        }
        let node = self.get_mut(id)?;
        node.aggregates = aggregates;
        node.branch_count = branches;
        Ok(())
    }

    /// Resolve every distance in `root`'s subtree against `target`.
    ///
    /// An `Auto` target resolves from the root's own subtree (or the target's
    /// fallback for a childless root). The root's distance is clamped into
    /// its own bounds; children then tile it exactly, clamp feasibility
    /// permitting.
    pub fn solve_sizes(&mut self, root: NodeId, target: Length) -> Result<(), TreeError> {
        let node = self.get(root)?;
        let resolved = match target {
            Length::Flat(v) => v.max(0.0),
            Length::Auto { fallback } => {
                if node.children.is_empty() {
                    fallback
                } else {
                    node.aggregates.accumulate_base
                }
            }
        };
        let distance = clamp_length(resolved, node.config.min, node.config.max);
        trace!(root = root.get(), distance, "solving segment sizes");
        let content = &mut self.get_mut(root)?.content;
        content.base = distance;
        content.expand_delta = 0.0;
        content.distance = distance;
        self.solve_children(root)
    }

    fn solve_children(&mut self, parent: NodeId) -> Result<(), TreeError> {
        let parent_node = self.get(parent)?;
        if parent_node.children.is_empty() {
            return Ok(());
        }
        let target = parent_node.content.distance;
        let children = parent_node.children.clone();

        let mut entries = Vec::with_capacity(children.len());
        for &child_id in &children {
            let child = self.get(child_id)?;
            entries.push(DistributeEntry::new(
                child.effective_base(),
                child.config.min,
                child.config.max,
                child.config.flex_compress,
                child.config.flex_expand,
            ));
        }
        let shares = distribute(target, &entries);
        for (&child_id, share) in children.iter().zip(&shares) {
            let content = &mut self.get_mut(child_id)?.content;
            content.base = share.base;
            content.expand_delta = share.expand_delta;
            content.distance = share.distance;
        }
        for &child_id in &children {
            self.solve_children(child_id)?;
        }
        Ok(())
    }

    /// Assign offsets through `root`'s subtree, sweeping in rendering order.
    ///
    /// With `round`, every edge is rounded independently in absolute
    /// coordinates and each distance becomes the difference of its rounded
    /// edges, so siblings keep tiling exactly and no drift accumulates.
    pub fn place(&mut self, root: NodeId, origin: f32, round: bool) -> Result<(), TreeError> {
        let distance = self.get(root)?.content.distance;
        let content = &mut self.get_mut(root)?.content;
        if round {
            content.offset = origin.round();
            content.distance = (origin + distance).round() - origin.round();
        } else {
            content.offset = origin;
        }
        self.place_children(root, origin, round)
    }

    fn place_children(&mut self, parent: NodeId, origin: f32, round: bool) -> Result<(), TreeError> {
        let parent_node = self.get(parent)?;
        if parent_node.children.is_empty() {
            return Ok(());
        }
        let mut ordered = Vec::with_capacity(parent_node.children.len());
        for &child_id in &parent_node.children {
            ordered.push((self.get(child_id)?.config.order, child_id));
        }
        // Stable: declared order breaks order ties.
        ordered.sort_by_key(|&(order, _)| order);

        let mut cursor = origin;
        for (_, child_id) in ordered {
            let distance = self.get(child_id)?.content.distance;
            let end = cursor + distance;
            let content = &mut self.get_mut(child_id)?.content;
            if round {
                content.offset = cursor.round();
                content.distance = end.round() - cursor.round();
            } else {
                content.offset = cursor;
            }
            self.place_children(child_id, cursor, round)?;
            cursor = end;
        }
        Ok(())
    }

    /// Size then place in one call.
    pub fn solve(
        &mut self,
        root: NodeId,
        target: Length,
        origin: f32,
        round: bool,
    ) -> Result<(), TreeError> {
        self.solve_sizes(root, target)?;
        self.place(root, origin, round)
    }
}
