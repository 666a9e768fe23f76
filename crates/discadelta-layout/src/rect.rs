#![forbid(unsafe_code)]

//! Two-dimensional rect trees.
//!
//! A [`RectTree`] is the planar variant of [`SegmentTree`](crate::SegmentTree):
//! every container declares a [`FlexDirection`] picking which of its two axes
//! children tile along (the main axis); the perpendicular cross axis is sized
//! per child, never stretched. The axes interact only through `Auto` lengths:
//! a node's auto extent accumulates its own subtree, summing along the node's
//! main axis and taking the maximum across it.
//!
//! Distribution along the main axis reuses the flat
//! [`distribute`](crate::distribute) solver; clamps and flex weights apply to
//! whichever axis is main for the parent at hand.

use std::collections::BTreeMap;

use discadelta_core::geometry::clamp_length;
use discadelta_core::{FlexDirection, Length, trace};

use crate::distribute::{DistributeEntry, distribute};
use crate::node::{NodeId, NodeIdAllocator, TreeError};

/// Immutable per-node declaration for the 2D tree.
///
/// As with the 1D config, only `order` may be rewritten post-creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RectConfig {
    /// Identifier for debugging and driver lookups.
    pub name: String,
    /// Declared width.
    pub width: Length,
    /// Hard lower clamp on width.
    pub width_min: f32,
    /// Hard upper clamp on width; may be infinite.
    pub width_max: f32,
    /// Declared height.
    pub height: Length,
    /// Hard lower clamp on height.
    pub height_min: f32,
    /// Hard upper clamp on height; may be infinite.
    pub height_max: f32,
    /// Axis this node's children tile along.
    pub direction: FlexDirection,
    /// Share of the main-axis base that compression may remove.
    pub flex_compress: f32,
    /// Weight for sharing main-axis expansion surplus.
    pub flex_expand: f32,
    /// Rendering order; lower places first, declaration order breaks ties.
    pub order: i32,
}

impl Default for RectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            width: Length::Flat(0.0),
            width_min: 0.0,
            width_max: f32::INFINITY,
            height: Length::Flat(0.0),
            height_min: 0.0,
            height_max: f32::INFINITY,
            direction: FlexDirection::Row,
            flex_compress: 1.0,
            flex_expand: 1.0,
            order: 0,
        }
    }
}

impl RectConfig {
    /// Start a config with a name and defaults everywhere else.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the declared width.
    #[must_use]
    pub fn width(mut self, width: Length) -> Self {
        self.width = width;
        self
    }

    /// Set the width clamps.
    #[must_use]
    pub fn width_bounds(mut self, min: f32, max: f32) -> Self {
        self.width_min = min;
        self.width_max = max;
        self
    }

    /// Set the declared height.
    #[must_use]
    pub fn height(mut self, height: Length) -> Self {
        self.height = height;
        self
    }

    /// Set the height clamps.
    #[must_use]
    pub fn height_bounds(mut self, min: f32, max: f32) -> Self {
        self.height_min = min;
        self.height_max = max;
        self
    }

    /// Set the tiling direction.
    #[must_use]
    pub fn direction(mut self, direction: FlexDirection) -> Self {
        self.direction = direction;
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

    fn normalized(mut self) -> Self {
        self.width_min = self.width_min.max(0.0);
        self.width_max = self.width_max.max(self.width_min);
        self.width = normalize_length(self.width, self.width_min, self.width_max);
        self.height_min = self.height_min.max(0.0);
        self.height_max = self.height_max.max(self.height_min);
        self.height = normalize_length(self.height, self.height_min, self.height_max);
        self.flex_compress = self.flex_compress.max(0.0);
        self.flex_expand = self.flex_expand.max(0.0);
        self
    }
}

fn normalize_length(length: Length, min: f32, max: f32) -> Length {
    match length {
        Length::Flat(v) => Length::Flat(clamp_length(v, min, max)),
        Length::Auto { fallback } => Length::Auto {
            fallback: clamp_length(fallback, min, max),
        },
    }
}

/// Mutable solver output for one rect node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectContent {
    /// Resolved width.
    pub width: f32,
    /// Resolved height.
    pub height: f32,
    /// Horizontal position, absolute from the placement origin.
    pub x: f32,
    /// Vertical position, absolute from the placement origin.
    pub y: f32,
}

/// Cached aggregates for one axis over a node's direct children.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisAggregates {
    /// Sum of the children's effective extents on this axis.
    pub accumulate_base: f32,
    /// Largest effective extent among the children.
    pub greater_base: f32,
    /// Sum of the children's min clamps.
    pub accumulate_min: f32,
    /// Largest min clamp among the children.
    pub greater_min: f32,
}

/// Per-axis aggregates plus the shared expansion pool.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectAggregates {
    /// Width-axis sums and maxima.
    pub width: AxisAggregates,
    /// Height-axis sums and maxima.
    pub height: AxisAggregates,
    /// Sum of the children's expand weights.
    pub accumulate_expand_ratio: f32,
}

#[derive(Debug, Clone)]
struct RectNode {
    config: RectConfig,
    content: RectContent,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: u32,
    branch_count: u64,
    aggregates: RectAggregates,
}

impl RectNode {
    fn new(config: RectConfig) -> Self {
        Self {
            config,
            content: RectContent::default(),
            parent: None,
            children: Vec::new(),
            depth: 0,
            branch_count: 0,
            aggregates: RectAggregates::default(),
        }
    }

    /// Effective width: `Auto` accumulates the subtree, summing when this
    /// node tiles horizontally and taking the widest child otherwise.
    fn effective_width(&self) -> f32 {
        let raw = match self.config.width {
            Length::Flat(v) => v,
            Length::Auto { fallback } => {
                if self.children.is_empty() {
                    fallback
                } else if self.config.direction.is_row() {
                    self.aggregates.width.accumulate_base
                } else {
                    self.aggregates.width.greater_base
                }
            }
        };
        clamp_length(raw, self.config.width_min, self.config.width_max)
    }

    /// Effective height, symmetric to [`Self::effective_width`].
    fn effective_height(&self) -> f32 {
        let raw = match self.config.height {
            Length::Flat(v) => v,
            Length::Auto { fallback } => {
                if self.children.is_empty() {
                    fallback
                } else if self.config.direction.is_row() {
                    self.aggregates.height.greater_base
                } else {
                    self.aggregates.height.accumulate_base
                }
            }
        };
        clamp_length(raw, self.config.height_min, self.config.height_max)
    }
}

/// An arena-owned tree of 2D rects.
#[derive(Debug, Clone, Default)]
pub struct RectTree {
    nodes: BTreeMap<NodeId, RectNode>,
    ids: NodeIdAllocator,
}

impl RectTree {
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
    pub fn create(&mut self, config: RectConfig) -> Result<NodeId, TreeError> {
        let id = self.ids.allocate()?;
        self.nodes.insert(id, RectNode::new(config.normalized()));
        Ok(id)
    }

    fn get(&self, id: NodeId) -> Result<&RectNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::UnknownNode { id })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut RectNode, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode { id })
    }

    /// The node's normalized declaration.
    pub fn config(&self, id: NodeId) -> Result<&RectConfig, TreeError> {
        Ok(&self.get(id)?.config)
    }

    /// The node's latest solver output.
    pub fn content(&self, id: NodeId) -> Result<&RectContent, TreeError> {
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
    pub fn aggregates(&self, id: NodeId) -> Result<&RectAggregates, TreeError> {
        Ok(&self.get(id)?.aggregates)
    }

    /// The node's effective (Auto-resolved, clamped) width.
    pub fn effective_width(&self, id: NodeId) -> Result<f32, TreeError> {
        Ok(self.get(id)?.effective_width())
    }

    /// The node's effective (Auto-resolved, clamped) height.
    pub fn effective_height(&self, id: NodeId) -> Result<f32, TreeError> {
        Ok(self.get(id)?.effective_height())
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
        trace!(child = child.get(), parent = parent.get(), "rect linked");
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
        let mut aggregates = RectAggregates::default();
        let mut branches = 0u64;
        for child_id in children {
            let child = self.get(child_id)?;
            let width = child.effective_width();
            let height = child.effective_height();
            aggregates.width.accumulate_base += width;
            aggregates.width.greater_base = aggregates.width.greater_base.max(width);
            aggregates.width.accumulate_min += child.config.width_min;
            aggregates.width.greater_min =
                aggregates.width.greater_min.max(child.config.width_min);
            aggregates.height.accumulate_base += height;
            aggregates.height.greater_base = aggregates.height.greater_base.max(height);
            aggregates.height.accumulate_min += child.config.height_min;
            aggregates.height.greater_min =
                aggregates.height.greater_min.max(child.config.height_min);
            aggregates.accumulate_expand_ratio += child.config.flex_expand;
            branches += 1 + child.branch_count;
        }
        let node = self.get_mut(id)?;
        node.aggregates = aggregates;
        node.branch_count = branches;
        Ok(())
    }

    /// Resolve every width and height in `root`'s subtree.
    ///
    /// Each target is a [`Length`]; `Auto` targets resolve from the root's
    /// own subtree the same way an `Auto` declaration would (scenario: a row
    /// root over column-stacked content gets the content's total depth).
    pub fn solve_sizes(
        &mut self,
        root: NodeId,
        target_width: Length,
        target_height: Length,
    ) -> Result<(), TreeError> {
        let node = self.get(root)?;
        let width = clamp_length(
            resolve_target(node, target_width, true),
            node.config.width_min,
            node.config.width_max,
        );
        let height = clamp_length(
            resolve_target(node, target_height, false),
            node.config.height_min,
            node.config.height_max,
        );
        trace!(root = root.get(), width, height, "solving rect sizes");
        let content = &mut self.get_mut(root)?.content;
        content.width = width;
        content.height = height;
        self.solve_children(root)
    }

    fn solve_children(&mut self, parent: NodeId) -> Result<(), TreeError> {
        let parent_node = self.get(parent)?;
        if parent_node.children.is_empty() {
            return Ok(());
        }
        let direction = parent_node.config.direction;
        let main_target =
            direction.main(parent_node.content.width, parent_node.content.height);
        let children = parent_node.children.clone();

        let mut entries = Vec::with_capacity(children.len());
        for &child_id in &children {
            let child = self.get(child_id)?;
            let entry = if direction.is_row() {
                DistributeEntry::new(
                    child.effective_width(),
                    child.config.width_min,
                    child.config.width_max,
                    child.config.flex_compress,
                    child.config.flex_expand,
                )
            } else {
                DistributeEntry::new(
                    child.effective_height(),
                    child.config.height_min,
                    child.config.height_max,
                    child.config.flex_compress,
                    child.config.flex_expand,
                )
            };
            entries.push(entry);
        }
        let shares = distribute(main_target, &entries);

        for (&child_id, share) in children.iter().zip(&shares) {
            // Cross extents come from the child's own subtree; the solver
            // never stretches a child across its parent.
            let child = self.get(child_id)?;
            let (width, height) = if direction.is_row() {
                (share.distance, child.effective_height())
            } else {
                (child.effective_width(), share.distance)
            };
            let content = &mut self.get_mut(child_id)?.content;
            content.width = width;
            content.height = height;
        }
        for &child_id in &children {
            self.solve_children(child_id)?;
        }
        Ok(())
    }

    /// Assign positions through `root`'s subtree, sweeping the main axis in
    /// rendering order; the cross coordinate of every child is its parent's.
    ///
    /// With `round`, edges are rounded independently in absolute coordinates
    /// on both axes, so siblings keep tiling exactly and no drift
    /// accumulates.
    pub fn place(
        &mut self,
        root: NodeId,
        origin_x: f32,
        origin_y: f32,
        round: bool,
    ) -> Result<(), TreeError> {
        let (width, height) = {
            let content = &self.get(root)?.content;
            (content.width, content.height)
        };
        let content = &mut self.get_mut(root)?.content;
        if round {
            content.x = origin_x.round();
            content.y = origin_y.round();
            content.width = (origin_x + width).round() - origin_x.round();
            content.height = (origin_y + height).round() - origin_y.round();
        } else {
            content.x = origin_x;
            content.y = origin_y;
        }
        self.place_children(root, origin_x, origin_y, round)
    }

    fn place_children(
        &mut self,
        parent: NodeId,
        origin_x: f32,
        origin_y: f32,
        round: bool,
    ) -> Result<(), TreeError> {
        let parent_node = self.get(parent)?;
        if parent_node.children.is_empty() {
            return Ok(());
        }
        let direction = parent_node.config.direction;
        let mut ordered = Vec::with_capacity(parent_node.children.len());
        for &child_id in &parent_node.children {
            ordered.push((self.get(child_id)?.config.order, child_id));
        }
        // Stable: declared order breaks order ties.
        ordered.sort_by_key(|&(order, _)| order);

        let mut cursor = direction.main(origin_x, origin_y);
        let cross_start = direction.cross(origin_x, origin_y);
        for (_, child_id) in ordered {
            let (child_width, child_height) = {
                let content = &self.get(child_id)?.content;
                (content.width, content.height)
            };
            let main_extent = direction.main(child_width, child_height);
            let cross_extent = direction.cross(child_width, child_height);
            let end = cursor + main_extent;

            let (exact_x, exact_y) = if direction.is_row() {
                (cursor, cross_start)
            } else {
                (cross_start, cursor)
            };
            let content = &mut self.get_mut(child_id)?.content;
            if round {
                let main_offset = cursor.round();
                let main_span = end.round() - main_offset;
                let cross_offset = cross_start.round();
                let cross_span = (cross_start + cross_extent).round() - cross_offset;
                if direction.is_row() {
                    content.x = main_offset;
                    content.y = cross_offset;
                    content.width = main_span;
                    content.height = cross_span;
                } else {
                    content.x = cross_offset;
                    content.y = main_offset;
                    content.width = cross_span;
                    content.height = main_span;
                }
            } else {
                content.x = exact_x;
                content.y = exact_y;
            }
            self.place_children(child_id, exact_x, exact_y, round)?;
            cursor = end;
        }
        Ok(())
    }

    /// Size then place in one call.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        root: NodeId,
        target_width: Length,
        target_height: Length,
        origin_x: f32,
        origin_y: f32,
        round: bool,
    ) -> Result<(), TreeError> {
        self.solve_sizes(root, target_width, target_height)?;
        self.place(root, origin_x, origin_y, round)
    }
}

/// Resolve a solve target against a root node, without clamping.
fn resolve_target(node: &RectNode, target: Length, horizontal: bool) -> f32 {
    match target {
        Length::Flat(v) => v.max(0.0),
        Length::Auto { fallback } => {
            if node.children.is_empty() {
                fallback
            } else {
                let sums = if horizontal {
                    &node.aggregates.width
                } else {
                    &node.aggregates.height
                };
                let along_main = node.config.direction.is_row() == horizontal;
                if along_main {
                    sums.accumulate_base
                } else {
                    sums.greater_base
                }
            }
        }
    }
}
