#![forbid(unsafe_code)]

//! Constraint-based one- and two-dimensional layout solving.
//!
//! This crate sizes and positions trees of segments. Each segment declares a
//! base length, compress/expand flexibilities, hard min/max clamps, and a
//! rendering order; the solver makes the children of every parent tile that
//! parent exactly along its main axis, honoring clamps by iteratively
//! re-distributing the remaining budget across the still-flexible siblings.
//!
//! Three layers compose leaves-first:
//!
//! - [`distribute`] - the flat distributor: solves one parent's children along
//!   one axis (compression and expansion are symmetric fixed-point passes).
//! - [`SegmentTree`] - the 1D tree: resolves `Auto` lengths bottom-up from
//!   cached aggregates, distributes top-down, and assigns offsets in
//!   rendering order.
//! - [`RectTree`] - the 2D variant: every container has a [`FlexDirection`];
//!   width and height interact through auto-sized nodes whose cross-axis
//!   depth comes from their own subtree.
//!
//! ```
//! use discadelta_layout::{Length, SegmentConfig, SegmentTree};
//!
//! let mut tree = SegmentTree::new();
//! let root = tree.create(SegmentConfig::named("root")).unwrap();
//! let a = tree
//!     .create(SegmentConfig::named("a").base(Length::Flat(100.0)))
//!     .unwrap();
//! let b = tree
//!     .create(SegmentConfig::named("b").base(Length::Flat(300.0)))
//!     .unwrap();
//! tree.link(a, root).unwrap();
//! tree.link(b, root).unwrap();
//!
//! tree.solve(root, Length::Flat(200.0), 0.0, false).unwrap();
//! let total: f32 = [a, b]
//!     .iter()
//!     .map(|&id| tree.content(id).unwrap().distance)
//!     .sum();
//! assert!((total - 200.0).abs() < 1e-3);
//! ```
//!
//! Solving is a pure, synchronous transformation of the tree's mutable
//! content; configs are never rewritten after creation (except `order`, which
//! is placement-only).

pub mod distribute;
pub mod node;
pub mod rect;
pub mod segment;

pub use discadelta_core::{FlexDirection, Length};
pub use distribute::{Distributed, DistributeEntry, distribute};
pub use node::{NodeId, TreeError};
pub use rect::{RectConfig, RectContent, RectTree};
pub use segment::{SegmentConfig, SegmentContent, SegmentTree};
