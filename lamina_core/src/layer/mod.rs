// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The paint layer tree.
//!
//! A *paint layer* exists for every box that induces one (the view,
//! positioned boxes, stacking contexts, scrollers, accelerated content).
//! The tree mirrors box ancestry restricted to those boxes. Each layer has:
//!
//! - An identity ([`PaintLayerId`]): a generational handle that goes stale
//!   when the layer is destroyed. The box holds the handle; everyone else
//!   holds a weak reference.
//! - Topology: parent, first/last child and sibling links.
//! - **Layout-derived state**: [`location`](PaintLayerTree::location) from
//!   [`update_layer_positions_after_layout`](PaintLayerTree::update_layer_positions_after_layout),
//!   stacking bits and transform from
//!   [`refresh_layer_style`](PaintLayerTree::refresh_layer_style), and an
//!   optional [`ScrollableArea`].
//! - **Descendant-dependent flags** (visible content, visible descendant,
//!   self-painting descendant, 3D-transformed descendant), held as explicit
//!   stale-or-computed caches and recomputed by
//!   [`update_descendant_dependent_flags`](PaintLayerTree::update_descendant_dependent_flags).
//! - **Compositing state**: not composited, owning a layer mapping, or
//!   squashed into another layer's mapping. Queries take a
//!   [`CompositingQuery`](crate::lifecycle::CompositingQuery) token.
//!
//! # Teardown
//!
//! Removing a layer is two explicit steps:
//! [`detach_layer`](PaintLayerTree::detach_layer) unlinks it and releases
//! squashing relationships; [`destroy_layer`](PaintLayerTree::destroy_layer)
//! releases its surfaces and frees the slot.
//!
//! # Dirty tracking
//!
//! Position and geometry changes propagate to descendants through the
//! channels in [`dirty`](crate::dirty); flags propagate to ancestors through
//! explicit invalidation calls.

mod composited;
mod flags;
mod id;
mod pagination;
mod position;
mod scrollable;
mod sync;
mod traverse;
mod tree;
mod z_order;

pub use composited::{CompositedState, CompositingState};
pub use hit_test::HitTestResult;
pub use id::{INVALID, PaintLayerId};
pub use pagination::{Fragment, Pagination, fragment_flow_rect};
pub use scrollable::ScrollableArea;
pub use sync::SyncSummary;
pub use traverse::{Ancestors, Children};
pub use tree::PaintLayerTree;
