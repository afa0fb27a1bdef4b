// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint layers, layer mappings and paint invalidation for a box tree.
//!
//! `lamina_core` sits between layout and paint. Given laid-out boxes, it
//! maintains the auxiliary tree of *paint layers*, decides which backing
//! surfaces each composited layer needs and where they go, and walks the
//! boxes to find what must be repainted, in each surface's coordinates. It
//! is `no_std` compatible (with `alloc`) and stores layers in arrays
//! addressed by generational handles.
//!
//! # Architecture
//!
//! One frame runs the phases below in order, gated by the
//! [`DocumentLifecycle`](lifecycle::DocumentLifecycle):
//!
//! ```text
//!   BoxTree (layout output)
//!       │
//!       ▼
//!   PaintLayerTree::sync_with_box_tree ──► positions, flags, z-order
//!       │
//!       ▼
//!   CompositingAssigner::assign ──► CompositingDecisions
//!       │
//!       ▼
//!   update_compositing: configure ──► measure ──► CompositingOutput
//!       │
//!       ▼
//!   PaintInvalidator::invalidate_paint ──► PaintInvalidation list
//! ```
//!
//! [`Document`](document::Document) drives the whole sequence.
//!
//! **[`box_tree`]**: The layout collaborator's output: boxes with resolved
//! style, geometry and scroll state.
//!
//! **[`layer`]**: The paint layer tree: topology, positions, stacking
//! order, descendant-dependent flags and per-layer compositing state.
//!
//! **[`compositing`]**: Layer mappings: which surfaces a composited layer
//! owns, their geometry, and squashing.
//!
//! **[`invalidation`]**: The paint invalidation walk and full
//! local-to-container mapping.
//!
//! **[`lifecycle`]**: Phase state machine and the capability token for
//! compositing-state queries.
//!
//! **[`dirty`]**: Multi-channel dirty tracking via `understory_dirty`.
//! POSITION and GEOMETRY propagate to descendants; CONFIGURATION is
//! local-only; TOPOLOGY triggers a traversal rebuild.
//!
//! **[`cached`]**: Explicit stale-or-computed values for derived state.
//!
//! **[`geometry`]**: Pixel snapping and rectangle helpers.
//!
//! **[`transform`]**: 4×4 transform type for CSS transforms.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pipeline instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-box
//!   invalidation and squashed-layer repaint events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod box_tree;
pub mod cached;
pub mod compositing;
pub mod dirty;
pub mod document;
pub mod geometry;
pub mod invalidation;
pub mod layer;
pub mod lifecycle;
pub mod trace;
pub mod transform;
