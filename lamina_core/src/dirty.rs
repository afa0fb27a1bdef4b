// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The paint layer tree uses multi-channel dirty tracking (via
//! [`understory_dirty`]) to decide which layers the compositing passes must
//! revisit. Each channel represents an independent category of change.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`POSITION`] and [`GEOMETRY`] have dependency edges
//!   from child to parent and are marked with
//!   [`EagerPolicy`](understory_dirty::EagerPolicy). A layer that moves
//!   drags every descendant's surface geometry with it.
//!
//! - **Local-only**: [`CONFIGURATION`] is marked on the layer whose
//!   compositing inputs changed (reasons, squashing membership, style
//!   predicates). The configure pass recomputes every predicate anyway; this
//!   channel only feeds the measure pass's work list.
//!
//! - **Structural**: [`TOPOLOGY`] is marked on add/remove child and
//!   create/destroy. It triggers traversal-order rebuilds.
//!
//! Descendant-dependent flags (visibility, self-painting descendants) flow
//! the other way, toward the root, and use explicit
//! [`Cached`](crate::cached::Cached) values instead of a channel.

use understory_dirty::Channel;

/// Layout position changed; descendants must be re-measured.
pub const POSITION: Channel = Channel::new(0);

/// Compositing inputs changed; the layer's surface set may change.
pub const CONFIGURATION: Channel = Channel::new(1);

/// Surface geometry must be re-measured for the layer and its descendants.
pub const GEOMETRY: Channel = Channel::new(2);

/// Tree topology changed; traversal order must be rebuilt.
pub const TOPOLOGY: Channel = Channel::new(3);
