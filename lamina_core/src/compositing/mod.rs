// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer mappings: which backing surfaces a composited layer owns, and
//! where they go.
//!
//! The update runs in two phases over the whole tree:
//!
//! 1. **Configure.** Every owning layer re-evaluates its surface predicates
//!    ([`MappingRequirements`]) from scratch and creates or releases the
//!    surfaces whose predicate flipped. An allocation failure degrades the
//!    layer instead of failing the pass.
//! 2. **Measure.** Dirty mappings compute each surface's position, size and
//!    offset from the box, snapping to whole pixels and carrying the
//!    remainder as subpixel accumulation.
//!
//! Which layers are composited at all, and which share a squashing surface,
//! is decided outside this crate and arrives as [`CompositingDecisions`]
//! through a [`CompositingAssigner`].

mod allocator;
mod assign;
mod configure;
#[cfg(test)]
mod fixture;
mod mapping;
mod measure;
mod reasons;
mod settings;
mod squashing;
mod surface;
mod update;

pub use allocator::{SurfaceAllocator, SurfaceError, SurfaceHandle, SurfacePool};
pub use assign::{CompositingAssigner, CompositingDecisions, PrecomputedAssignment};
pub use mapping::{LayerMapping, MappingRequirements, SquashedLayer};
pub use reasons::CompositingReasons;
pub use settings::CompositorSettings;
pub use surface::{PaintPhases, PlatformContent, Surface, SurfaceRole};
pub use update::{CompositingOutput, RepaintRequest, ScrollingNotification};
