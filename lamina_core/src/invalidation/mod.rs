// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint invalidation: finding what needs repainting, and where.
//!
//! A single top-down walk carries one [`PaintInvalidationState`] per level:
//! the offset and clip of the current level relative to the *active
//! container*, the nearest layer whose content has a surface of its own.
//!
//! - A box whose layer owns a mapping or is squashed starts a new
//!   container. Offset and clip restart there and the ancestor movement
//!   flag is dropped.
//! - Fixed-position boxes are anchored to the view, not to the walk, so
//!   their offset always comes from a full mapping
//!   ([`map_point_to_container`]).
//! - Below a transform that is not a plain translation, offsets can no
//!   longer be accumulated and every descendant falls back to full mapping.
//! - An overflow clip intersects the clip with its padding box and shifts
//!   its children by the negative scroll offset.
//! - Boxes whose geometry is still pending are invalidated once, after the
//!   walk has visited every other box.
//!
//! Each box's paint rect is compared with the one it painted last frame
//! ([`PaintInvalidator`]) and the difference becomes a list of
//! [`PaintInvalidation`]s in surface coordinates.

mod mapping;
mod state;
mod walk;

pub use mapping::{map_point_to_container, map_rect_to_container};
pub use state::{OffsetMode, PaintInvalidationState};
pub use walk::{InvalidationOutput, InvalidationReason, PaintInvalidation, PaintInvalidator, VisitRecord};
