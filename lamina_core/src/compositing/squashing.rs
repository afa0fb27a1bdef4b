// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Squashing surface geometry.
//!
//! Squashed layers are compared in the flat space of their nearest
//! transformed ancestor, which they share with the owner. The surface's
//! bounds are the enclosing whole-pixel rectangle of every member's bounds
//! in that space. Each member then paints at its offset from the surface's
//! snapped origin; only the fractional part of that offset is carried as
//! subpixel accumulation.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

use crate::box_tree::BoxTree;
use crate::geometry::{enclosing_rect, pixel_snapped_rect, split_subpixel, union_non_empty};
use crate::layer::{PaintLayerId, PaintLayerTree};

/// Derived placement of one squashed layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MemberGeometry {
    pub(crate) layer: PaintLayerId,
    /// Surface origin minus the member's box origin, in whole pixels.
    pub(crate) offset_from_box: Vec2,
    pub(crate) subpixel_accumulation: Vec2,
    /// Painted area in surface coordinates.
    pub(crate) local_clip: Rect,
}

/// Derived geometry of a squashing surface.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SquashingGeometry {
    /// Bounds relative to the surface the squashing container attaches to.
    pub(crate) bounds: Rect,
    /// Surface origin minus the owner's snapped box origin.
    pub(crate) offset_from_owner: Vec2,
    pub(crate) members: Vec<MemberGeometry>,
}

impl PaintLayerTree {
    /// Computes the squashing geometry of `owner`'s mapping.
    ///
    /// `raw` is the owner's unsnapped offset in its compositing ancestor's
    /// snapped space and `parent_origin` the origin of the surface the
    /// squashing container attaches to, in that same space.
    pub(crate) fn squashing_geometry(
        &self,
        boxes: &BoxTree,
        owner: PaintLayerId,
        raw: Vec2,
        parent_origin: Point,
    ) -> Option<SquashingGeometry> {
        let mapping = self.mapping_unchecked(owner)?;
        if mapping.squashed_layers().is_empty() {
            return None;
        }
        let owner_offset = self.compute_offset_from_transformed_ancestor(owner);
        let placed: Vec<(PaintLayerId, Vec2, Rect)> = mapping
            .squashed_layers()
            .iter()
            .filter(|s| self.is_alive(s.layer))
            .map(|s| {
                let delta = self.compute_offset_from_transformed_ancestor(s.layer) - owner_offset;
                (s.layer, delta, self.bounding_box_for_compositing(boxes, s.layer))
            })
            .collect();

        let union = placed
            .iter()
            .fold(Rect::ZERO, |acc, &(_, delta, bbox)| union_non_empty(acc, bbox + delta));
        let to_parent = raw - parent_origin.to_vec2();
        let bounds = enclosing_rect(union + to_parent);
        let origin_in_owner = bounds.origin().to_vec2() - to_parent;

        let members = placed
            .into_iter()
            .map(|(layer, delta, bbox)| {
                let offset = delta - origin_in_owner;
                let (whole, subpixel_accumulation) = split_subpixel(offset);
                MemberGeometry {
                    layer,
                    offset_from_box: -whole,
                    subpixel_accumulation,
                    local_clip: pixel_snapped_rect(bbox + offset),
                }
            })
            .collect();

        let (snapped, _) = split_subpixel(raw);
        Some(SquashingGeometry {
            bounds,
            offset_from_owner: bounds.origin().to_vec2() + parent_origin.to_vec2() - snapped,
            members,
        })
    }
}
