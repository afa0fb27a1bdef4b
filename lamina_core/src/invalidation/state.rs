// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-level accumulator of the paint invalidation walk.

use alloc::vec::Vec;

use kurbo::{Affine, Point, Rect, Vec2};

use crate::box_tree::Columns;
use crate::geometry::intersect_or_zero;
use crate::layer::{PaintLayerId, fragment_flow_rect};

/// How a visited box's offset was derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OffsetMode {
    /// Accumulated incrementally from the parent's state.
    Cached,
    /// Recomputed by a full mapping to the container.
    Mapped,
}

/// The multi-column flow the current level is laid out in.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FlowThread {
    columns: Columns,
    /// Flow-thread origin in container space.
    content_origin: Point,
    /// The clip in force where the flow thread began, in container space.
    outer_clip: Option<Rect>,
}

/// Offset and clip of one walk level, relative to the active invalidation
/// container.
///
/// Each box derives the state its children see from its own. The state is
/// never stored across frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintInvalidationState {
    container: PaintLayerId,
    offset: Vec2,
    clip: Rect,
    clipped: bool,
    cached_offsets_enabled: bool,
    ancestor_had_location_change: bool,
    subtree_transform: Option<Affine>,
    flow_thread: Option<FlowThread>,
}

impl PaintInvalidationState {
    /// The state at the root of the walk.
    #[must_use]
    pub fn for_root(container: PaintLayerId) -> Self {
        Self {
            container,
            offset: Vec2::ZERO,
            clip: Rect::ZERO,
            clipped: false,
            cached_offsets_enabled: true,
            ancestor_had_location_change: false,
            subtree_transform: None,
            flow_thread: None,
        }
    }

    /// The state below a box that establishes a new container.
    ///
    /// Offset and clip restart at the container's origin and the location
    /// change flag is dropped: the container moving is handled by its
    /// surfaces, not by repainting its content. A disabled offset cache
    /// stays disabled.
    #[must_use]
    pub fn establish_container(&self, container: PaintLayerId) -> Self {
        Self {
            container,
            offset: Vec2::ZERO,
            clip: Rect::ZERO,
            clipped: false,
            cached_offsets_enabled: self.cached_offsets_enabled,
            ancestor_had_location_change: false,
            subtree_transform: None,
            flow_thread: None,
        }
    }

    /// The layer whose layout space offsets are expressed in.
    #[must_use]
    pub fn container(&self) -> PaintLayerId {
        self.container
    }

    /// Origin of the boxes at this level's containing block, in container
    /// space.
    #[must_use]
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// The accumulated clip, if any.
    #[must_use]
    pub fn clip(&self) -> Option<Rect> {
        self.clipped.then_some(self.clip)
    }

    /// Whether offsets may still be accumulated incrementally.
    #[must_use]
    pub fn cached_offsets_enabled(&self) -> bool {
        self.cached_offsets_enabled
    }

    /// Whether a box above this level moved within the container.
    #[must_use]
    pub fn ancestor_had_location_change(&self) -> bool {
        self.ancestor_had_location_change
    }

    /// Maps an embedded coordinate system's user space to container space.
    #[must_use]
    pub fn subtree_transform(&self) -> Option<Affine> {
        self.subtree_transform
    }

    /// Whether boxes at this level are laid out in columns.
    #[must_use]
    pub fn in_flow_thread(&self) -> bool {
        self.flow_thread.is_some()
    }

    /// Moves the level origin to `offset`.
    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Shifts the level origin, as a scroll offset or a translation does.
    pub fn shift(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Intersects the clip with `rect`, given in container space. The clip
    /// only ever shrinks.
    pub fn apply_clip(&mut self, rect: Rect) {
        if self.clipped {
            self.clip = intersect_or_zero(self.clip, rect);
        } else {
            self.clip = rect;
            self.clipped = true;
        }
    }

    /// Falls back to full mapping for the rest of the subtree.
    pub fn disable_cached_offsets(&mut self) {
        self.cached_offsets_enabled = false;
    }

    /// Records that this level moved within the container.
    pub fn set_ancestor_had_location_change(&mut self) {
        self.ancestor_had_location_change = true;
    }

    /// Sets the user-space-to-container transform of an embedded
    /// coordinate system.
    pub fn set_subtree_transform(&mut self, transform: Affine) {
        self.subtree_transform = Some(transform);
    }

    /// Starts a multi-column flow whose origin is `content_origin` in
    /// container space. Offsets below are flow positions; the clip in force
    /// applies to the visual pieces, and clips inside the flow apply before
    /// fragmenting. An inner flow replaces an outer one.
    pub fn enter_flow_thread(&mut self, columns: Columns, content_origin: Point) {
        let outer_clip = match self.flow_thread {
            Some(outer) => outer.outer_clip,
            None => self.clip(),
        };
        self.flow_thread = Some(FlowThread {
            columns,
            content_origin,
            outer_clip,
        });
        self.clip = Rect::ZERO;
        self.clipped = false;
    }

    /// Clips a flow or container-space rectangle and splits it into the
    /// container-space pieces it paints. Outside a flow thread this is the
    /// clipped rectangle alone.
    #[must_use]
    pub fn paint_rects(&self, rect: Rect) -> Vec<Rect> {
        let rect = self.clip_rect(rect);
        let Some(flow) = self.flow_thread else {
            return alloc::vec![rect];
        };
        let flow_rect = rect - flow.content_origin.to_vec2();
        fragment_flow_rect(&flow.columns, flow.content_origin, flow_rect)
            .into_iter()
            .map(|f| match flow.outer_clip {
                Some(clip) => intersect_or_zero(f.visual_rect, clip),
                None => f.visual_rect,
            })
            .filter(|r| !r.is_zero_area())
            .collect()
    }

    /// Clips a container-space rectangle by this level's clip.
    #[must_use]
    pub fn clip_rect(&self, rect: Rect) -> Rect {
        if self.clipped {
            intersect_or_zero(rect, self.clip)
        } else {
            rect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::contains_rect;

    fn layer(idx: u32) -> PaintLayerId {
        PaintLayerId { idx, generation: 0 }
    }

    #[test]
    fn clip_only_shrinks() {
        let mut s = PaintInvalidationState::for_root(layer(0));
        assert_eq!(s.clip(), None);
        s.apply_clip(Rect::new(0.0, 0.0, 100.0, 100.0));
        let outer = s.clip().unwrap();
        s.apply_clip(Rect::new(50.0, 50.0, 200.0, 200.0));
        let inner = s.clip().unwrap();
        assert_eq!(inner, Rect::new(50.0, 50.0, 100.0, 100.0));
        assert!(contains_rect(outer, inner), "clip grew while descending");
        assert_eq!(s.clip_rect(Rect::new(90.0, 90.0, 300.0, 300.0)), Rect::new(90.0, 90.0, 100.0, 100.0));
    }

    #[test]
    fn new_container_resets_offset_and_clip_but_not_the_cache_flag() {
        let mut s = PaintInvalidationState::for_root(layer(0));
        s.shift(Vec2::new(10.0, 20.0));
        s.apply_clip(Rect::new(0.0, 0.0, 5.0, 5.0));
        s.set_ancestor_had_location_change();
        s.disable_cached_offsets();
        let child = s.establish_container(layer(1));
        assert_eq!(child.container(), layer(1));
        assert_eq!(child.offset(), Vec2::ZERO);
        assert_eq!(child.clip(), None);
        assert!(!child.ancestor_had_location_change());
        assert!(!child.cached_offsets_enabled(), "fallback is monotonic");
    }

    #[test]
    fn flow_thread_splits_rects_and_keeps_the_outer_clip() {
        let mut s = PaintInvalidationState::for_root(layer(0));
        s.apply_clip(Rect::new(0.0, 0.0, 200.0, 300.0));
        let columns = Columns {
            column_width: 100.0,
            column_height: 100.0,
            gap: 20.0,
        };
        s.enter_flow_thread(columns, Point::new(10.0, 10.0));
        assert!(s.in_flow_thread());
        assert_eq!(s.clip(), None, "flow clips start afresh");
        assert_eq!(
            s.paint_rects(Rect::new(10.0, 60.0, 60.0, 160.0)),
            [
                Rect::new(10.0, 60.0, 60.0, 110.0),
                Rect::new(130.0, 10.0, 180.0, 60.0),
            ]
        );
        assert_eq!(
            s.paint_rects(Rect::new(60.0, 60.0, 110.0, 160.0)),
            [
                Rect::new(60.0, 60.0, 110.0, 110.0),
                Rect::new(180.0, 10.0, 200.0, 60.0),
            ],
            "the second piece is cut by the outer clip"
        );

        let child = s.establish_container(layer(1));
        assert!(!child.in_flow_thread(), "a new container has its own space");
        assert_eq!(child.paint_rects(Rect::new(0.0, 0.0, 5.0, 5.0)), [Rect::new(0.0, 0.0, 5.0, 5.0)]);
    }
}
