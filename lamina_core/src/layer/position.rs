// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer positions and the ancestor relationships derived from them.
//!
//! A layer's location is its border-box origin relative to its parent
//! layer's border-box origin, in layout space: transforms are ignored and
//! scroll offsets of the box that scrolls it are subtracted. Summing
//! locations up to the root therefore gives viewport coordinates.

use kurbo::{Point, Rect, Vec2};
use understory_dirty::EagerPolicy;

use super::id::PaintLayerId;
use super::pagination::{Pagination, fragment_flow_rect};
use super::tree::PaintLayerTree;
use crate::box_tree::{BoxId, BoxKind, BoxTree, PositionScheme};
use crate::dirty;
use crate::geometry::{intersect_or_zero, union_non_empty};

impl PaintLayerTree {
    /// Recomputes the location of `id` and its descendants from the box
    /// tree's post-layout geometry.
    ///
    /// Returns whether any location in the subtree changed. Moved layers are
    /// marked on the position and geometry channels, which carry the change
    /// to their descendants.
    pub fn update_layer_positions_after_layout(&mut self, boxes: &BoxTree, id: PaintLayerId) -> bool {
        let location = self.compute_location(boxes, id);
        let changed = location != self.record(id).location;
        if changed {
            self.record_mut(id).location = location;
            self.dirty.mark_with(id.idx, dirty::POSITION, &EagerPolicy);
            self.mark_geometry_dirty(id);
        }

        let children: alloc::vec::Vec<PaintLayerId> = self.children(id).collect();
        let mut any = changed;
        for child in children {
            any |= self.update_layer_positions_after_layout(boxes, child);
        }
        any
    }

    fn compute_location(&self, boxes: &BoxTree, id: PaintLayerId) -> Point {
        let b = self.box_of(id);
        let Some(parent) = self.parent(id) else {
            return Point::ZERO;
        };
        if !boxes.is_alive(b) {
            return self.record(id).location;
        }
        let lb = boxes.get(b);
        let in_flow_offset = lb.style.position.in_flow_offset();

        if lb.style.position.is_out_of_flow()
            && let Some(container) = boxes.containing_block(b)
            && let Some(container_layer) = boxes.get(container).layer()
            && self.is_alive(container_layer)
        {
            let cb = boxes.get(container);
            let anchored_to_view =
                lb.style.position == PositionScheme::Fixed && matches!(cb.kind, BoxKind::View);
            let scroll = if anchored_to_view {
                Vec2::ZERO
            } else {
                cb.scroll_offset()
            };
            let in_container = lb.geometry.location.to_vec2() - scroll;
            let parent_in_container = self.offset_from_ancestor(parent, container_layer);
            return (in_container - parent_in_container + in_flow_offset).to_point();
        }

        let parent_box = self.box_of(parent);
        let mut offset = lb.geometry.location.to_vec2();
        let mut cur = boxes.parent(b);
        while let Some(c) = cur {
            if c == parent_box {
                break;
            }
            offset += boxes.get(c).geometry.location.to_vec2();
            cur = boxes.parent(c);
        }
        if boxes.is_alive(parent_box) {
            offset -= boxes.get(parent_box).scroll_offset();
        }
        (offset + in_flow_offset).to_point()
    }

    /// Offset of the layer's origin from the root layer's origin.
    #[must_use]
    pub fn offset_to_root(&self, id: PaintLayerId) -> Vec2 {
        let mut offset = self.record(id).location.to_vec2();
        for a in self.ancestors(id) {
            offset += self.record(a).location.to_vec2();
        }
        offset
    }

    /// Offset of `id`'s origin from `ancestor`'s origin, in layout space.
    ///
    /// Transforms are ignored.
    #[must_use]
    pub fn offset_from_ancestor(&self, id: PaintLayerId, ancestor: PaintLayerId) -> Vec2 {
        self.offset_to_root(id) - self.offset_to_root(ancestor)
    }

    /// The layer whose composited backing this layer's position is
    /// expressed against: the parent for normal-flow layers, the enclosing
    /// stacking context for positioned or stacking layers.
    #[must_use]
    pub fn compositing_container(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        if self.is_normal_flow_only(id) {
            self.parent(id)
        } else {
            self.ancestor_stacking_context(id)
        }
    }

    /// Nearest strict ancestor that is positioned, transformed, or the root.
    #[must_use]
    pub fn enclosing_positioned_ancestor(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        self.ancestors(id).find(|&a| {
            let r = self.record(a);
            r.positioned || r.transform.is_some() || a.idx == self.root
        })
    }

    /// Nearest strict ancestor whose box anchors `position: fixed`
    /// descendants.
    #[must_use]
    pub fn fixed_position_container(&self, boxes: &BoxTree, id: PaintLayerId) -> Option<PaintLayerId> {
        self.ancestors(id).find(|&a| {
            let b = self.box_of(a);
            a.idx == self.root || (boxes.is_alive(b) && boxes.is_fixed_position_container(b))
        })
    }

    /// The layer whose clips apply to this one: the containing block's
    /// layer for out-of-flow boxes, the parent otherwise.
    #[must_use]
    pub fn clip_parent(&self, boxes: &BoxTree, id: PaintLayerId) -> Option<PaintLayerId> {
        let b = self.box_of(id);
        if boxes.is_alive(b) && boxes.get(b).style.position.is_out_of_flow() {
            let container_layer = boxes
                .containing_block(b)
                .and_then(|c| boxes.get(c).layer())
                .filter(|&l| self.is_alive(l));
            if container_layer.is_some() {
                return container_layer;
            }
        }
        self.parent(id)
    }

    /// Nearest strict ancestor with a transform, or the root.
    #[must_use]
    pub fn transformed_ancestor(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        self.ancestors(id)
            .find(|&a| self.record(a).transform.is_some() || a.idx == self.root)
    }

    /// Offset from the nearest transformed ancestor (or the root). Layers
    /// sharing that ancestor can be compared in its flat coordinate space.
    #[must_use]
    pub fn compute_offset_from_transformed_ancestor(&self, id: PaintLayerId) -> Vec2 {
        match self.transformed_ancestor(id) {
            Some(a) => self.offset_from_ancestor(id, a),
            None => Vec2::ZERO,
        }
    }

    /// The layer's own box bounds, with its visual overflow, in layer space.
    ///
    /// Returns [`Rect::ZERO`] when the box is gone.
    #[must_use]
    pub fn local_bounding_box(&self, boxes: &BoxTree, id: PaintLayerId) -> Rect {
        let b = self.box_of(id);
        if !boxes.is_alive(b) {
            return Rect::ZERO;
        }
        let g = &boxes.get(b).geometry;
        union_non_empty(g.border_box(), g.visual_overflow)
    }

    /// The area this layer's backing must cover: its own bounds united with
    /// those of descendants that paint into it, in layer space.
    ///
    /// Descendants that own or share another backing are excluded.
    #[must_use]
    pub fn bounding_box_for_compositing(&self, boxes: &BoxTree, id: PaintLayerId) -> Rect {
        let mut bounds = self.local_bounding_box(boxes, id);
        let b = self.box_of(id);
        let clip = (boxes.is_alive(b) && boxes.get(b).style.overflow_clip)
            .then(|| boxes.get(b).geometry.padding_box());
        let flow = boxes
            .try_get(b)
            .and_then(|lb| Some((lb.style.columns?, lb.geometry.content_box().origin())));
        for child in self.children(id) {
            if self.owns_mapping(child) || self.squashing_owner(child).is_some() {
                continue;
            }
            let record = self.record(child);
            let mut child_bounds = self.bounding_box_for_compositing(boxes, child);
            if let Some(t) = record.transform {
                child_bounds = t.map_rect(child_bounds);
            }
            child_bounds = child_bounds + record.location.to_vec2();
            if let Some((columns, content_origin)) = flow {
                // Children are laid out in one tall flow; the backing sees the columns.
                let flow_rect = child_bounds - content_origin.to_vec2();
                child_bounds = fragment_flow_rect(&columns, content_origin, flow_rect)
                    .iter()
                    .fold(Rect::ZERO, |acc, f| union_non_empty(acc, f.visual_rect));
            }
            if let Some(clip) = clip
                && !record.positioned
            {
                child_bounds = intersect_or_zero(child_bounds, clip);
            }
            bounds = union_non_empty(bounds, child_bounds);
        }
        bounds
    }

    /// The layer's pagination context, if it sits inside a multi-column
    /// box.
    #[must_use]
    pub fn pagination(&self, id: PaintLayerId) -> Option<&Pagination> {
        self.record(id).pagination.as_ref()
    }

    /// Recomputes every layer's pagination context. Needed after layers
    /// move, after the layer tree changes shape, and after column styles or
    /// container geometry change.
    pub fn update_pagination_contexts(&mut self, boxes: &BoxTree) {
        for id in self.pre_order() {
            self.update_pagination(boxes, id);
        }
    }

    fn update_pagination(&mut self, boxes: &BoxTree, id: PaintLayerId) {
        let container = self.ancestors(id).find(|&a| {
            let b = self.box_of(a);
            boxes.is_alive(b) && boxes.get(b).style.columns.is_some()
        });
        let pagination = container.and_then(|c| {
            let cb: BoxId = self.box_of(c);
            let columns = boxes.get(cb).style.columns?;
            let content_origin = boxes.get(cb).geometry.content_box().origin();
            Some(Pagination {
                container: c,
                columns,
                content_origin,
                flow_offset: self.offset_from_ancestor(id, c) - content_origin.to_vec2(),
            })
        });
        self.record_mut(id).pagination = pagination;
    }
}
