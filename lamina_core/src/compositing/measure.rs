// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface geometry.
//!
//! Every composited layer works in its own *snapped space*: its layout
//! space shifted by its subpixel accumulation, so that its surfaces land on
//! whole pixels. A layer's offset from its compositing ancestor is taken in
//! the ancestor's snapped space, rounded, and the remainder becomes the
//! layer's own accumulation.
//!
//! Surface positions are relative to their surface parent. The outermost
//! surface of a layer is positioned against the compositing ancestor's child
//! containment surface, whose origin the ancestor records after measuring.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Size, Vec2};

use super::surface::{Surface, SurfaceRole};
use super::update::{CompositingOutput, RepaintRequest};
use crate::box_tree::BoxTree;
use crate::dirty;
use crate::geometry::{pixel_snapped_rect, snap_vec, split_subpixel};
use crate::layer::{PaintLayerId, PaintLayerTree};
use crate::trace::Tracer;
use crate::transform::Transform3d;

/// Everything measuring one mapping reads from the tree and box.
struct LayerInputs {
    snapped: Vec2,
    raw: Vec2,
    acc: Vec2,
    parent_origin: Point,
    local: Rect,
    ancestor_clip: Option<Rect>,
    padding: Rect,
    border_size: Size,
    scroll: Vec2,
    content_size: Size,
    transform: Option<Transform3d>,
    transform_origin: Point,
    perspective: Option<Transform3d>,
    scrollbars: [Option<Rect>; 3],
}

impl PaintLayerTree {
    /// Re-measures every mapping whose geometry may have changed.
    ///
    /// Dirty layers map to the mapping they paint into. Mappings are
    /// measured in tree order so that ancestors are final before their
    /// descendants read them; an ancestor whose accumulation or child
    /// origin moved pulls its whole subtree in. Returns the number of
    /// mappings measured.
    pub(crate) fn measure_mappings(
        &mut self,
        boxes: &BoxTree,
        tracer: &mut Tracer<'_>,
        out: &mut CompositingOutput,
    ) -> u32 {
        let dirty_layers = self.drain_dirty(dirty::GEOMETRY);
        let _ = self.drain_dirty(dirty::POSITION);
        let mut work: BTreeSet<PaintLayerId> = BTreeSet::new();
        for l in dirty_layers {
            let target = if self.owns_mapping(l) {
                Some(l)
            } else if let Some(owner) = self.squashing_owner(l) {
                Some(owner)
            } else {
                self.compositing_ancestor_unchecked(l)
            };
            work.extend(target);
        }

        let mut measured = 0;
        for l in self.pre_order() {
            if !work.contains(&l) || !self.owns_mapping(l) {
                continue;
            }
            measured += 1;
            if self.measure_layer(boxes, l, tracer, out) {
                let mut stack: Vec<PaintLayerId> = self.children(l).collect();
                while let Some(d) = stack.pop() {
                    work.insert(d);
                    stack.extend(self.children(d));
                }
            }
        }
        measured
    }

    fn layer_inputs(&self, boxes: &BoxTree, l: PaintLayerId) -> LayerInputs {
        let ca = self.compositing_ancestor_unchecked(l);
        let (ca_acc, parent_origin, layout_offset) = match ca {
            Some(c) => (
                self.record(c).subpixel_accumulation,
                self.mapping_unchecked(c)
                    .map_or(Point::ZERO, |m| m.child_containment_origin),
                self.offset_from_ancestor(l, c),
            ),
            None => (Vec2::ZERO, Point::ZERO, Vec2::ZERO),
        };
        let raw = layout_offset + ca_acc;
        let (snapped, acc) = split_subpixel(raw);
        let local = pixel_snapped_rect(self.bounding_box_for_compositing(boxes, l) + acc);
        let ancestor_clip = ca
            .and_then(|c| self.ancestor_clip_rect(boxes, l, c))
            .map(|r| pixel_snapped_rect(r + ca_acc));

        let record = self.record(l);
        let scrollable = record.scrollable;
        let lb = boxes.try_get(record.box_id);
        let geometry = lb.map(|b| b.geometry).unwrap_or_default();
        let style = lb.map(|b| b.style).unwrap_or_default();
        LayerInputs {
            snapped,
            raw,
            acc,
            parent_origin,
            local,
            ancestor_clip,
            padding: pixel_snapped_rect(geometry.padding_box() + acc),
            border_size: pixel_snapped_rect(geometry.border_box() + acc).size(),
            scroll: scrollable.map_or(Vec2::ZERO, |s| snap_vec(s.scroll_offset())),
            content_size: scrollable.map_or(Size::ZERO, |s| s.content_size()),
            transform: style.transform,
            transform_origin: style.transform_origin - local.origin().to_vec2(),
            perspective: style.perspective.map(|d| {
                Transform3d::from_perspective(d)
                    .about_origin(style.perspective_origin - local.origin().to_vec2())
            }),
            scrollbars: [
                scrollable.and_then(|s| s.horizontal_scrollbar_rect()),
                scrollable.and_then(|s| s.vertical_scrollbar_rect()),
                scrollable.and_then(|s| s.scroll_corner_rect()),
            ],
        }
    }

    /// Positions every surface of `l`'s mapping. Returns whether what its
    /// composited descendants read (accumulation or child origin) changed.
    fn measure_layer(
        &mut self,
        boxes: &BoxTree,
        l: PaintLayerId,
        tracer: &mut Tracer<'_>,
        out: &mut CompositingOutput,
    ) -> bool {
        let i = self.layer_inputs(boxes, l);
        let squash = self.squashing_geometry(boxes, l, i.raw, i.parent_origin);
        let old_acc = self.record(l).subpixel_accumulation;
        self.record_mut(l).subpixel_accumulation = i.acc;
        if let Some(geo) = &squash {
            for m in &geo.members {
                self.record_mut(m.layer).subpixel_accumulation = m.subpixel_accumulation;
            }
        }

        let Some(m) = self.mapping_mut(l) else {
            return false;
        };
        let relative = i.local + i.snapped;
        let local_origin = i.local.origin().to_vec2();

        let mut parent_loc = i.parent_origin;
        if let Some(clip) = i.ancestor_clip {
            if let Some(s) = m.surface_mut(SurfaceRole::AncestorClip) {
                place(s, (clip.origin() - i.parent_origin).to_point(), clip.size(), clip.origin().to_vec2() - i.snapped);
                s.masks_to_bounds = true;
            }
            parent_loc = clip.origin();
        }

        let primary_position = (relative.origin() - parent_loc).to_point();
        for role in [SurfaceRole::Primary, SurfaceRole::Background] {
            if let Some(s) = m.surface_mut(role) {
                place(s, primary_position, i.local.size(), local_origin);
            }
        }
        if let Some(s) = m.surface_mut(SurfaceRole::Primary) {
            s.transform = i.transform;
            s.transform_origin = i.transform_origin;
        }
        debug_assert_eq!(
            i.snapped - (parent_loc.to_vec2() + primary_position.to_vec2()),
            -local_origin,
            "surface chain does not lead back to the box origin"
        );

        for role in [SurfaceRole::ChildTransform, SurfaceRole::Foreground, SurfaceRole::Mask] {
            if let Some(s) = m.surface_mut(role) {
                place(s, Point::ZERO, i.local.size(), local_origin);
            }
        }
        if let Some(s) = m.surface_mut(SurfaceRole::ChildTransform) {
            s.transform = i.perspective;
        }

        let clip_position = i.padding.origin() - local_origin;
        for role in [SurfaceRole::ChildClip, SurfaceRole::ScrollOuter] {
            if let Some(s) = m.surface_mut(role) {
                place(s, clip_position, i.padding.size(), i.padding.origin().to_vec2());
                s.masks_to_bounds = true;
            }
        }
        if let Some(s) = m.surface_mut(SurfaceRole::ChildClipMask) {
            place(s, Point::ZERO, i.padding.size(), i.padding.origin().to_vec2());
        }

        let scrolled_origin = i.padding.origin().to_vec2() - i.scroll;
        if let Some(s) = m.surface_mut(SurfaceRole::ScrollInner) {
            let moved = s.offset_from_box != scrolled_origin;
            place(s, (-i.scroll).to_point(), i.content_size, scrolled_origin);
            if moved {
                s.set_needs_display();
            }
        }
        if let Some(s) = m.surface_mut(SurfaceRole::ScrollSelection) {
            place(s, Point::ZERO, i.content_size, scrolled_origin);
        }

        let mut controls_parent = i.parent_origin;
        if let (Some(clip), Some(s)) = (i.ancestor_clip, m.surface_mut(SurfaceRole::OverflowControlsClip)) {
            place(s, (clip.origin() - i.parent_origin).to_point(), clip.size(), clip.origin().to_vec2() - i.snapped);
            s.masks_to_bounds = true;
            controls_parent = clip.origin();
        }
        if let Some(s) = m.surface_mut(SurfaceRole::OverflowControlsHost) {
            place(s, (i.snapped - controls_parent.to_vec2()).to_point(), i.border_size, Vec2::ZERO);
        }
        let bar_roles = [
            SurfaceRole::HorizontalScrollbar,
            SurfaceRole::VerticalScrollbar,
            SurfaceRole::ScrollCorner,
        ];
        for (role, rect) in bar_roles.into_iter().zip(i.scrollbars) {
            if let (Some(s), Some(r)) = (m.surface_mut(role), rect) {
                let r = pixel_snapped_rect(r + i.acc);
                place(s, r.origin(), r.size(), r.origin().to_vec2());
            }
        }

        if let Some(geo) = squash {
            if let Some(s) = m.surface_mut(SurfaceRole::SquashingContainer) {
                place(s, Point::ZERO, Size::ZERO, Vec2::ZERO);
            }
            if let Some(s) = m.surface_mut(SurfaceRole::Squashing) {
                place(s, geo.bounds.origin(), geo.bounds.size(), geo.offset_from_owner);
            }
            let mut invalidate = Vec::new();
            for squashed in m.squashed_layers_mut() {
                let Some(g) = geo.members.iter().find(|g| g.layer == squashed.layer) else {
                    continue;
                };
                if squashed.measured && squashed.offset_from_box != g.offset_from_box {
                    out.repaints.push(RepaintRequest::FullSquashedLayer {
                        layer: squashed.layer,
                        owner: l,
                    });
                    invalidate.push(squashed.local_clip);
                    invalidate.push(g.local_clip);
                    #[cfg(feature = "trace-rich")]
                    {
                        let frame_index = tracer.frame_index();
                        tracer.squashed_repaint(&crate::trace::SquashedRepaintEvent {
                            frame_index,
                            layer_index: squashed.layer.index(),
                            old_offset: squashed.offset_from_box,
                            new_offset: g.offset_from_box,
                        });
                    }
                }
                squashed.offset_from_box = g.offset_from_box;
                squashed.subpixel_accumulation = g.subpixel_accumulation;
                squashed.local_clip = g.local_clip;
                squashed.measured = true;
            }
            if let Some(s) = m.surface_mut(SurfaceRole::Squashing) {
                for r in invalidate {
                    s.invalidate_rect(r);
                }
            }
        }
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = tracer;
        }

        let containment = if m.has(SurfaceRole::ScrollInner) {
            scrolled_origin.to_point()
        } else if m.has(SurfaceRole::ChildClip) {
            i.padding.origin()
        } else {
            i.local.origin()
        };
        let containment_moved = m.child_containment_origin != containment;
        m.child_containment_origin = containment;
        m.composited_bounds = i.local;
        containment_moved || old_acc != i.acc
    }
}

/// Moves and resizes a surface. A drawing surface that changes size is
/// repainted in full.
fn place(s: &mut Surface, position: Point, size: Size, offset_from_box: Vec2) {
    if s.size != size && s.draws_content {
        s.set_needs_display();
    }
    s.position = position;
    s.size = size;
    s.offset_from_box = offset_from_box;
}
