// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keeping the layer tree in step with the box tree.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::id::PaintLayerId;
use super::scrollable::ScrollableArea;
use super::tree::PaintLayerTree;
use crate::box_tree::{BoxId, BoxKind, BoxTree, LayerType};
use crate::compositing::{CompositorSettings, SurfaceAllocator};
use crate::dirty;

/// What [`PaintLayerTree::sync_with_box_tree`] changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Layers created for boxes that now need one.
    pub created: u32,
    /// Layers torn down.
    pub destroyed: u32,
    /// Parents whose child list was rebuilt.
    pub relinked: u32,
}

impl PaintLayerTree {
    /// Brings the layer tree in line with the box tree.
    ///
    /// Layers whose box is gone or no longer needs one are unlinked and
    /// destroyed; boxes that newly need a layer get one; every parent's
    /// child list is rebuilt in box order where it differs. Finally each
    /// layer's style-derived bits are refreshed.
    pub fn sync_with_box_tree(
        &mut self,
        boxes: &mut BoxTree,
        settings: &CompositorSettings,
        allocator: &mut dyn SurfaceAllocator,
    ) -> SyncSummary {
        let mut summary = SyncSummary::default();

        // Layers of removed boxes, children first.
        let mut dead: Vec<PaintLayerId> = self
            .iter()
            .filter(|&l| !boxes.is_alive(self.box_of(l)))
            .collect();
        dead.sort_by_key(|&l| core::cmp::Reverse(self.ancestors(l).count()));
        for l in dead {
            self.tear_down(l, allocator);
            summary.destroyed += 1;
        }

        let order = boxes.pre_order(boxes.root());
        for &b in &order {
            let required = boxes.get(b).layer_type_required();
            match (boxes.get(b).layer(), required) {
                (Some(l), LayerType::None) => {
                    boxes.set_layer(b, None);
                    self.tear_down(l, allocator);
                    summary.destroyed += 1;
                }
                (None, LayerType::None) => {}
                (None, ty) => {
                    let l = self.create_layer(b, ty);
                    boxes.set_layer(b, Some(l));
                    summary.created += 1;
                }
                (Some(l), ty) => {
                    if self.record(l).layer_type != ty {
                        self.record_mut(l).layer_type = ty;
                        self.dirty_stacking_context_z_order_lists(l);
                        self.dirty.mark(l.idx, dirty::CONFIGURATION);
                    }
                }
            }
        }

        summary.relinked = self.relink_children(boxes, &order);

        for &b in &order {
            if let Some(l) = boxes.get(b).layer() {
                self.refresh_layer_style(boxes, settings, l);
            }
        }
        summary
    }

    /// Unlinks the layer's children and the layer itself, then frees it.
    /// The children are re-parented by the relink step.
    fn tear_down(&mut self, id: PaintLayerId, allocator: &mut dyn SurfaceAllocator) {
        let children: Vec<PaintLayerId> = self.children(id).collect();
        for child in children {
            self.remove_child(child);
        }
        self.detach_layer(id);
        self.destroy_layer(id, allocator);
    }

    /// Rebuilds child lists that differ from box order. Returns how many
    /// parents were rebuilt.
    fn relink_children(&mut self, boxes: &BoxTree, order: &[BoxId]) -> u32 {
        let mut desired: BTreeMap<PaintLayerId, Vec<PaintLayerId>> = BTreeMap::new();
        for &b in order {
            let Some(l) = boxes.get(b).layer() else {
                continue;
            };
            desired.entry(l).or_default();
            let Some(parent_box) = boxes.parent(b) else {
                continue;
            };
            if let Some(parent_layer) = boxes.enclosing_layer(parent_box) {
                desired.entry(parent_layer).or_default().push(l);
            }
        }

        let mismatched: Vec<PaintLayerId> = desired
            .iter()
            .filter(|(p, want)| !self.children(**p).eq(want.iter().copied()))
            .map(|(p, _)| *p)
            .collect();
        for &p in &mismatched {
            let current: Vec<PaintLayerId> = self.children(p).collect();
            for c in current {
                self.remove_child(c);
            }
        }
        for &p in &mismatched {
            for &c in &desired[&p] {
                self.add_child(p, c);
            }
        }
        u32::try_from(mismatched.len()).unwrap_or(u32::MAX)
    }

    /// Copies the style-derived bits of a layer from its box and dirties
    /// what a change affects.
    pub fn refresh_layer_style(&mut self, boxes: &BoxTree, settings: &CompositorSettings, id: PaintLayerId) {
        let b = self.box_of(id);
        let Some(lb) = boxes.try_get(b) else {
            return;
        };
        let stacking_context = matches!(lb.kind, BoxKind::View) || lb.style.creates_stacking_context();
        let positioned = lb.style.position.is_positioned();
        let z_index = lb.style.z_index.unwrap_or(0);
        let preserves_3d = lb.style.preserve_3d;
        let transform = lb.style.transform_about_origin();
        let scrollable = ScrollableArea::from_box(lb, settings);

        let r = self.record(id);
        let stacking_changed =
            r.stacking_context != stacking_context || r.positioned != positioned || r.z_index != z_index;
        let transform_changed = r.transform != transform;
        let three_d_changed = r.preserves_3d != preserves_3d
            || r.transform.is_some_and(|t| !t.is_affine_2d()) != transform.is_some_and(|t| !t.is_affine_2d());
        let scroll_changed = r.scrollable != scrollable;

        let r = self.record_mut(id);
        r.stacking_context = stacking_context;
        r.positioned = positioned;
        r.z_index = z_index;
        r.preserves_3d = preserves_3d;
        r.transform = transform;
        r.scrollable = scrollable;

        if stacking_changed {
            self.dirty_stacking_context_z_order_lists(id);
        }
        if three_d_changed && let Some(parent) = self.parent(id) {
            self.dirty_ancestor_descendant_flags(parent);
        }
        if stacking_changed || transform_changed || three_d_changed || scroll_changed {
            self.dirty.mark(id.idx, dirty::CONFIGURATION);
            self.mark_geometry_dirty(id);
        }
        self.update_self_painting(boxes, id);
    }
}
