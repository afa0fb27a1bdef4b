// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Self-painting status and descendant-dependent flags.
//!
//! Visibility and descendant summaries are [`Cached`] values. Mutations
//! invalidate them explicitly and upward; the update pass recomputes stale
//! values bottom-up. Getters never recompute and panic on stale reads.

use super::id::PaintLayerId;
use super::tree::PaintLayerTree;
use crate::box_tree::{BoxId, BoxTree, LayerType};
use crate::cached::Cached;

/// Flags summarizing a layer's own content and its descendants.
#[derive(Clone, Debug, Default)]
pub(crate) struct DescendantFlags {
    pub(crate) has_visible_content: Cached<bool>,
    pub(crate) has_visible_descendant: Cached<bool>,
    pub(crate) has_self_painting_descendant: Cached<bool>,
    pub(crate) has_3d_transformed_descendant: Cached<bool>,
}

impl DescendantFlags {
    /// Invalidates the descendant summaries. Returns `true` if any was
    /// current.
    fn invalidate_descendant_summaries(&mut self) -> bool {
        let a = self.has_visible_descendant.invalidate();
        let b = self.has_self_painting_descendant.invalidate();
        let c = self.has_3d_transformed_descendant.invalidate();
        a | b | c
    }

    fn any_descendant_summary_stale(&self) -> bool {
        self.has_visible_descendant.is_stale()
            || self.has_self_painting_descendant.is_stale()
            || self.has_3d_transformed_descendant.is_stale()
    }
}

impl PaintLayerTree {
    /// Whether the layer paints itself (and is therefore visited by paint
    /// and hit testing) rather than painting into its parent.
    #[must_use]
    pub fn is_self_painting(&self, id: PaintLayerId) -> bool {
        self.record(id).self_painting
    }

    /// Whether the layer or non-layer boxes painting into it show anything.
    ///
    /// # Panics
    ///
    /// Panics if the flag is stale.
    #[track_caller]
    #[must_use]
    pub fn has_visible_content(&self, id: PaintLayerId) -> bool {
        self.record(id)
            .flags
            .has_visible_content
            .expect_current("has_visible_content")
    }

    /// Whether any descendant layer shows anything.
    ///
    /// # Panics
    ///
    /// Panics if the flag is stale.
    #[track_caller]
    #[must_use]
    pub fn has_visible_descendant(&self, id: PaintLayerId) -> bool {
        self.record(id)
            .flags
            .has_visible_descendant
            .expect_current("has_visible_descendant")
    }

    /// Whether any descendant layer is self-painting.
    ///
    /// # Panics
    ///
    /// Panics if the flag is stale.
    #[track_caller]
    #[must_use]
    pub fn has_self_painting_descendant(&self, id: PaintLayerId) -> bool {
        self.record(id)
            .flags
            .has_self_painting_descendant
            .expect_current("has_self_painting_descendant")
    }

    /// Whether a descendant in this layer's 3D rendering context has a 3D
    /// transform.
    ///
    /// # Panics
    ///
    /// Panics if the flag is stale.
    #[track_caller]
    #[must_use]
    pub fn has_3d_transformed_descendant(&self, id: PaintLayerId) -> bool {
        self.record(id)
            .flags
            .has_3d_transformed_descendant
            .expect_current("has_3d_transformed_descendant")
    }

    /// Whether the descendant-dependent flags of `id` are current.
    #[must_use]
    pub fn descendant_flags_current(&self, id: PaintLayerId) -> bool {
        let f = &self.record(id).flags;
        !f.has_visible_content.is_stale() && !f.any_descendant_summary_stale()
    }

    /// Recomputes whether the layer is self-painting. On a change, dirties
    /// the ancestor chain's self-painting-descendant flags and the parent's
    /// visible content. Returns whether the status changed.
    pub fn update_self_painting(&mut self, boxes: &BoxTree, id: PaintLayerId) -> bool {
        let record = self.record(id);
        let b = boxes.get(record.box_id);
        let should = record.layer_type == LayerType::Normal
            || record
                .scrollable
                .as_ref()
                .is_some_and(|s| s.has_overlay_scrollbars() || s.needs_composited_scrolling())
            || b.kind.requires_accelerated_compositing();
        if should == record.self_painting {
            return false;
        }
        self.record_mut(id).self_painting = should;
        if let Some(parent) = self.parent(id) {
            self.record_mut(parent).flags.has_visible_content.invalidate();
            self.dirty_ancestor_descendant_flags(parent);
        }
        true
    }

    /// Marks a layer's visible content stale and dirties its ancestors.
    pub fn dirty_visible_content_status(&mut self, id: PaintLayerId) {
        self.record_mut(id).flags.has_visible_content.invalidate();
        if let Some(parent) = self.parent(id) {
            if !self.record(id).self_painting {
                self.record_mut(parent).flags.has_visible_content.invalidate();
            }
            self.dirty_ancestor_descendant_flags(parent);
        }
    }

    /// Invalidates descendant summaries from `from` to the root.
    ///
    /// Stops at the first layer whose summaries were already stale: by
    /// invariant its ancestors are stale too.
    pub(crate) fn dirty_ancestor_descendant_flags(&mut self, from: PaintLayerId) {
        let mut cur = Some(from);
        while let Some(l) = cur {
            if !self.record_mut(l).flags.invalidate_descendant_summaries() {
                break;
            }
            cur = self.parent(l);
        }
    }

    /// Recomputes every stale descendant-dependent flag in the subtree at
    /// `id`, children before parents.
    pub fn update_descendant_dependent_flags(&mut self, boxes: &BoxTree, id: PaintLayerId) {
        let children: alloc::vec::Vec<PaintLayerId> = self.children(id).collect();
        for &child in &children {
            if !self.descendant_flags_current(child) {
                self.update_descendant_dependent_flags(boxes, child);
            }
        }

        if self.record(id).flags.any_descendant_summary_stale() {
            let mut visible = false;
            let mut self_painting = false;
            let mut has_3d = false;
            for &child in &children {
                let c = self.record(child);
                let c_visible = c.flags.has_visible_content.expect_current("child visibility");
                visible |= c_visible || c.flags.has_visible_descendant.expect_current("child visibility");
                self_painting |= c.self_painting
                    || c.flags
                        .has_self_painting_descendant
                        .expect_current("child self-painting");
                has_3d |= c.transform.is_some_and(|t| !t.is_affine_2d())
                    || (c.preserves_3d
                        && c.flags
                            .has_3d_transformed_descendant
                            .expect_current("child 3d"));
            }
            let flags = &mut self.record_mut(id).flags;
            flags.has_visible_descendant.set(visible);
            flags.has_self_painting_descendant.set(self_painting);
            flags.has_3d_transformed_descendant.set(has_3d);
        }

        if self.record(id).flags.has_visible_content.is_stale() {
            let own = self.compute_visible_content(boxes, id, &children);
            self.record_mut(id).flags.has_visible_content.set(own);
        }
    }

    /// Whether the layer's box, the non-layer boxes painting into it, or its
    /// non-self-painting child layers show anything.
    fn compute_visible_content(
        &self,
        boxes: &BoxTree,
        id: PaintLayerId,
        children: &[PaintLayerId],
    ) -> bool {
        let root_box = self.record(id).box_id;
        if boxes.is_alive(root_box) && box_subtree_paints(boxes, root_box) {
            return true;
        }
        children.iter().any(|&c| {
            let r = self.record(c);
            !r.self_painting
                && r.flags
                    .has_visible_content
                    .get()
                    .copied()
                    .unwrap_or(false)
        })
    }
}

/// Whether `root` or any descendant box that does not own a layer paints.
fn box_subtree_paints(boxes: &BoxTree, root: BoxId) -> bool {
    let mut stack = alloc::vec![root];
    while let Some(b) = stack.pop() {
        let lb = boxes.get(b);
        if b != root && lb.layer().is_some() {
            continue;
        }
        if lb.paints_something() {
            return true;
        }
        stack.extend(boxes.children(b).iter().copied());
    }
    false
}
