// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stacking contexts and z-order lists.

use alloc::vec::Vec;

use super::id::PaintLayerId;
use super::tree::PaintLayerTree;

/// Paint-order lists held by every layer.
///
/// Stacking contexts collect their positioned and stacking descendants into
/// `negative` and `positive`, sorted by z-index with tree order breaking
/// ties. Every layer keeps its own `normal_flow` list of children that are
/// neither positioned nor stacking contexts.
#[derive(Clone, Debug)]
pub(crate) struct ZOrderLists {
    pub(crate) negative: Vec<PaintLayerId>,
    pub(crate) positive: Vec<PaintLayerId>,
    pub(crate) normal_flow: Vec<PaintLayerId>,
    pub(crate) dirty: bool,
}

impl Default for ZOrderLists {
    fn default() -> Self {
        Self {
            negative: Vec::new(),
            positive: Vec::new(),
            normal_flow: Vec::new(),
            dirty: true,
        }
    }
}

impl PaintLayerTree {
    /// Whether the layer starts a stacking context. The root always does.
    #[must_use]
    pub fn is_stacking_context(&self, id: PaintLayerId) -> bool {
        self.root == id.idx || self.record(id).stacking_context
    }

    /// Whether the layer takes part in z-ordering (positioned or a stacking
    /// context) instead of painting in normal flow.
    #[must_use]
    pub fn is_normal_flow_only(&self, id: PaintLayerId) -> bool {
        let r = self.record(id);
        !r.positioned && !self.is_stacking_context(id)
    }

    /// The z-index used for ordering.
    #[must_use]
    pub fn z_index(&self, id: PaintLayerId) -> i32 {
        self.record(id).z_index
    }

    /// Nearest strict ancestor that is a stacking context.
    #[must_use]
    pub fn ancestor_stacking_context(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        self.ancestors(id).find(|&a| self.is_stacking_context(a))
    }

    /// Dirties the lists that would contain `child` once it hangs off
    /// `parent`: the parent's normal-flow list and the z-order lists of the
    /// stacking context at or above `parent`.
    pub(crate) fn dirty_z_order_lists_for(&mut self, child: PaintLayerId, parent: PaintLayerId) {
        _ = child;
        self.record_mut(parent).z_order.dirty = true;
        let sc = if self.is_stacking_context(parent) {
            Some(parent)
        } else {
            self.ancestor_stacking_context(parent)
        };
        if let Some(sc) = sc {
            self.record_mut(sc).z_order.dirty = true;
        }
    }

    /// Dirties the lists a layer appears in. Used when the layer's
    /// positioning, z-index or stacking status changes.
    pub fn dirty_stacking_context_z_order_lists(&mut self, id: PaintLayerId) {
        self.record_mut(id).z_order.dirty = true;
        if let Some(parent) = self.parent(id) {
            self.dirty_z_order_lists_for(id, parent);
        }
        // A layer that stopped being a stacking context hands its
        // descendants to the next one up.
        if let Some(sc) = self.ancestor_stacking_context(id) {
            self.record_mut(sc).z_order.dirty = true;
        }
    }

    /// Rebuilds the layer's lists if dirty.
    pub fn update_z_order_lists(&mut self, id: PaintLayerId) {
        if !self.record(id).z_order.dirty {
            return;
        }
        let normal_flow: Vec<PaintLayerId> = self
            .children(id)
            .filter(|&c| self.is_normal_flow_only(c))
            .collect();

        let mut negative = Vec::new();
        let mut positive = Vec::new();
        if self.is_stacking_context(id) {
            let mut collected = Vec::new();
            self.collect_stacked_descendants(id, &mut collected);
            // Stable sort keeps tree order for equal z-index.
            collected.sort_by_key(|&l| self.z_index(l));
            for l in collected {
                if self.z_index(l) < 0 {
                    negative.push(l);
                } else {
                    positive.push(l);
                }
            }
        }

        let lists = &mut self.record_mut(id).z_order;
        lists.negative = negative;
        lists.positive = positive;
        lists.normal_flow = normal_flow;
        lists.dirty = false;
    }

    /// Rebuilds every dirty list in the tree.
    pub fn update_all_z_order_lists(&mut self) {
        for id in self.pre_order() {
            self.update_z_order_lists(id);
        }
    }

    /// Descendants with negative z-index, in paint order.
    ///
    /// # Panics
    ///
    /// Panics if the lists are stale.
    #[track_caller]
    #[must_use]
    pub fn negative_z_order_list(&self, id: PaintLayerId) -> &[PaintLayerId] {
        &self.current_z_order(id).negative
    }

    /// Descendants with zero or positive z-index, in paint order.
    ///
    /// # Panics
    ///
    /// Panics if the lists are stale.
    #[track_caller]
    #[must_use]
    pub fn positive_z_order_list(&self, id: PaintLayerId) -> &[PaintLayerId] {
        &self.current_z_order(id).positive
    }

    /// Children painting in normal flow, in tree order.
    ///
    /// # Panics
    ///
    /// Panics if the lists are stale.
    #[track_caller]
    #[must_use]
    pub fn normal_flow_list(&self, id: PaintLayerId) -> &[PaintLayerId] {
        &self.current_z_order(id).normal_flow
    }

    /// Every layer under the stacking context `id`, back to front,
    /// starting with the negative z-order descendants and ending with the
    /// positive ones.
    #[must_use]
    pub fn paint_order(&self, id: PaintLayerId) -> Vec<PaintLayerId> {
        let mut out = Vec::new();
        self.push_paint_order(id, &mut out);
        out
    }

    fn push_paint_order(&self, id: PaintLayerId, out: &mut Vec<PaintLayerId>) {
        let lists = self.current_z_order(id);
        for &l in &lists.negative {
            self.push_paint_order(l, out);
        }
        out.push(id);
        for &l in &lists.normal_flow {
            self.push_paint_order(l, out);
        }
        for &l in &lists.positive {
            self.push_paint_order(l, out);
        }
    }

    fn collect_stacked_descendants(&self, id: PaintLayerId, out: &mut Vec<PaintLayerId>) {
        for child in self.children(id) {
            if !self.is_normal_flow_only(child) {
                out.push(child);
            }
            if !self.is_stacking_context(child) {
                self.collect_stacked_descendants(child, out);
            }
        }
    }

    #[track_caller]
    fn current_z_order(&self, id: PaintLayerId) -> &ZOrderLists {
        let lists = &self.record(id).z_order;
        assert!(!lists.dirty, "z-order lists of {id:?} are stale");
        lists
    }
}
