// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint layer storage: allocation, topology, and two-step teardown.

use alloc::boxed::Box;
use alloc::vec::Vec;

use kurbo::{Point, Vec2};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::composited::CompositedState;
use super::flags::DescendantFlags;
use super::id::{INVALID, PaintLayerId};
use super::pagination::Pagination;
use super::scrollable::ScrollableArea;
use super::traverse::{Ancestors, Children};
use super::z_order::ZOrderLists;
use crate::box_tree::{BoxId, LayerType};
use crate::compositing::{CompositingReasons, LayerMapping, SurfaceAllocator};
use crate::dirty;
use crate::transform::Transform3d;

/// Per-layer record. Topology lives in the tree's parallel arrays.
#[derive(Debug)]
pub(crate) struct PaintLayer {
    pub(crate) box_id: BoxId,
    pub(crate) layer_type: LayerType,
    /// Origin relative to the parent layer, in layout space.
    pub(crate) location: Point,
    /// Transform about its origin, in layer space.
    pub(crate) transform: Option<Transform3d>,
    pub(crate) stacking_context: bool,
    pub(crate) positioned: bool,
    pub(crate) z_index: i32,
    pub(crate) preserves_3d: bool,
    pub(crate) self_painting: bool,
    pub(crate) flags: DescendantFlags,
    pub(crate) subpixel_accumulation: Vec2,
    pub(crate) reasons: CompositingReasons,
    pub(crate) composited: CompositedState,
    pub(crate) z_order: ZOrderLists,
    pub(crate) scrollable: Option<ScrollableArea>,
    pub(crate) pagination: Option<Pagination>,
}

impl PaintLayer {
    fn new(box_id: BoxId, layer_type: LayerType) -> Self {
        Self {
            box_id,
            layer_type,
            location: Point::ZERO,
            transform: None,
            stacking_context: false,
            positioned: false,
            z_index: 0,
            preserves_3d: false,
            self_painting: layer_type == LayerType::Normal,
            flags: DescendantFlags::default(),
            subpixel_accumulation: Vec2::ZERO,
            reasons: CompositingReasons::empty(),
            composited: CompositedState::NotComposited,
            z_order: ZOrderLists::default(),
            scrollable: None,
            pagination: None,
        }
    }
}

/// The tree of paint layers, parallel to the layer-inducing subset of the
/// box tree.
///
/// Layers are addressed by [`PaintLayerId`] handles. Topology is stored as
/// parallel index arrays; per-layer state lives in one record per slot.
/// Destroyed layers are recycled via a free list, and generation counters
/// prevent stale handle access.
#[derive(Debug)]
pub struct PaintLayerTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) last_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Records --
    pub(crate) layers: Vec<Option<PaintLayer>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
    pub(crate) root: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Traversal cache --
    pub(crate) traversal_order: Vec<u32>,
    pub(crate) traversal_dirty: bool,
}

impl Default for PaintLayerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PaintLayerTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            last_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            layers: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            root: INVALID,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            traversal_order: Vec::new(),
            traversal_dirty: true,
        }
    }

    // -- Allocation API --

    /// Creates a detached layer for `box_id`.
    ///
    /// The first layer created becomes the root.
    pub fn create_layer(&mut self, box_id: BoxId, layer_type: LayerType) -> PaintLayerId {
        let record = PaintLayer::new(box_id, layer_type);
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot; its generation was bumped on destroy.
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.last_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.layers[i] = Some(record);
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.last_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.layers.push(Some(record));
            self.generation.push(0);
            idx
        };
        if self.root == INVALID {
            self.root = idx;
        }

        self.traversal_dirty = true;
        self.dirty.mark(idx, dirty::TOPOLOGY);
        self.dirty.mark(idx, dirty::POSITION);
        self.dirty.mark(idx, dirty::CONFIGURATION);

        self.id_at(idx)
    }

    /// Unlinks a layer from the tree and releases its squashing
    /// relationships. Its layer mapping, if any, stays allocated until
    /// [`destroy_layer`](Self::destroy_layer).
    ///
    /// Detaching an already detached layer only releases squashing.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer still has children.
    pub fn detach_layer(&mut self, id: PaintLayerId) {
        self.validate(id);
        assert!(
            self.first_child[id.idx as usize] == INVALID,
            "cannot detach layer with children"
        );
        if self.parent[id.idx as usize] != INVALID {
            self.remove_child(id);
        }
        self.release_squashing(id);
        if self.root == id.idx {
            self.root = INVALID;
        }
    }

    /// Releases a detached layer's backing storage and frees its slot.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer is still attached.
    pub fn destroy_layer(&mut self, id: PaintLayerId, allocator: &mut dyn SurfaceAllocator) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.parent[idx as usize] == INVALID
                && self.first_child[idx as usize] == INVALID
                && self.root != idx,
            "cannot destroy an attached layer; detach it first"
        );
        let record = self.layers[idx as usize].take();
        if let Some(PaintLayer {
            composited: CompositedState::Owns(mapping),
            ..
        }) = record
        {
            release_mapping(mapping, allocator);
        }

        self.dirty.remove_key(idx);
        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
        self.traversal_dirty = true;
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: PaintLayerId) -> bool {
        id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && self.layers[id.idx as usize].is_some()
    }

    /// The root layer (the view's), if created.
    #[must_use]
    pub fn root(&self) -> Option<PaintLayerId> {
        (self.root != INVALID).then(|| self.id_at(self.root))
    }

    /// Number of live layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.iter().filter(|l| l.is_some()).count()
    }

    /// Whether no layers are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Topology API --

    /// Appends `child` as the last child of `parent`.
    ///
    /// Marks the affected z-order lists dirty, dirties descendant-dependent
    /// flags up the ancestor chain, and dirties the parent's visible content
    /// when the child paints into it.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: PaintLayerId, child: PaintLayerId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        assert!(c != self.root, "the root layer cannot be a child");

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;
        let last = self.last_child[p as usize];
        if last == INVALID {
            self.first_child[p as usize] = c;
        } else {
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }
        self.last_child[p as usize] = c;

        self.child_list_changed(p, c);
        self.link_dependencies(c, p);
    }

    /// Inserts `child` before `sibling`.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or
    /// `sibling` has no parent.
    pub fn insert_before(&mut self, child: PaintLayerId, sibling: PaintLayerId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];
        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.child_list_changed(p, c);
        self.link_dependencies(c, p);
    }

    /// Removes `child` from its parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer has no parent.
    pub fn remove_child(&mut self, child: PaintLayerId) {
        self.validate(child);
        let c = child.idx;
        let p = self.parent[c as usize];
        assert!(p != INVALID, "layer has no parent");

        // Dirty while the child is still linked so the walk reaches the
        // old ancestors.
        self.child_list_changed(p, c);
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::POSITION);
        self.dirty.remove_dependency(c, p, dirty::GEOMETRY);
        self.dirty.mark_with(c, dirty::POSITION, &EagerPolicy);
    }

    /// Returns the parent of a layer, if any.
    #[must_use]
    pub fn parent(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of a layer.
    #[must_use]
    pub fn children(&self, id: PaintLayerId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns an iterator over the strict ancestors of a layer.
    #[must_use]
    pub fn ancestors(&self, id: PaintLayerId) -> Ancestors<'_> {
        self.validate(id);
        Ancestors::new(self, id.idx)
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    #[must_use]
    pub fn is_descendant_of(&self, id: PaintLayerId, ancestor: PaintLayerId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// The depth-first pre-order of all attached layers.
    ///
    /// Rebuilt lazily after topology changes.
    pub fn traversal_order(&mut self) -> &[u32] {
        if self.traversal_dirty {
            self.rebuild_traversal_order();
            self.traversal_dirty = false;
        }
        &self.traversal_order
    }

    /// Layer handles in depth-first pre-order.
    pub fn pre_order(&mut self) -> Vec<PaintLayerId> {
        let order: Vec<u32> = self.traversal_order().to_vec();
        order.into_iter().map(|i| self.id_at(i)).collect()
    }

    // -- Per-layer getters --

    /// The box that owns this layer.
    #[must_use]
    pub fn box_of(&self, id: PaintLayerId) -> BoxId {
        self.record(id).box_id
    }

    /// The layer's type.
    #[must_use]
    pub fn layer_type(&self, id: PaintLayerId) -> LayerType {
        self.record(id).layer_type
    }

    /// The layer's origin relative to its parent layer, in layout space.
    ///
    /// Only valid after
    /// [`update_layer_positions_after_layout`](Self::update_layer_positions_after_layout).
    #[must_use]
    pub fn location(&self, id: PaintLayerId) -> Point {
        self.record(id).location
    }

    /// The layer's transform about its origin, in layer space.
    #[must_use]
    pub fn transform(&self, id: PaintLayerId) -> Option<Transform3d> {
        self.record(id).transform
    }

    /// The fractional remainder discarded when this layer's offset from its
    /// compositing ancestor was snapped. Painting reapplies it.
    #[must_use]
    pub fn subpixel_accumulation(&self, id: PaintLayerId) -> Vec2 {
        self.record(id).subpixel_accumulation
    }

    /// The reasons the overlap collaborator assigned.
    #[must_use]
    pub fn compositing_reasons(&self, id: PaintLayerId) -> CompositingReasons {
        self.record(id).reasons
    }

    /// The scrollable area sub-object, for layers that scroll.
    #[must_use]
    pub fn scrollable_area(&self, id: PaintLayerId) -> Option<&ScrollableArea> {
        self.record(id).scrollable.as_ref()
    }

    /// Every live layer, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = PaintLayerId> + '_ {
        (0..self.len)
            .filter(|&i| self.layers[i as usize].is_some())
            .map(|i| self.id_at(i))
    }

    // -- Dirty tracking --

    /// Marks a layer's surfaces for re-measurement, with its descendants.
    pub fn mark_geometry_dirty(&mut self, id: PaintLayerId) {
        self.validate(id);
        self.dirty.mark_with(id.idx, dirty::GEOMETRY, &EagerPolicy);
    }

    /// Marks a layer's compositing inputs as changed.
    pub fn mark_configuration_dirty(&mut self, id: PaintLayerId) {
        self.validate(id);
        self.dirty.mark(id.idx, dirty::CONFIGURATION);
    }

    /// Marks every live layer for re-measurement.
    pub fn mark_all_geometry_dirty(&mut self) {
        for idx in 0..self.len {
            if self.layers[idx as usize].is_some() {
                self.dirty.mark(idx, dirty::GEOMETRY);
            }
        }
    }

    /// Drains a dirty channel, returning affected live layers in
    /// deterministic order.
    pub(crate) fn drain_dirty(&mut self, channel: understory_dirty::Channel) -> Vec<PaintLayerId> {
        let raw: Vec<u32> = self
            .dirty
            .drain(channel)
            .affected()
            .deterministic()
            .run()
            .collect();
        raw.into_iter()
            .filter(|&i| i < self.len && self.layers[i as usize].is_some())
            .map(|i| self.id_at(i))
            .collect()
    }

    // -- Internal helpers --

    pub(crate) fn id_at(&self, idx: u32) -> PaintLayerId {
        PaintLayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    #[track_caller]
    pub(crate) fn validate(&self, id: PaintLayerId) {
        assert!(
            self.is_alive(id),
            "stale PaintLayerId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    #[track_caller]
    pub(crate) fn record(&self, id: PaintLayerId) -> &PaintLayer {
        match self.layers.get(id.idx as usize) {
            Some(Some(layer)) if self.generation[id.idx as usize] == id.generation => layer,
            _ => panic!("stale PaintLayerId: {id:?}"),
        }
    }

    #[track_caller]
    pub(crate) fn record_mut(&mut self, id: PaintLayerId) -> &mut PaintLayer {
        let current = self.generation.get(id.idx as usize).copied();
        match self.layers.get_mut(id.idx as usize) {
            Some(Some(layer)) if current == Some(id.generation) => layer,
            _ => panic!("stale PaintLayerId: {id:?}"),
        }
    }

    /// Dirties what a change to `p`'s child list affects.
    fn child_list_changed(&mut self, p: u32, c: u32) {
        let parent = self.id_at(p);
        let child = self.id_at(c);
        self.dirty_z_order_lists_for(child, parent);
        self.dirty_ancestor_descendant_flags(parent);
        if !self.record(child).self_painting {
            self.record_mut(parent).flags.has_visible_content.invalidate();
        }
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    fn link_dependencies(&mut self, c: u32, p: u32) {
        let _ = self.dirty.add_dependency(c, p, dirty::POSITION);
        let _ = self.dirty.add_dependency(c, p, dirty::GEOMETRY);
        self.dirty.mark_with(c, dirty::POSITION, &EagerPolicy);
        self.dirty.mark_with(c, dirty::GEOMETRY, &EagerPolicy);
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        } else {
            self.last_child[p as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    fn rebuild_traversal_order(&mut self) {
        self.traversal_order.clear();
        if self.root == INVALID {
            return;
        }
        let mut stack = alloc::vec![self.root];
        while let Some(idx) = stack.pop() {
            self.traversal_order.push(idx);
            let mut children = Vec::new();
            let mut c = self.first_child[idx as usize];
            while c != INVALID {
                children.push(c);
                c = self.next_sibling[c as usize];
            }
            stack.extend(children.into_iter().rev());
        }
    }
}

/// Returns every surface of a mapping to the allocator.
pub(crate) fn release_mapping(mapping: Box<LayerMapping>, allocator: &mut dyn SurfaceAllocator) {
    for handle in mapping.surface_handles() {
        allocator.release(handle);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::compositing::SurfacePool;

    fn box_id(idx: u32) -> BoxId {
        BoxId { idx, generation: 0 }
    }

    fn tree_with_root() -> (PaintLayerTree, PaintLayerId) {
        let mut tree = PaintLayerTree::new();
        let root = tree.create_layer(box_id(0), LayerType::Normal);
        (tree, root)
    }

    #[test]
    fn first_layer_is_root() {
        let (tree, root) = tree_with_root();
        assert_eq!(tree.root(), Some(root));
    }

    #[test]
    fn detach_then_destroy() {
        let (mut tree, root) = tree_with_root();
        let mut pool = SurfacePool::new(None);
        let id = tree.create_layer(box_id(1), LayerType::Normal);
        tree.add_child(root, id);
        tree.detach_layer(id);
        assert!(tree.is_alive(id), "detach keeps the slot");
        assert_eq!(tree.parent(id), None);
        tree.destroy_layer(id, &mut pool);
        assert!(!tree.is_alive(id));
    }

    #[test]
    #[should_panic(expected = "detach it first")]
    fn destroy_attached_panics() {
        let (mut tree, root) = tree_with_root();
        let mut pool = SurfacePool::new(None);
        let id = tree.create_layer(box_id(1), LayerType::Normal);
        tree.add_child(root, id);
        tree.destroy_layer(id, &mut pool);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let (mut tree, _) = tree_with_root();
        let mut pool = SurfacePool::new(None);
        let id1 = tree.create_layer(box_id(1), LayerType::Normal);
        tree.destroy_layer(id1, &mut pool);
        let id2 = tree.create_layer(box_id(2), LayerType::Normal);
        assert!(!tree.is_alive(id1));
        assert!(tree.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn insert_before_and_remove() {
        let (mut tree, root) = tree_with_root();
        let a = tree.create_layer(box_id(1), LayerType::Normal);
        let b = tree.create_layer(box_id(2), LayerType::Normal);
        let c = tree.create_layer(box_id(3), LayerType::Normal);
        tree.add_child(root, a);
        tree.add_child(root, c);
        tree.insert_before(b, c);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, b, c]);

        tree.remove_child(c);
        tree.add_child(root, c);
        tree.remove_child(a);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(tree.last_child[root.idx as usize], c.idx);
    }

    #[test]
    fn traversal_is_pre_order() {
        let (mut tree, root) = tree_with_root();
        let a = tree.create_layer(box_id(1), LayerType::Normal);
        let a1 = tree.create_layer(box_id(2), LayerType::Normal);
        let b = tree.create_layer(box_id(3), LayerType::Normal);
        tree.add_child(root, a);
        tree.add_child(a, a1);
        tree.add_child(root, b);
        assert_eq!(tree.pre_order(), vec![root, a, a1, b]);
        assert_eq!(tree.ancestors(a1).collect::<Vec<_>>(), vec![a, root]);
    }

    #[test]
    fn non_self_painting_child_dirties_parent_visibility() {
        let (mut tree, root) = tree_with_root();
        tree.record_mut(root).flags.has_visible_content.set(false);
        let clip = tree.create_layer(box_id(1), LayerType::OverflowClip);
        tree.add_child(root, clip);
        assert!(tree.record(root).flags.has_visible_content.is_stale());

        tree.record_mut(root).flags.has_visible_content.set(false);
        let normal = tree.create_layer(box_id(2), LayerType::Normal);
        tree.add_child(root, normal);
        assert!(
            !tree.record(root).flags.has_visible_content.is_stale(),
            "self-painting children paint themselves"
        );
        assert!(tree.record(root).flags.has_self_painting_descendant.is_stale());
    }

    #[test]
    #[should_panic(expected = "child already has a parent")]
    fn double_add_panics() {
        let (mut tree, root) = tree_with_root();
        let a = tree.create_layer(box_id(1), LayerType::Normal);
        tree.add_child(root, a);
        tree.add_child(root, a);
    }

    #[test]
    #[should_panic(expected = "stale PaintLayerId")]
    fn destroyed_handle_panics_on_parent() {
        let (mut tree, _) = tree_with_root();
        let mut pool = SurfacePool::new(None);
        let id = tree.create_layer(box_id(1), LayerType::Normal);
        tree.destroy_layer(id, &mut pool);
        let _ = tree.parent(id);
    }
}
