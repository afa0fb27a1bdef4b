// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer compositing state.
//!
//! Each layer is in exactly one of three states: painting into an ancestor's
//! backing, owning a [`LayerMapping`], or squashed into another layer's
//! mapping. The enum makes "owns" and "squashed" mutually exclusive by
//! construction.

use alloc::boxed::Box;

use super::id::PaintLayerId;
use super::tree::{PaintLayerTree, release_mapping};
use crate::compositing::{LayerMapping, SurfaceAllocator};
use crate::dirty;
use crate::lifecycle::CompositingQuery;

/// A layer's backing arrangement.
#[derive(Debug, Default)]
pub enum CompositedState {
    /// Paints into its enclosing composited layer.
    #[default]
    NotComposited,
    /// Owns a layer mapping.
    Owns(Box<LayerMapping>),
    /// Paints into the squashing surface of the named layer's mapping.
    SquashedInto(PaintLayerId),
}

/// A copyable summary of [`CompositedState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositingState {
    /// Paints into its enclosing composited layer.
    NotComposited,
    /// Owns a layer mapping.
    OwnsBacking,
    /// Squashed into `owner`'s mapping.
    Squashed {
        /// The layer owning the squashing surface.
        owner: PaintLayerId,
    },
}

impl PaintLayerTree {
    /// The layer's compositing state.
    #[must_use]
    pub fn compositing_state(&self, id: PaintLayerId, _q: CompositingQuery<'_>) -> CompositingState {
        match &self.record(id).composited {
            CompositedState::NotComposited => CompositingState::NotComposited,
            CompositedState::Owns(_) => CompositingState::OwnsBacking,
            CompositedState::SquashedInto(owner) => CompositingState::Squashed { owner: *owner },
        }
    }

    /// The layer's own mapping, if it owns one.
    #[must_use]
    pub fn mapping(&self, id: PaintLayerId, _q: CompositingQuery<'_>) -> Option<&LayerMapping> {
        self.mapping_unchecked(id)
    }

    /// The mapping this layer's content is painted into: its own, its
    /// squashing owner's, or the nearest composited ancestor's.
    #[must_use]
    pub fn paint_invalidation_container(
        &self,
        id: PaintLayerId,
        _q: CompositingQuery<'_>,
    ) -> Option<PaintLayerId> {
        let mut cur = Some(id);
        while let Some(l) = cur {
            match &self.record(l).composited {
                CompositedState::Owns(_) => return Some(l),
                CompositedState::SquashedInto(owner) => return Some(*owner),
                CompositedState::NotComposited => cur = self.compositing_container(l),
            }
        }
        None
    }

    /// Nearest ancestor, following compositing containers, that owns a
    /// mapping. The layer itself is not considered.
    #[must_use]
    pub fn compositing_ancestor(
        &self,
        id: PaintLayerId,
        _q: CompositingQuery<'_>,
    ) -> Option<PaintLayerId> {
        self.compositing_ancestor_unchecked(id)
    }

    /// Whether any layer in the subtree below `id` owns a mapping.
    #[must_use]
    pub fn has_composited_descendant(&self, id: PaintLayerId, _q: CompositingQuery<'_>) -> bool {
        self.has_composited_descendant_unchecked(id)
    }

    // -- Crate-internal access used by the compositing passes --

    pub(crate) fn compositing_state_unchecked(&self, id: PaintLayerId) -> CompositingState {
        self.compositing_state(id, CompositingQuery::known_safe())
    }

    pub(crate) fn owns_mapping(&self, id: PaintLayerId) -> bool {
        matches!(self.record(id).composited, CompositedState::Owns(_))
    }

    pub(crate) fn mapping_unchecked(&self, id: PaintLayerId) -> Option<&LayerMapping> {
        match &self.record(id).composited {
            CompositedState::Owns(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn mapping_mut(&mut self, id: PaintLayerId) -> Option<&mut LayerMapping> {
        match &mut self.record_mut(id).composited {
            CompositedState::Owns(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn squashing_owner(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        match self.record(id).composited {
            CompositedState::SquashedInto(owner) => Some(owner),
            _ => None,
        }
    }

    pub(crate) fn compositing_ancestor_unchecked(&self, id: PaintLayerId) -> Option<PaintLayerId> {
        let mut cur = self.compositing_container(id);
        while let Some(l) = cur {
            if self.owns_mapping(l) {
                return Some(l);
            }
            cur = self.compositing_container(l);
        }
        None
    }

    pub(crate) fn has_composited_descendant_unchecked(&self, id: PaintLayerId) -> bool {
        let mut stack: alloc::vec::Vec<PaintLayerId> = self.children(id).collect();
        while let Some(l) = stack.pop() {
            if self.owns_mapping(l) {
                return true;
            }
            stack.extend(self.children(l));
        }
        false
    }

    /// Gives `id` a mapping. Any squashing relationship is released first.
    pub(crate) fn set_owns(&mut self, id: PaintLayerId, mapping: Box<LayerMapping>) {
        self.release_squashing(id);
        self.record_mut(id).composited = CompositedState::Owns(mapping);
        self.dirty.mark(id.idx, dirty::CONFIGURATION);
        self.mark_geometry_dirty(id);
        self.mark_former_backing_dirty(id);
    }

    /// Marks the mappings whose bounds included `id`'s content for
    /// re-measuring: the compositing ancestor and the nearest owning
    /// ancestor in the layer tree.
    fn mark_former_backing_dirty(&mut self, id: PaintLayerId) {
        let owning_parent = self.ancestors(id).find(|&a| self.owns_mapping(a));
        let ca = self.compositing_ancestor_unchecked(id);
        for l in [owning_parent, ca].into_iter().flatten() {
            self.dirty.mark(l.idx, dirty::GEOMETRY);
        }
    }

    /// Drops `id`'s mapping (releasing its surfaces) and any squashing
    /// relationship.
    pub(crate) fn set_not_composited(&mut self, id: PaintLayerId, allocator: &mut dyn SurfaceAllocator) {
        self.release_squashing(id);
        let old = core::mem::take(&mut self.record_mut(id).composited);
        if let CompositedState::Owns(mapping) = old {
            release_mapping(mapping, allocator);
            self.mark_geometry_dirty(id);
        }
        self.dirty.mark(id.idx, dirty::CONFIGURATION);
    }

    /// Squashes `member` into `owner`'s mapping.
    ///
    /// # Panics
    ///
    /// Panics if `owner` does not own a mapping or `member` does.
    pub(crate) fn squash_into(&mut self, member: PaintLayerId, owner: PaintLayerId) {
        assert!(
            !self.owns_mapping(member),
            "a layer that owns a mapping cannot be squashed"
        );
        self.release_squashing(member);
        self.mark_former_backing_dirty(member);
        let Some(mapping) = self.mapping_mut(owner) else {
            panic!("squashing owner {owner:?} has no mapping");
        };
        mapping.add_squashed_layer(member);
        self.record_mut(member).composited = CompositedState::SquashedInto(owner);
        self.dirty.mark(member.idx, dirty::CONFIGURATION);
        self.dirty.mark(owner.idx, dirty::CONFIGURATION);
        self.mark_geometry_dirty(owner);
    }

    /// Breaks squashing links in both directions: removes `id` from its
    /// owner's squashed list, and if `id` owns squashed layers, returns them
    /// to not composited.
    pub(crate) fn release_squashing(&mut self, id: PaintLayerId) {
        if let Some(owner) = self.squashing_owner(id) {
            if self.is_alive(owner)
                && let Some(mapping) = self.mapping_mut(owner)
            {
                mapping.remove_squashed_layer(id);
                self.dirty.mark(owner.idx, dirty::CONFIGURATION);
                self.mark_geometry_dirty(owner);
            }
            self.record_mut(id).composited = CompositedState::NotComposited;
        }
        let members = match self.mapping_mut(id) {
            Some(mapping) => mapping.take_squashed_layers(),
            None => alloc::vec::Vec::new(),
        };
        for member in members {
            if self.is_alive(member) {
                self.record_mut(member).composited = CompositedState::NotComposited;
                self.dirty.mark(member.idx, dirty::CONFIGURATION);
                self.mark_geometry_dirty(member);
            }
        }
    }
}
