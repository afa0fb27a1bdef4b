// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The laid-out box tree consumed from the layout collaborator.
//!
//! Layout itself happens elsewhere. This module only stores its results:
//! one [`LayoutBox`] per box, each with a tagged [`BoxKind`], resolved
//! [`BoxStyle`], post-layout [`BoxGeometry`], and optional [`ScrollState`].
//! Boxes are addressed by generational [`BoxId`] handles, mirroring
//! [`PaintLayerId`].
//!
//! A box owns at most one paint layer by handle. Whether it needs one is
//! decided by [`LayoutBox::layer_type_required`].

mod style;

pub use style::{
    BoxGeometry, BoxKind, BoxStyle, Columns, PositionScheme, ReplacedKind, ScrollState, Visibility,
};

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Size};

use crate::layer::PaintLayerId;

/// A handle to a box in a [`BoxTree`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl BoxId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxId({}@gen{})", self.idx, self.generation)
    }
}

/// Which kind of paint layer, if any, a box induces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerType {
    /// Paints into its enclosing layer.
    None,
    /// A full layer: stacking, positioning, transforms, compositing.
    Normal,
    /// A helper layer that only exists to clip overflow. Not self-painting
    /// unless scrolling forces it.
    OverflowClip,
}

/// One laid-out box.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutBox {
    /// What the box is.
    pub kind: BoxKind,
    /// Resolved style.
    pub style: BoxStyle,
    /// Post-layout geometry.
    pub geometry: BoxGeometry,
    /// Scroll state, for boxes that clip overflow and scroll.
    pub scroll: Option<ScrollState>,
    pub(crate) layer: Option<PaintLayerId>,
    pub(crate) needs_paint_invalidation: bool,
    pub(crate) full_paint_invalidation: bool,
    pub(crate) geometry_pending: bool,
}

impl LayoutBox {
    /// A box of `kind` with default style and zero geometry.
    #[must_use]
    pub fn new(kind: BoxKind) -> Self {
        Self {
            kind,
            style: BoxStyle::default(),
            geometry: BoxGeometry::default(),
            scroll: None,
            layer: None,
            needs_paint_invalidation: true,
            full_paint_invalidation: true,
            geometry_pending: false,
        }
    }

    /// A block box.
    #[must_use]
    pub fn block() -> Self {
        Self::new(BoxKind::Block)
    }

    /// Builder-style style setter.
    #[must_use]
    pub fn with_style(mut self, style: BoxStyle) -> Self {
        self.style = style;
        self
    }

    /// Builder-style geometry setter.
    #[must_use]
    pub fn with_geometry(mut self, geometry: BoxGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Builder-style scroll state setter. Implies `overflow_clip`.
    #[must_use]
    pub fn with_scroll(mut self, scroll: ScrollState) -> Self {
        self.style.overflow_clip = true;
        self.scroll = Some(scroll);
        self
    }

    /// The paint layer this box owns, if any.
    #[inline]
    #[must_use]
    pub fn layer(&self) -> Option<PaintLayerId> {
        self.layer
    }

    /// Whether the box's final geometry is still being settled.
    #[inline]
    #[must_use]
    pub fn is_geometry_pending(&self) -> bool {
        self.geometry_pending
    }

    /// Whether the box's current style makes it visible.
    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.style.visibility == Visibility::Visible
    }

    /// Whether the box paints anything of its own.
    #[must_use]
    pub fn paints_something(&self) -> bool {
        self.is_visible()
            && (self.style.has_box_decorations
                || self.style.paints_content
                || self.style.has_selection)
    }

    /// The current scroll offset, or zero for boxes that do not scroll.
    #[inline]
    #[must_use]
    pub fn scroll_offset(&self) -> kurbo::Vec2 {
        self.scroll.map(|s| s.offset).unwrap_or(kurbo::Vec2::ZERO)
    }

    /// Decides whether this box induces a paint layer.
    #[must_use]
    pub fn layer_type_required(&self) -> LayerType {
        match self.kind {
            BoxKind::View => return LayerType::Normal,
            BoxKind::VectorShape { .. } => return LayerType::None,
            _ => {}
        }
        let style = &self.style;
        let accelerated_content = matches!(
            self.kind,
            BoxKind::Replaced(ReplacedKind::Canvas | ReplacedKind::Video)
        ) || self.kind.requires_accelerated_compositing();
        if style.position.is_positioned()
            || style.creates_stacking_context()
            || style.columns.is_some()
            || style.backface_hidden
            || accelerated_content
            || self.scroll.is_some_and(|s| s.prefers_composited_scrolling)
        {
            LayerType::Normal
        } else if style.overflow_clip {
            LayerType::OverflowClip
        } else {
            LayerType::None
        }
    }
}

#[derive(Clone, Debug)]
struct BoxNode {
    data: LayoutBox,
    parent: Option<BoxId>,
    children: Vec<BoxId>,
}

/// Arena of laid-out boxes.
#[derive(Clone, Debug)]
pub struct BoxTree {
    nodes: Vec<Option<BoxNode>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    root: BoxId,
}

impl BoxTree {
    /// Creates a tree containing only the view box, sized to the viewport.
    #[must_use]
    pub fn new(viewport: Size) -> Self {
        let mut view = LayoutBox::new(BoxKind::View)
            .with_geometry(BoxGeometry::new(Point::ZERO, viewport))
            .with_scroll(ScrollState {
                content_size: viewport,
                ..ScrollState::default()
            });
        view.style.has_box_decorations = true;
        let root = BoxId {
            idx: 0,
            generation: 0,
        };
        Self {
            nodes: alloc::vec![Some(BoxNode {
                data: view,
                parent: None,
                children: Vec::new(),
            })],
            generation: alloc::vec![0],
            free_list: Vec::new(),
            root,
        }
    }

    /// The view box.
    #[inline]
    #[must_use]
    pub fn root(&self) -> BoxId {
        self.root
    }

    /// The viewport size (the view box's size).
    #[must_use]
    pub fn viewport_size(&self) -> Size {
        self.get(self.root).geometry.size
    }

    /// Whether the handle refers to a live box.
    #[must_use]
    pub fn is_alive(&self, id: BoxId) -> bool {
        (id.idx as usize) < self.nodes.len()
            && self.generation[id.idx as usize] == id.generation
            && self.nodes[id.idx as usize].is_some()
    }

    /// Appends `data` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale.
    pub fn append(&mut self, parent: BoxId, data: LayoutBox) -> BoxId {
        self.validate(parent);
        let node = BoxNode {
            data,
            parent: Some(parent),
            children: Vec::new(),
        };
        let idx = if let Some(idx) = self.free_list.pop() {
            self.generation[idx as usize] += 1;
            self.nodes[idx as usize] = Some(node);
            idx
        } else {
            let Ok(idx) = u32::try_from(self.nodes.len()) else {
                panic!("box arena exceeds u32 slots");
            };
            self.nodes.push(Some(node));
            self.generation.push(0);
            idx
        };
        let id = BoxId {
            idx,
            generation: self.generation[idx as usize],
        };
        self.node_mut(parent).children.push(id);
        id
    }

    /// Removes `id` and its subtree, returning the removed boxes in
    /// pre-order so their layers can be torn down.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale or is the view box.
    pub fn remove_subtree(&mut self, id: BoxId) -> Vec<(BoxId, LayoutBox)> {
        self.validate(id);
        assert!(id != self.root, "cannot remove the view box");
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        let order = self.pre_order(id);
        let mut removed = Vec::with_capacity(order.len());
        for b in order {
            if let Some(node) = self.nodes[b.idx as usize].take() {
                self.free_list.push(b.idx);
                removed.push((b, node.data));
            }
        }
        removed
    }

    /// Returns the box.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn get(&self, id: BoxId) -> &LayoutBox {
        &self.node(id).data
    }

    /// Returns the box mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn get_mut(&mut self, id: BoxId) -> &mut LayoutBox {
        &mut self.node_mut(id).data
    }

    /// Returns the box if the handle is live.
    #[must_use]
    pub fn try_get(&self, id: BoxId) -> Option<&LayoutBox> {
        if self.is_alive(id) {
            Some(self.get(id))
        } else {
            None
        }
    }

    /// The DOM-order parent.
    #[must_use]
    pub fn parent(&self, id: BoxId) -> Option<BoxId> {
        self.node(id).parent
    }

    /// Children in DOM order.
    #[must_use]
    pub fn children(&self, id: BoxId) -> &[BoxId] {
        &self.node(id).children
    }

    /// Iterates over strict ancestors, nearest first.
    pub fn ancestors(&self, id: BoxId) -> impl Iterator<Item = BoxId> + '_ {
        let mut cur = self.parent(id);
        core::iter::from_fn(move || {
            let out = cur?;
            cur = self.parent(out);
            Some(out)
        })
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_inclusive_ancestor(&self, ancestor: BoxId, id: BoxId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// The subtree rooted at `id` in pre-order.
    #[must_use]
    pub fn pre_order(&self, id: BoxId) -> Vec<BoxId> {
        let mut out = Vec::new();
        let mut stack = alloc::vec![id];
        while let Some(b) = stack.pop() {
            out.push(b);
            stack.extend(self.children(b).iter().rev().copied());
        }
        out
    }

    /// Whether the box anchors `position: fixed` descendants: the view, or
    /// any box with a transform-related property.
    #[must_use]
    pub fn is_fixed_position_container(&self, id: BoxId) -> bool {
        let b = self.get(id);
        matches!(b.kind, BoxKind::View) || b.style.has_transform_related_property()
    }

    /// Whether the box contains absolutely positioned descendants.
    #[must_use]
    pub fn is_absolute_container(&self, id: BoxId) -> bool {
        self.get(id).style.position.is_positioned() || self.is_fixed_position_container(id)
    }

    /// Resolves the containing block: the parent for in-flow boxes, the
    /// nearest positioned ancestor for absolute boxes, and the nearest
    /// fixed-position container for fixed boxes.
    #[must_use]
    pub fn containing_block(&self, id: BoxId) -> Option<BoxId> {
        let parent = self.parent(id)?;
        match self.get(id).style.position {
            PositionScheme::Absolute if !self.get(id).kind.is_vector_shape() => {
                core::iter::once(parent)
                    .chain(self.ancestors(parent))
                    .find(|&a| self.is_absolute_container(a))
            }
            PositionScheme::Fixed if !self.get(id).kind.is_vector_shape() => {
                core::iter::once(parent)
                    .chain(self.ancestors(parent))
                    .find(|&a| self.is_fixed_position_container(a))
            }
            _ => Some(parent),
        }
    }

    /// Whether `ancestor` is reached by following containing blocks up
    /// from `id`. Overflow clips of `ancestor` apply to `id` exactly when
    /// this holds.
    #[must_use]
    pub fn in_containing_block_chain(&self, ancestor: BoxId, id: BoxId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let mut cur = self.containing_block(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.containing_block(c);
        }
        false
    }

    /// Nearest inclusive ancestor that owns a paint layer.
    #[must_use]
    pub fn enclosing_layer(&self, id: BoxId) -> Option<PaintLayerId> {
        core::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|b| self.get(b).layer)
    }

    /// Number of live boxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Always `false`: the view box cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn set_layer(&mut self, id: BoxId, layer: Option<PaintLayerId>) {
        self.get_mut(id).layer = layer;
    }

    pub(crate) fn mark_for_paint_invalidation(&mut self, id: BoxId, full: bool) {
        let b = self.get_mut(id);
        b.needs_paint_invalidation = true;
        b.full_paint_invalidation |= full;
    }

    pub(crate) fn set_geometry_pending(&mut self, id: BoxId, pending: bool) {
        self.get_mut(id).geometry_pending = pending;
    }

    pub(crate) fn clear_paint_invalidation_flags(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.data.needs_paint_invalidation = false;
            node.data.full_paint_invalidation = false;
        }
    }

    #[track_caller]
    fn validate(&self, id: BoxId) {
        assert!(self.is_alive(id), "stale BoxId: {id:?}");
    }

    #[track_caller]
    fn node(&self, id: BoxId) -> &BoxNode {
        match self.nodes.get(id.idx as usize) {
            Some(Some(node)) if self.generation[id.idx as usize] == id.generation => node,
            _ => panic!("stale BoxId: {id:?}"),
        }
    }

    #[track_caller]
    fn node_mut(&mut self, id: BoxId) -> &mut BoxNode {
        let current = self.generation.get(id.idx as usize).copied();
        match self.nodes.get_mut(id.idx as usize) {
            Some(Some(node)) if current == Some(id.generation) => node,
            _ => panic!("stale BoxId: {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;

    fn positioned(scheme: PositionScheme) -> LayoutBox {
        LayoutBox::block().with_style(BoxStyle {
            position: scheme,
            ..BoxStyle::default()
        })
    }

    #[test]
    fn append_and_remove_subtree() {
        let mut tree = BoxTree::new(Size::new(800.0, 600.0));
        let a = tree.append(tree.root(), LayoutBox::block());
        let b = tree.append(a, LayoutBox::block());
        let removed = tree.remove_subtree(a);
        assert_eq!(
            removed.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            alloc::vec![a, b]
        );
        assert!(!tree.is_alive(b));
        assert!(tree.children(tree.root()).is_empty());
        let c = tree.append(tree.root(), LayoutBox::block());
        assert_ne!(c, a, "reused slot must carry a new generation");
    }

    #[test]
    #[should_panic(expected = "stale BoxId")]
    fn stale_box_panics() {
        let mut tree = BoxTree::new(Size::new(10.0, 10.0));
        let a = tree.append(tree.root(), LayoutBox::block());
        tree.remove_subtree(a);
        let _ = tree.get(a);
    }

    #[test]
    fn containing_blocks_follow_position_scheme() {
        let mut tree = BoxTree::new(Size::new(800.0, 600.0));
        let rel = tree.append(tree.root(), positioned(PositionScheme::Relative(Vec2::ZERO)));
        let plain = tree.append(rel, LayoutBox::block());
        let abs = tree.append(plain, positioned(PositionScheme::Absolute));
        let fixed = tree.append(plain, positioned(PositionScheme::Fixed));
        let inflow = tree.append(plain, LayoutBox::block());

        assert_eq!(tree.containing_block(abs), Some(rel));
        assert_eq!(tree.containing_block(fixed), Some(tree.root()));
        assert_eq!(tree.containing_block(inflow), Some(plain));
    }

    #[test]
    fn absolute_boxes_escape_the_chain_of_static_ancestors() {
        let mut tree = BoxTree::new(Size::new(800.0, 600.0));
        let rel = tree.append(tree.root(), positioned(PositionScheme::Relative(Vec2::ZERO)));
        let plain = tree.append(rel, LayoutBox::block());
        let abs = tree.append(plain, positioned(PositionScheme::Absolute));
        let under_abs = tree.append(abs, LayoutBox::block());

        assert!(tree.in_containing_block_chain(rel, abs), "abs is contained by rel");
        assert!(!tree.in_containing_block_chain(plain, abs), "abs skips the static parent");
        assert!(
            !tree.in_containing_block_chain(plain, under_abs),
            "descendants of abs skip it too"
        );
        assert!(tree.in_containing_block_chain(abs, under_abs), "in-flow chain");
        assert!(!tree.in_containing_block_chain(abs, abs), "the box itself is not in its chain");
    }

    #[test]
    fn transformed_box_contains_fixed_descendants() {
        let mut tree = BoxTree::new(Size::new(800.0, 600.0));
        let t = tree.append(
            tree.root(),
            LayoutBox::block().with_style(BoxStyle {
                transform: Some(crate::transform::Transform3d::from_scale(2.0, 2.0, 1.0)),
                ..BoxStyle::default()
            }),
        );
        let fixed = tree.append(t, positioned(PositionScheme::Fixed));
        assert_eq!(tree.containing_block(fixed), Some(t));
    }

    #[test]
    fn layer_type_requirements() {
        assert_eq!(
            LayoutBox::new(BoxKind::View).layer_type_required(),
            LayerType::Normal
        );
        assert_eq!(LayoutBox::block().layer_type_required(), LayerType::None);
        assert_eq!(
            positioned(PositionScheme::Relative(Vec2::ZERO)).layer_type_required(),
            LayerType::Normal
        );
        let clip = LayoutBox::block().with_scroll(ScrollState::default());
        assert_eq!(clip.layer_type_required(), LayerType::OverflowClip);
        assert_eq!(
            LayoutBox::new(BoxKind::Replaced(ReplacedKind::Video)).layer_type_required(),
            LayerType::Normal
        );
    }
}
