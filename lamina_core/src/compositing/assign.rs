// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The overlap-analysis collaborator boundary.
//!
//! Deciding which layers need their own backing, and which may share one,
//! requires overlap testing that lives outside this crate. The compositing
//! update consumes the result as an opaque [`CompositingDecisions`] value.

use alloc::collections::BTreeMap;

use super::reasons::CompositingReasons;
use crate::box_tree::{BoxId, BoxTree};
use crate::layer::{PaintLayerId, PaintLayerTree};

/// Per-layer compositing reasons and squashing groups for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositingDecisions {
    /// Reasons for each layer. Absent layers have none.
    pub reasons: BTreeMap<PaintLayerId, CompositingReasons>,
    /// Squashed layer → the layer owning the squashing surface.
    pub squashing: BTreeMap<PaintLayerId, PaintLayerId>,
}

impl CompositingDecisions {
    /// The reasons assigned to `layer`.
    #[must_use]
    pub fn reasons_for(&self, layer: PaintLayerId) -> CompositingReasons {
        self.reasons.get(&layer).copied().unwrap_or_default()
    }

    /// The squashing owner assigned to `layer`, if any.
    #[must_use]
    pub fn squashing_owner(&self, layer: PaintLayerId) -> Option<PaintLayerId> {
        self.squashing.get(&layer).copied()
    }
}

/// Decides compositing for every layer of a tree.
pub trait CompositingAssigner {
    /// Produces this frame's decisions. The tree's positions, flags and
    /// z-order lists are current when this is called.
    fn assign(&mut self, tree: &PaintLayerTree, boxes: &BoxTree) -> CompositingDecisions;
}

/// An assigner that replays a fixed table keyed by box.
///
/// Keys are boxes rather than layers so that the table survives layer
/// re-creation. Entries whose box has no layer are skipped.
#[derive(Clone, Debug, Default)]
pub struct PrecomputedAssignment {
    reasons: BTreeMap<BoxId, CompositingReasons>,
    squashing: BTreeMap<BoxId, BoxId>,
}

impl PrecomputedAssignment {
    /// An empty table: only the root is composited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `b`'s layer `reasons`.
    #[must_use]
    pub fn promote(mut self, b: BoxId, reasons: CompositingReasons) -> Self {
        self.reasons.insert(b, reasons);
        self
    }

    /// Squashes `member`'s layer into `owner`'s backing.
    #[must_use]
    pub fn squash(mut self, member: BoxId, owner: BoxId) -> Self {
        self.squashing.insert(member, owner);
        self
    }

    /// Removes every entry for `b`.
    pub fn forget(&mut self, b: BoxId) {
        self.reasons.remove(&b);
        self.squashing.remove(&b);
        self.squashing.retain(|_, owner| *owner != b);
    }
}

impl CompositingAssigner for PrecomputedAssignment {
    fn assign(&mut self, tree: &PaintLayerTree, boxes: &BoxTree) -> CompositingDecisions {
        let layer_of = |b: BoxId| {
            boxes
                .try_get(b)
                .and_then(|lb| lb.layer())
                .filter(|&l| tree.is_alive(l))
        };
        let mut out = CompositingDecisions::default();
        for (&b, &reasons) in &self.reasons {
            if let Some(l) = layer_of(b) {
                out.reasons.insert(l, reasons);
            }
        }
        for (&member, &owner) in &self.squashing {
            if let (Some(m), Some(o)) = (layer_of(member), layer_of(owner)) {
                out.squashing.insert(m, o);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Size, Vec2};

    use super::*;
    use crate::box_tree::{BoxGeometry, BoxStyle, LayoutBox, PositionScheme};
    use crate::compositing::{CompositorSettings, SurfacePool};

    #[test]
    fn table_resolves_boxes_to_layers() {
        let mut boxes = BoxTree::new(Size::new(100.0, 100.0));
        let root = boxes.root();
        let positioned = LayoutBox::block()
            .with_style(BoxStyle {
                position: PositionScheme::Relative(Vec2::ZERO),
                ..BoxStyle::default()
            })
            .with_geometry(BoxGeometry::new(Point::ZERO, Size::new(10.0, 10.0)));
        let a = boxes.append(root, positioned.clone());
        let b = boxes.append(root, positioned);
        let plain = boxes.append(root, LayoutBox::block());
        let mut tree = PaintLayerTree::new();
        tree.sync_with_box_tree(&mut boxes, &CompositorSettings::new(), &mut SurfacePool::new(None));

        let mut table = PrecomputedAssignment::new()
            .promote(a, CompositingReasons::WILL_CHANGE)
            .promote(plain, CompositingReasons::VIDEO)
            .squash(b, a);
        let d = table.assign(&tree, &boxes);
        let la = boxes.get(a).layer().unwrap();
        let lb = boxes.get(b).layer().unwrap();
        assert_eq!(d.reasons_for(la), CompositingReasons::WILL_CHANGE);
        assert_eq!(d.reasons.len(), 1, "boxes without layers are skipped");
        assert_eq!(d.squashing_owner(lb), Some(la));

        table.forget(a);
        let d = table.assign(&tree, &boxes);
        assert!(d.reasons.is_empty());
        assert!(d.squashing.is_empty(), "forgetting an owner drops its members");
    }
}
