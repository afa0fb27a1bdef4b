// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositing update: decisions, then configure, then measure.

use alloc::vec::Vec;

use kurbo::Point;

use super::allocator::SurfaceAllocator;
use super::assign::CompositingDecisions;
use super::settings::CompositorSettings;
use super::surface::SurfaceRole;
use crate::box_tree::BoxTree;
use crate::dirty;
use crate::layer::{PaintLayerId, PaintLayerTree};
use crate::lifecycle::CompositingQuery;
use crate::trace::{PhaseKind, Tracer};

/// A repaint the paint collaborator must perform outside the normal
/// invalidation walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepaintRequest {
    /// A squashed layer moved to a new whole-pixel offset inside its
    /// squashing surface and must be repainted in full.
    FullSquashedLayer {
        /// The squashed layer.
        layer: PaintLayerId,
        /// The layer owning the squashing surface.
        owner: PaintLayerId,
    },
}

/// Changes the scrolling coordinator must hear about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollingNotification {
    /// The layer gained scroll outer and inner surfaces.
    ScrollingSurfaceCreated(PaintLayerId),
    /// The layer lost its scrolling surfaces.
    ScrollingSurfaceDestroyed(PaintLayerId),
    /// A fixed-position layer changed compositing state, so the surface it
    /// is anchored by changed.
    FixedContainerChanged(PaintLayerId),
}

/// What one compositing update produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositingOutput {
    /// Full repaints of squashed layers.
    pub repaints: Vec<RepaintRequest>,
    /// Scrolling coordinator notifications, in the order they happened.
    pub scrolling: Vec<ScrollingNotification>,
    /// Layers that could not get a surface and fell back to painting into
    /// an ancestor.
    pub degraded: Vec<PaintLayerId>,
    /// Layers whose surface chain changed and must be relinked by the
    /// consumer.
    pub relinked: Vec<PaintLayerId>,
    /// Mapping configurations run, counting repeats after degradation.
    pub configured: u32,
    /// Mappings measured.
    pub measured: u32,
}

impl PaintLayerTree {
    /// Runs the compositing update for the whole tree.
    ///
    /// Positions, descendant-dependent flags and z-order lists must be
    /// current. The decisions are applied first; every mapping is then
    /// configured until stable, and only then are dirty mappings measured,
    /// because a surface's geometry depends on the final surface set of its
    /// ancestors.
    ///
    /// # Panics
    ///
    /// Panics if z-order lists or visibility flags are stale.
    pub fn update_compositing(
        &mut self,
        boxes: &BoxTree,
        settings: &CompositorSettings,
        decisions: &CompositingDecisions,
        allocator: &mut dyn SurfaceAllocator,
        tracer: &mut Tracer<'_>,
    ) -> CompositingOutput {
        let mut out = CompositingOutput::default();

        tracer.phase_begin(PhaseKind::Assign);
        self.apply_decisions(boxes, decisions, allocator, tracer, &mut out);
        let reconfigured = self.drain_dirty(dirty::CONFIGURATION);
        for &l in &reconfigured {
            self.mark_geometry_dirty(l);
        }
        tracer.phase_end(PhaseKind::Assign, count(reconfigured.len()));

        tracer.phase_begin(PhaseKind::Configure);
        out.configured = self.configure_mappings(boxes, settings, allocator, tracer, &mut out);
        tracer.phase_end(PhaseKind::Configure, out.configured);

        tracer.phase_begin(PhaseKind::Measure);
        out.measured = self.measure_mappings(boxes, tracer, &mut out);
        tracer.phase_end(PhaseKind::Measure, out.measured);

        for l in self.pre_order() {
            if let Some(m) = self.mapping_mut(l)
                && m.needs_relink()
            {
                m.clear_needs_relink();
                out.relinked.push(l);
            }
        }
        out
    }

    /// The surface `role` of `l`'s mapping is attached to.
    ///
    /// Surfaces whose parent is outside their own mapping attach to the
    /// compositing ancestor's child containment surface. Returns `None` for
    /// absent surfaces and for the root's outermost surfaces.
    #[must_use]
    pub fn surface_attachment(
        &self,
        l: PaintLayerId,
        role: SurfaceRole,
        _q: CompositingQuery<'_>,
    ) -> Option<(PaintLayerId, SurfaceRole)> {
        let m = self.mapping_unchecked(l)?;
        if !m.has(role) {
            return None;
        }
        match m.surface_parent(role) {
            Some(parent) => Some((l, parent)),
            None => {
                let ca = self.compositing_ancestor_unchecked(l)?;
                let containment = self.mapping_unchecked(ca)?.child_containment_role();
                Some((ca, containment))
            }
        }
    }

    /// The origin of surface `role` of `l`'s mapping in the root layer's
    /// snapped space, found by summing positions up the surface chain.
    #[must_use]
    pub fn surface_origin(&self, l: PaintLayerId, role: SurfaceRole, q: CompositingQuery<'_>) -> Option<Point> {
        let mut origin = self.mapping_unchecked(l)?.surface(role)?.position.to_vec2();
        let mut cur = (l, role);
        while let Some(parent) = self.surface_attachment(cur.0, cur.1, q) {
            let Some(s) = self.mapping_unchecked(parent.0).and_then(|m| m.surface(parent.1)) else {
                break;
            };
            origin += s.position.to_vec2();
            cur = parent;
        }
        Some(origin.to_point())
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use kurbo::{Rect, Size, Vec2};

    use super::*;
    use crate::box_tree::{BoxGeometry, LayoutBox, PositionScheme, ScrollState};
    use crate::compositing::fixture::{Fixture, Q};
    use crate::compositing::{CompositingReasons, PrecomputedAssignment};
    use crate::layer::CompositingState;

    #[test]
    fn root_is_always_composited() {
        let mut f = Fixture::new();
        let out = f.update();
        let root = f.tree.root().unwrap();
        assert_eq!(f.tree.compositing_state(root, Q), CompositingState::OwnsBacking);
        assert!(f.tree.compositing_reasons(root).contains(CompositingReasons::ROOT));
        assert_eq!(out.relinked, alloc::vec![root], "a new mapping needs linking");
        assert_eq!(
            f.surface(f.boxes.root(), SurfaceRole::Primary),
            Rect::new(0.0, 0.0, 800.0, 600.0)
        );
    }

    #[test]
    fn ancestor_clip_bounds_the_clipping_box_only() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let clipper = f.positioned(root, PositionScheme::Relative(Vec2::ZERO), (20.0, 30.0), 100.0);
        f.boxes.get_mut(clipper).style.overflow_clip = true;
        let child = f.positioned(clipper, PositionScheme::Absolute, (0.0, 0.0), 300.0);
        f.table = PrecomputedAssignment::new().promote(child, CompositingReasons::WILL_CHANGE);
        f.update();

        assert_eq!(
            f.surface(child, SurfaceRole::AncestorClip),
            Rect::new(20.0, 30.0, 120.0, 130.0),
            "clip sits at the clipping box"
        );
        assert_eq!(
            f.surface(child, SurfaceRole::Primary),
            Rect::new(0.0, 0.0, 300.0, 300.0),
            "primary is not truncated"
        );
        assert_eq!(
            f.tree.surface_attachment(f.layer(child), SurfaceRole::Primary, Q),
            Some((f.layer(child), SurfaceRole::AncestorClip))
        );
    }

    #[test]
    fn squashed_layers_share_the_owner_surface() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let rel = PositionScheme::Relative(Vec2::ZERO);
        let owner = f.positioned(root, rel, (0.0, 0.0), 10.0);
        let a = f.positioned(root, rel, (0.0, 0.0), 10.0);
        let b = f.positioned(root, rel, (5.0, 5.0), 10.0);
        f.table = PrecomputedAssignment::new()
            .promote(owner, CompositingReasons::WILL_CHANGE)
            .squash(a, owner)
            .squash(b, owner);
        let out = f.update();
        assert!(out.repaints.is_empty(), "first placement is not a move");

        assert_eq!(f.surface(owner, SurfaceRole::Squashing), Rect::new(0.0, 0.0, 15.0, 15.0));
        let m = f.tree.mapping(f.layer(owner), Q).unwrap();
        let sa = m.squashed_layer(f.layer(a)).unwrap();
        let sb = m.squashed_layer(f.layer(b)).unwrap();
        assert_eq!(sa.offset_from_box, Vec2::ZERO);
        assert_eq!(sb.offset_from_box, Vec2::new(-5.0, -5.0));
        assert_eq!(sb.local_clip, Rect::new(5.0, 5.0, 15.0, 15.0));
        assert_eq!(
            f.tree.compositing_state(f.layer(b), Q),
            CompositingState::Squashed {
                owner: f.layer(owner)
            }
        );

        f.boxes.get_mut(b).geometry.location = Point::new(6.0, 6.0);
        let out = f.update();
        assert_eq!(
            out.repaints,
            alloc::vec![RepaintRequest::FullSquashedLayer {
                layer: f.layer(b),
                owner: f.layer(owner),
            }]
        );
        assert_eq!(f.surface(owner, SurfaceRole::Squashing), Rect::new(0.0, 0.0, 16.0, 16.0));
    }

    #[test]
    fn composited_scrolling_notifies_the_coordinator() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let scroller = f.boxes.append(
            root,
            LayoutBox::block()
                .with_geometry(BoxGeometry::new(Point::ZERO, Size::new(100.0, 100.0)))
                .with_scroll(ScrollState {
                    content_size: Size::new(100.0, 400.0),
                    prefers_composited_scrolling: true,
                    ..ScrollState::default()
                }),
        );
        f.table = PrecomputedAssignment::new().promote(scroller, CompositingReasons::OVERFLOW_SCROLLING);
        let out = f.update();
        let l = f.layer(scroller);
        assert!(out.scrolling.contains(&ScrollingNotification::ScrollingSurfaceCreated(l)));
        let m = f.tree.mapping(l, Q).unwrap();
        assert_eq!(m.child_containment_role(), SurfaceRole::ScrollInner);

        f.table.forget(scroller);
        let out = f.update();
        assert!(out.scrolling.contains(&ScrollingNotification::ScrollingSurfaceDestroyed(l)));
        assert_eq!(f.tree.compositing_state(l, Q), CompositingState::NotComposited);
    }

    #[test]
    fn exhausted_budget_degrades_the_layer() {
        let mut f = Fixture::new();
        f.pool.set_budget(Some(1));
        let root = f.boxes.root();
        let a = f.positioned(root, PositionScheme::Relative(Vec2::ZERO), (0.0, 0.0), 10.0);
        f.table = PrecomputedAssignment::new().promote(a, CompositingReasons::WILL_CHANGE);
        let out = f.update();
        assert_eq!(out.degraded, alloc::vec![f.layer(a)]);
        assert_eq!(f.tree.compositing_state(f.layer(a), Q), CompositingState::NotComposited);
        assert_eq!(f.pool.live(), 1, "the root keeps its primary");
    }

    #[test]
    fn rerunning_without_changes_measures_nothing() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let a = f.positioned(root, PositionScheme::Relative(Vec2::ZERO), (3.5, 4.25), 10.0);
        f.table = PrecomputedAssignment::new().promote(a, CompositingReasons::WILL_CHANGE);
        f.update();
        let before = f.surface(a, SurfaceRole::Primary);
        let out = f.update();
        assert_eq!(out.measured, 0);
        assert!(out.relinked.is_empty());
        assert_eq!(f.surface(a, SurfaceRole::Primary), before);

        f.tree.mark_all_geometry_dirty();
        f.update();
        assert_eq!(f.surface(a, SurfaceRole::Primary), before, "re-measuring is idempotent");
    }

    #[test]
    fn surface_origin_matches_snapped_box_origin() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let a = f.positioned(root, PositionScheme::Relative(Vec2::ZERO), (10.4, 20.6), 50.0);
        f.table = PrecomputedAssignment::new().promote(a, CompositingReasons::WILL_CHANGE);
        f.update();
        let l = f.layer(a);
        let m = f.tree.mapping(l, Q).unwrap();
        let direct = f.tree.offset_to_root(l) - f.tree.subpixel_accumulation(l)
            + m.primary().offset_from_box;
        assert_eq!(f.tree.surface_origin(l, SurfaceRole::Primary, Q), Some(direct.to_point()));
        assert_eq!(direct, Vec2::new(10.0, 21.0));
    }

    #[test]
    fn promoting_a_child_shrinks_the_former_backing() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let rel = PositionScheme::Relative(Vec2::ZERO);
        let parent = f.positioned(root, rel, (10.0, 10.0), 50.0);
        let child = f.positioned(parent, rel, (40.0, 40.0), 100.0);
        f.table = PrecomputedAssignment::new().promote(parent, CompositingReasons::WILL_CHANGE);
        f.update();
        assert_eq!(
            f.surface(parent, SurfaceRole::Primary).size(),
            Size::new(140.0, 140.0),
            "the child paints into the parent"
        );

        f.table = PrecomputedAssignment::new()
            .promote(parent, CompositingReasons::WILL_CHANGE)
            .promote(child, CompositingReasons::WILL_CHANGE);
        f.update();
        let incremental = f.surface(parent, SurfaceRole::Primary).size();
        assert_eq!(incremental, Size::new(50.0, 50.0), "the child left the parent");

        f.tree.mark_all_geometry_dirty();
        f.update();
        assert_eq!(
            f.surface(parent, SurfaceRole::Primary).size(),
            incremental,
            "a full re-measure agrees"
        );

        f.table.forget(child);
        f.update();
        assert_eq!(
            f.surface(parent, SurfaceRole::Primary).size(),
            Size::new(140.0, 140.0),
            "demoting the child grows the parent again"
        );
    }

    #[test]
    fn squashing_a_layer_releases_it_from_the_ancestor() {
        let mut f = Fixture::new();
        let root = f.boxes.root();
        let rel = PositionScheme::Relative(Vec2::ZERO);
        let parent = f.positioned(root, rel, (0.0, 0.0), 20.0);
        let owner = f.positioned(parent, rel, (0.0, 0.0), 10.0);
        let member = f.positioned(parent, rel, (100.0, 100.0), 10.0);
        f.table = PrecomputedAssignment::new()
            .promote(parent, CompositingReasons::WILL_CHANGE)
            .promote(owner, CompositingReasons::WILL_CHANGE);
        f.update();
        assert_eq!(f.surface(parent, SurfaceRole::Primary).size(), Size::new(110.0, 110.0));

        f.table = PrecomputedAssignment::new()
            .promote(parent, CompositingReasons::WILL_CHANGE)
            .promote(owner, CompositingReasons::WILL_CHANGE)
            .squash(member, owner);
        f.update();
        assert_eq!(
            f.surface(parent, SurfaceRole::Primary).size(),
            Size::new(20.0, 20.0),
            "the member paints into the squashing surface now"
        );
    }
}
