// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface plan: every backing surface of one frame, back to front.

use alloc::vec::Vec;

use kurbo::{Point, Size};
use lamina_core::compositing::{
    LayerMapping, PaintPhases, PlatformContent, SurfaceHandle, SurfaceRole,
};
use lamina_core::layer::{PaintLayerId, PaintLayerTree};
use lamina_core::lifecycle::CompositingQuery;
use lamina_core::transform::Transform3d;

/// Surfaces a mapping draws before any composited descendant.
const BACK: [SurfaceRole; 8] = [
    SurfaceRole::AncestorClip,
    SurfaceRole::Background,
    SurfaceRole::Primary,
    SurfaceRole::ChildTransform,
    SurfaceRole::ChildClip,
    SurfaceRole::ScrollOuter,
    SurfaceRole::ScrollInner,
    SurfaceRole::ScrollSelection,
];

/// Surfaces a mapping draws after every composited descendant.
const FRONT: [SurfaceRole; 9] = [
    SurfaceRole::Mask,
    SurfaceRole::ChildClipMask,
    SurfaceRole::OverflowControlsClip,
    SurfaceRole::OverflowControlsHost,
    SurfaceRole::HorizontalScrollbar,
    SurfaceRole::VerticalScrollbar,
    SurfaceRole::ScrollCorner,
    SurfaceRole::SquashingContainer,
    SurfaceRole::Squashing,
];

/// One surface in the plan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanItem {
    /// The layer owning the mapping.
    pub layer: PaintLayerId,
    /// Which surface of the mapping.
    pub role: SurfaceRole,
    /// The allocator's handle.
    pub handle: SurfaceHandle,
    /// The surface this one is attached to, if any.
    pub parent: Option<SurfaceHandle>,
    /// Number of surfaces between this one and the root.
    pub depth: u32,
    /// Origin in root surface coordinates, ignoring transforms.
    pub origin: Point,
    /// Origin relative to the parent surface.
    pub position: Point,
    /// Size in device pixels.
    pub size: Size,
    /// Transform applied about `transform_origin`.
    pub transform: Option<Transform3d>,
    /// Transform origin relative to the surface.
    pub transform_origin: Point,
    /// Whether children are clipped to the surface bounds.
    pub masks_to_bounds: bool,
    /// Whether the surface has painted content.
    pub draws_content: bool,
    /// Platform content shown in the surface.
    pub content: Option<PlatformContent>,
    /// Painting phases routed to the surface.
    pub phases: PaintPhases,
}

/// Every surface of a frame in back-to-front order.
///
/// A mapping's clip, background and primary surfaces come first, then the
/// surfaces of negative z-order descendants, then the foreground surface,
/// then normal-flow and positive z-order descendants. Masks, overflow
/// controls and the squashing surfaces close the mapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfacePlan {
    /// Surfaces in back-to-front order.
    pub items: Vec<PlanItem>,
}

impl SurfacePlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the plan for the current compositing state.
    ///
    /// # Panics
    ///
    /// Panics if z-order lists are stale.
    #[must_use]
    pub fn build(tree: &PaintLayerTree, q: CompositingQuery<'_>) -> Self {
        let mut plan = Self::new();
        plan.rebuild(tree, q);
        plan
    }

    /// Rebuilds the plan in place, reusing the allocation.
    ///
    /// # Panics
    ///
    /// Panics if z-order lists are stale.
    pub fn rebuild(&mut self, tree: &PaintLayerTree, q: CompositingQuery<'_>) {
        self.items.clear();
        let Some(root) = tree.root() else {
            return;
        };
        self.push_layer(tree, q, root);
    }

    fn push_layer(&mut self, tree: &PaintLayerTree, q: CompositingQuery<'_>, l: PaintLayerId) {
        let mapping = tree.mapping(l, q);
        if let Some(m) = mapping {
            self.push_roles(tree, q, l, m, &BACK);
        }
        for &c in tree.negative_z_order_list(l) {
            self.push_layer(tree, q, c);
        }
        if let Some(m) = mapping {
            self.push_roles(tree, q, l, m, &[SurfaceRole::Foreground]);
        }
        for &c in tree.normal_flow_list(l) {
            self.push_layer(tree, q, c);
        }
        for &c in tree.positive_z_order_list(l) {
            self.push_layer(tree, q, c);
        }
        if let Some(m) = mapping {
            self.push_roles(tree, q, l, m, &FRONT);
        }
    }

    fn push_roles(
        &mut self,
        tree: &PaintLayerTree,
        q: CompositingQuery<'_>,
        l: PaintLayerId,
        m: &LayerMapping,
        roles: &[SurfaceRole],
    ) {
        for &role in roles {
            let Some(s) = m.surface(role) else {
                continue;
            };
            let mut depth = 0;
            let mut cur = (l, role);
            while let Some(next) = tree.surface_attachment(cur.0, cur.1, q) {
                depth += 1;
                cur = next;
            }
            let parent = tree
                .surface_attachment(l, role, q)
                .and_then(|(pl, pr)| tree.mapping(pl, q)?.surface(pr))
                .map(|p| p.handle);
            self.items.push(PlanItem {
                layer: l,
                role,
                handle: s.handle,
                parent,
                depth,
                origin: tree.surface_origin(l, role, q).unwrap_or(s.position),
                position: s.position,
                size: s.size,
                transform: s.transform,
                transform_origin: s.transform_origin,
                masks_to_bounds: s.masks_to_bounds,
                draws_content: s.draws_content,
                content: s.content,
                phases: s.phases,
            });
        }
    }

    /// Number of surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the plan has no surfaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item for a surface handle.
    #[must_use]
    pub fn find(&self, handle: SurfaceHandle) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.handle == handle)
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;
    use lamina_core::box_tree::{BoxGeometry, BoxId, BoxStyle, LayoutBox, PositionScheme};
    use lamina_core::compositing::{CompositingReasons, CompositorSettings, PrecomputedAssignment};
    use lamina_core::document::Document;

    fn positioned(d: &mut Document, at: (f64, f64), size: f64) -> BoxId {
        let view = d.boxes().root();
        d.append_box(
            view,
            LayoutBox::block()
                .with_style(BoxStyle {
                    position: PositionScheme::Relative(Vec2::ZERO),
                    ..BoxStyle::default()
                })
                .with_geometry(BoxGeometry::new(Point::new(at.0, at.1), Size::new(size, size))),
        )
    }

    #[test]
    fn root_comes_first_and_children_follow_in_paint_order() {
        let mut d = Document::new(Size::new(400.0, 300.0), CompositorSettings::new());
        let a = positioned(&mut d, (10.0, 10.0), 50.0);
        let b = positioned(&mut d, (30.0, 30.0), 50.0);
        let mut table = PrecomputedAssignment::new()
            .promote(a, CompositingReasons::WILL_CHANGE)
            .promote(b, CompositingReasons::WILL_CHANGE);
        d.update_lifecycle(&mut table);

        let plan = SurfacePlan::build(d.layers(), d.compositing_query());
        let primaries: Vec<_> = plan
            .items
            .iter()
            .filter(|i| i.role == SurfaceRole::Primary)
            .collect();
        let owners: Vec<_> = primaries.iter().map(|i| d.layers().box_of(i.layer)).collect();
        assert_eq!(owners, [d.boxes().root(), a, b], "primaries follow paint order");
        assert_eq!(primaries[0].parent, None, "root surface is not attached");
        assert_eq!(primaries[0].depth, 0, "root surface is at depth zero");
        assert_eq!(primaries[2].depth, 2, "children sit under the viewport clip");
        assert_eq!(primaries[2].origin, Point::new(30.0, 30.0), "origin is in root space");
    }

    #[test]
    fn negative_children_sit_between_primary_and_foreground() {
        let mut d = Document::new(Size::new(400.0, 300.0), CompositorSettings::new());
        let view = d.boxes().root();
        let stacked = |z| {
            LayoutBox::block()
                .with_style(BoxStyle {
                    position: PositionScheme::Relative(Vec2::ZERO),
                    z_index: Some(z),
                    ..BoxStyle::default()
                })
                .with_geometry(BoxGeometry::new(Point::new(10.0, 10.0), Size::new(40.0, 40.0)))
        };
        let above = d.append_box(view, stacked(1));
        let below = d.append_box(view, stacked(-1));
        let mut table = PrecomputedAssignment::new()
            .promote(above, CompositingReasons::WILL_CHANGE)
            .promote(below, CompositingReasons::WILL_CHANGE);
        d.update_lifecycle(&mut table);

        let plan = SurfacePlan::build(d.layers(), d.compositing_query());
        let order: Vec<_> = plan
            .items
            .iter()
            .map(|i| (d.layers().box_of(i.layer), i.role))
            .collect();
        assert_eq!(
            order,
            [
                (view, SurfaceRole::Primary),
                (view, SurfaceRole::ChildClip),
                (below, SurfaceRole::Primary),
                (view, SurfaceRole::Foreground),
                (above, SurfaceRole::Primary),
            ],
            "the root's content draws over negative children and under positive ones"
        );
        let foreground = &plan.items[3];
        assert_eq!(foreground.parent, Some(plan.items[0].handle), "foreground hangs off the primary");
        assert_eq!(plan.items[2].parent, Some(plan.items[1].handle), "children attach to the viewport clip");
    }

    #[test]
    fn squashing_surface_follows_the_owner() {
        let mut d = Document::new(Size::new(400.0, 300.0), CompositorSettings::new());
        let owner = positioned(&mut d, (0.0, 0.0), 20.0);
        let member = positioned(&mut d, (10.0, 10.0), 20.0);
        let mut table = PrecomputedAssignment::new()
            .promote(owner, CompositingReasons::WILL_CHANGE)
            .squash(member, owner);
        d.update_lifecycle(&mut table);

        let plan = SurfacePlan::build(d.layers(), d.compositing_query());
        let roles: Vec<_> = plan
            .items
            .iter()
            .filter(|i| d.layers().box_of(i.layer) == owner)
            .map(|i| i.role)
            .collect();
        assert_eq!(
            roles,
            [
                SurfaceRole::Primary,
                SurfaceRole::SquashingContainer,
                SurfaceRole::Squashing
            ],
            "squashing surfaces draw above the owner"
        );
        let squashing = plan.items.last().unwrap();
        assert_eq!(squashing.origin, Point::new(10.0, 10.0), "squashing surface covers the member");
        assert_eq!(plan.find(squashing.handle), Some(squashing), "lookup by handle");
    }
}
