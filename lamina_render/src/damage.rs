// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-surface damage for partial repaint.

use alloc::vec::Vec;

use kurbo::{Rect, Vec2};
use lamina_core::compositing::{Surface, SurfaceHandle};
use lamina_core::layer::PaintLayerTree;
use lamina_core::lifecycle::CompositingQuery;

/// The part of a surface that needs repainting.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// The whole surface.
    #[default]
    Full,
    /// Rectangles in surface coordinates.
    Rects(Vec<Rect>),
    /// Nothing changed; the previous contents can be reused.
    None,
}

impl DamageRegion {
    /// The pending damage of a surface. Surfaces that do not draw have no
    /// damage.
    #[must_use]
    pub fn of_surface(surface: &Surface) -> Self {
        if !surface.draws_content {
            Self::None
        } else if surface.needs_display {
            Self::Full
        } else if surface.invalidations.is_empty() {
            Self::None
        } else {
            Self::Rects(surface.invalidations.clone())
        }
    }

    /// Returns `true` if no region needs redrawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&mut *self, other) {
            (Self::Full, _) | (_, Self::None) => {}
            (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (Self::Rects(a), Self::Rects(b)) => a.extend_from_slice(b),
        }
    }

    /// The smallest rectangle covering the damage, with `full` standing in
    /// for [`Full`](Self::Full).
    #[must_use]
    pub fn bounds(&self, full: Rect) -> Option<Rect> {
        match self {
            Self::Full => Some(full),
            Self::None => None,
            Self::Rects(rects) => rects.iter().copied().reduce(|a, b| a.union(b)),
        }
    }

    /// The same damage shifted by `offset`.
    #[must_use]
    pub fn translated(&self, offset: Vec2) -> Self {
        match self {
            Self::Rects(rects) => Self::Rects(rects.iter().map(|&r| r + offset).collect()),
            other => other.clone(),
        }
    }
}

/// Damage for one surface.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceDamage {
    /// The damaged surface.
    pub handle: SurfaceHandle,
    /// What to repaint, in surface coordinates.
    pub region: DamageRegion,
}

/// Collects the pending damage of every surface that has any, in layer
/// order then role order.
#[must_use]
pub fn collect_damage(tree: &PaintLayerTree, q: CompositingQuery<'_>) -> Vec<SurfaceDamage> {
    tree.iter()
        .filter_map(|l| tree.mapping(l, q))
        .flat_map(|m| m.surfaces())
        .filter_map(|s| {
            let region = DamageRegion::of_surface(s);
            (!region.is_empty()).then_some(SurfaceDamage {
                handle: s.handle,
                region,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use kurbo::{Point, Size};
    use lamina_core::box_tree::{BoxGeometry, BoxStyle, LayoutBox, PositionScheme};
    use lamina_core::compositing::{
        CompositingReasons, CompositorSettings, PrecomputedAssignment, SurfaceRole,
    };
    use lamina_core::document::Document;

    #[test]
    fn merge_keeps_the_larger_region() {
        let mut d = DamageRegion::None;
        d.merge(&DamageRegion::Rects(vec![Rect::new(0.0, 0.0, 1.0, 1.0)]));
        d.merge(&DamageRegion::Rects(vec![Rect::new(5.0, 5.0, 6.0, 6.0)]));
        assert_eq!(
            d.bounds(Rect::ZERO),
            Some(Rect::new(0.0, 0.0, 6.0, 6.0)),
            "rect lists concatenate"
        );
        d.merge(&DamageRegion::Full);
        d.merge(&DamageRegion::None);
        assert_eq!(d, DamageRegion::Full, "full damage absorbs everything");
    }

    #[test]
    fn translated_moves_rects_only() {
        let r = DamageRegion::Rects(vec![Rect::new(0.0, 0.0, 2.0, 2.0)]);
        assert_eq!(
            r.translated(Vec2::new(3.0, 4.0)),
            DamageRegion::Rects(vec![Rect::new(3.0, 4.0, 5.0, 6.0)]),
            "rects shift by the offset"
        );
        assert_eq!(
            DamageRegion::Full.translated(Vec2::new(3.0, 4.0)),
            DamageRegion::Full,
            "full damage has no position"
        );
    }

    #[test]
    fn damage_follows_paint_commits() {
        let mut d = Document::new(Size::new(400.0, 300.0), CompositorSettings::new());
        let view = d.boxes().root();
        let b = d.append_box(
            view,
            LayoutBox::block()
                .with_style(BoxStyle {
                    position: PositionScheme::Relative(Vec2::ZERO),
                    ..BoxStyle::default()
                })
                .with_geometry(BoxGeometry::new(Point::new(10.0, 10.0), Size::new(50.0, 50.0))),
        );
        let child = d.append_box(
            b,
            LayoutBox::block().with_geometry(BoxGeometry::new(Point::new(5.0, 5.0), Size::new(10.0, 10.0))),
        );
        let mut table = PrecomputedAssignment::new().promote(b, CompositingReasons::WILL_CHANGE);
        d.update_lifecycle(&mut table);
        let fresh = collect_damage(d.layers(), d.compositing_query());
        assert!(
            fresh.iter().all(|s| s.region == DamageRegion::Full),
            "new surfaces need a full paint: {fresh:?}"
        );

        d.commit_paint();
        assert!(
            collect_damage(d.layers(), d.compositing_query()).is_empty(),
            "painting consumes the damage"
        );

        let l = d.boxes().get(b).layer().unwrap();
        let handle = d
            .layers()
            .mapping(l, d.compositing_query())
            .and_then(|m| m.surface(SurfaceRole::Primary))
            .unwrap()
            .handle;
        d.set_geometry(child, BoxGeometry::new(Point::new(5.0, 5.0), Size::new(10.0, 20.0)));
        d.update_lifecycle(&mut table);
        let damage = collect_damage(d.layers(), d.compositing_query());
        assert_eq!(damage.len(), 1, "only the container of the child is damaged");
        assert_eq!(damage[0].handle, handle, "damage lands on the primary surface");
        assert_eq!(
            damage[0].region.bounds(Rect::ZERO),
            Some(Rect::new(5.0, 5.0, 15.0, 25.0)),
            "old and new child rects are damaged"
        );
    }
}
