// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Full local-to-container geometry mapping.
//!
//! This is the slow path of the invalidation walk. It climbs the
//! containing-block chain one box at a time, applying every location,
//! transform, scroll offset and overflow clip on the way, and stops at the
//! container's box.

use kurbo::{Point, Rect, Size};

use crate::box_tree::{BoxId, BoxKind, BoxTree, PositionScheme};
use crate::compositing::SurfaceRole;
use crate::geometry::intersect_or_zero;
use crate::layer::{PaintLayerId, PaintLayerTree};

/// Maps `rect`, given in `b`'s border-box space, into `container`'s layout
/// space, clipping by every overflow clip crossed on the way.
///
/// If `container`'s box is not on `b`'s containing-block chain, the rect is
/// mapped to the view and brought back through the container's offset from
/// the root. A stale box maps to [`Rect::ZERO`].
#[must_use]
pub fn map_rect_to_container(
    boxes: &BoxTree,
    tree: &PaintLayerTree,
    b: BoxId,
    rect: Rect,
    container: PaintLayerId,
) -> Rect {
    map(boxes, tree, b, rect, container, true)
}

/// Maps a point in `b`'s border-box space into `container`'s layout space.
#[must_use]
pub fn map_point_to_container(
    boxes: &BoxTree,
    tree: &PaintLayerTree,
    b: BoxId,
    point: Point,
    container: PaintLayerId,
) -> Point {
    map(boxes, tree, b, Rect::from_origin_size(point, Size::ZERO), container, false).origin()
}

fn map(
    boxes: &BoxTree,
    tree: &PaintLayerTree,
    b: BoxId,
    rect: Rect,
    container: PaintLayerId,
    clip: bool,
) -> Rect {
    let container_box = tree.box_of(container);
    let mut r = rect;
    let mut cur = b;
    loop {
        if cur == container_box {
            return r;
        }
        let Some(lb) = boxes.try_get(cur) else {
            return Rect::ZERO;
        };
        if let BoxKind::VectorShape { local_transform } = lb.kind {
            r = local_transform.transform_rect_bbox(r);
        } else {
            if let Some(t) = lb.style.transform_about_origin() {
                r = t.map_rect(r);
            }
            r = r + lb.geometry.location.to_vec2() + lb.style.position.in_flow_offset();
        }

        let Some(cb) = boxes.containing_block(cur) else {
            // Reached the view without meeting the container.
            return r - tree.offset_to_root(container);
        };
        let cbb = boxes.get(cb);
        if let BoxKind::VectorRoot { viewport_transform } = cbb.kind {
            r = viewport_transform.transform_rect_bbox(r);
        }
        if cbb.style.overflow_clip {
            let anchored_to_view =
                lb.style.position == PositionScheme::Fixed && matches!(cbb.kind, BoxKind::View);
            if !anchored_to_view {
                r = r - cbb.scroll_offset();
            }
            if clip && !is_composited_scroller(boxes, tree, cb) {
                r = intersect_or_zero(r, cbb.geometry.padding_box());
            }
        }
        cur = cb;
    }
}

/// Whether `b` scrolls its content on the compositor. Such a box shifts its
/// content without clipping it in layout space; the scroll surface clips.
pub(crate) fn is_composited_scroller(boxes: &BoxTree, tree: &PaintLayerTree, b: BoxId) -> bool {
    boxes
        .get(b)
        .layer()
        .filter(|&l| tree.is_alive(l))
        .and_then(|l| tree.mapping_unchecked(l))
        .is_some_and(|m| m.has(SurfaceRole::ScrollOuter))
}

#[cfg(test)]
mod tests {
    use kurbo::{Affine, Vec2};

    use super::*;
    use crate::box_tree::{BoxGeometry, BoxStyle, LayoutBox, ScrollState};
    use crate::compositing::{CompositorSettings, SurfacePool};
    use crate::transform::Transform3d;

    struct Fixture {
        boxes: BoxTree,
        tree: PaintLayerTree,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                boxes: BoxTree::new(Size::new(800.0, 600.0)),
                tree: PaintLayerTree::new(),
            }
        }

        fn sync(&mut self) -> PaintLayerId {
            let mut pool = SurfacePool::new(None);
            self.tree
                .sync_with_box_tree(&mut self.boxes, &CompositorSettings::new(), &mut pool);
            let root = self.tree.root().unwrap();
            self.tree.update_layer_positions_after_layout(&self.boxes, root);
            root
        }
    }

    fn at(x: f64, y: f64, w: f64, h: f64) -> BoxGeometry {
        BoxGeometry::new(Point::new(x, y), Size::new(w, h))
    }

    #[test]
    fn scroll_offsets_are_subtracted_and_clips_applied() {
        let mut f = Fixture::new();
        let view = f.boxes.root();
        let scroller = f.boxes.append(
            view,
            LayoutBox::block()
                .with_geometry(at(10.0, 10.0, 100.0, 100.0))
                .with_scroll(ScrollState {
                    offset: Vec2::new(0.0, 30.0),
                    content_size: Size::new(100.0, 300.0),
                    ..ScrollState::default()
                }),
        );
        let inner = f
            .boxes
            .append(scroller, LayoutBox::block().with_geometry(at(5.0, 50.0, 20.0, 20.0)));
        let corner = f
            .boxes
            .append(scroller, LayoutBox::block().with_geometry(at(90.0, 120.0, 20.0, 20.0)));
        let root = f.sync();

        let local = Rect::new(0.0, 0.0, 20.0, 20.0);
        assert_eq!(
            map_rect_to_container(&f.boxes, &f.tree, inner, local, root),
            Rect::new(15.0, 30.0, 35.0, 50.0),
            "scroll not subtracted"
        );
        // (90, 90) after scrolling; the scroller's padding box clips the rest.
        assert_eq!(
            map_rect_to_container(&f.boxes, &f.tree, corner, local, root),
            Rect::new(100.0, 100.0, 110.0, 110.0),
            "overflow clip not applied"
        );
        assert_eq!(
            map_point_to_container(&f.boxes, &f.tree, corner, Point::ZERO, root),
            Point::new(100.0, 100.0),
            "points are never clipped"
        );
    }

    #[test]
    fn transforms_apply_about_the_box_origin() {
        let mut f = Fixture::new();
        let view = f.boxes.root();
        let scaled = f.boxes.append(
            view,
            LayoutBox::block()
                .with_style(BoxStyle {
                    transform: Some(Transform3d::from_scale(2.0, 2.0, 1.0)),
                    ..BoxStyle::default()
                })
                .with_geometry(at(10.0, 10.0, 100.0, 100.0)),
        );
        let child = f
            .boxes
            .append(scaled, LayoutBox::block().with_geometry(at(5.0, 5.0, 10.0, 10.0)));
        let root = f.sync();

        assert_eq!(
            map_rect_to_container(&f.boxes, &f.tree, child, Rect::new(0.0, 0.0, 10.0, 10.0), root),
            Rect::new(20.0, 20.0, 40.0, 40.0),
            "transform not applied"
        );
    }

    #[test]
    fn vector_shapes_map_through_the_viewport_transform() {
        let mut f = Fixture::new();
        let view = f.boxes.root();
        let svg = f.boxes.append(
            view,
            LayoutBox::new(BoxKind::VectorRoot {
                viewport_transform: Affine::scale(2.0),
            })
            .with_geometry(at(100.0, 100.0, 200.0, 200.0)),
        );
        let shape = f.boxes.append(
            svg,
            LayoutBox::new(BoxKind::VectorShape {
                local_transform: Affine::translate((10.0, 10.0)),
            })
            .with_geometry(at(0.0, 0.0, 5.0, 5.0)),
        );
        let root = f.sync();

        assert_eq!(
            map_rect_to_container(&f.boxes, &f.tree, shape, Rect::new(0.0, 0.0, 5.0, 5.0), root),
            Rect::new(120.0, 120.0, 130.0, 130.0),
            "vector transforms not composed"
        );
    }

    #[test]
    fn fixed_boxes_ignore_the_view_scroll() {
        let mut f = Fixture::new();
        let view = f.boxes.root();
        f.boxes.get_mut(view).scroll.as_mut().unwrap().offset = Vec2::new(0.0, 500.0);
        let fixed = f.boxes.append(
            view,
            LayoutBox::block()
                .with_style(BoxStyle {
                    position: PositionScheme::Fixed,
                    ..BoxStyle::default()
                })
                .with_geometry(at(10.0, 20.0, 50.0, 50.0)),
        );
        let root = f.sync();

        assert_eq!(
            map_point_to_container(&f.boxes, &f.tree, fixed, Point::ZERO, root),
            Point::new(10.0, 20.0),
            "fixed box moved with the scroll"
        );
    }

    #[test]
    fn unrelated_containers_map_through_the_root() {
        let mut f = Fixture::new();
        let view = f.boxes.root();
        let positioned = f.boxes.append(
            view,
            LayoutBox::block()
                .with_style(BoxStyle {
                    position: PositionScheme::Relative(Vec2::ZERO),
                    ..BoxStyle::default()
                })
                .with_geometry(at(50.0, 50.0, 10.0, 10.0)),
        );
        let sibling = f
            .boxes
            .append(view, LayoutBox::block().with_geometry(at(0.0, 0.0, 10.0, 10.0)));
        f.sync();
        let container = f.boxes.get(positioned).layer().unwrap();

        assert_eq!(
            map_rect_to_container(&f.boxes, &f.tree, sibling, Rect::new(0.0, 0.0, 10.0, 10.0), container),
            Rect::new(-50.0, -50.0, -40.0, -40.0),
            "fallback through the root is wrong"
        );
    }
}
