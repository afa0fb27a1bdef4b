// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end scenarios driven through [`Document`].

use kurbo::{Affine, Point, Rect, Size, Vec2};
use lamina_core::box_tree::{
    BoxGeometry, BoxId, BoxKind, BoxStyle, LayoutBox, PositionScheme, ScrollState,
};
use lamina_core::compositing::{
    CompositingReasons, CompositorSettings, PrecomputedAssignment, SurfaceRole,
};
use lamina_core::document::{Document, FrameOutput};
use lamina_core::geometry::contains_rect;
use lamina_core::invalidation::{OffsetMode, VisitRecord};
use lamina_core::layer::{CompositingState, PaintLayerId};
use lamina_core::transform::Transform3d;

fn document() -> Document {
    Document::new(Size::new(800.0, 600.0), CompositorSettings::new())
}

fn boxed(style: BoxStyle, at: (f64, f64), size: (f64, f64)) -> LayoutBox {
    LayoutBox::block()
        .with_style(style)
        .with_geometry(BoxGeometry::new(Point::new(at.0, at.1), Size::new(size.0, size.1)))
}

fn positioned(scheme: PositionScheme) -> BoxStyle {
    BoxStyle {
        position: scheme,
        ..BoxStyle::default()
    }
}

fn relative() -> BoxStyle {
    positioned(PositionScheme::Relative(Vec2::ZERO))
}

fn layer(d: &Document, b: BoxId) -> PaintLayerId {
    d.boxes().get(b).layer().expect("box has a layer")
}

fn surface_frame(d: &Document, b: BoxId, role: SurfaceRole) -> Rect {
    let m = d
        .layers()
        .mapping(layer(d, b), d.compositing_query())
        .expect("box is composited");
    m.surface(role).expect("surface exists").frame()
}

fn visit(out: &FrameOutput, b: BoxId) -> VisitRecord {
    *out.visits
        .iter()
        .find(|v| v.box_id == b)
        .expect("box was visited")
}

#[test]
fn clipping_box_bounds_only_the_ancestor_clip_surface() {
    let mut d = document();
    let view = d.boxes().root();
    let clip_style = BoxStyle {
        overflow_clip: true,
        ..relative()
    };
    let clipper = d.append_box(view, boxed(clip_style, (20.0, 30.0), (100.0, 100.0)));
    let child = d.append_box(
        clipper,
        boxed(positioned(PositionScheme::Absolute), (0.0, 0.0), (300.0, 300.0)),
    );
    let mut table = PrecomputedAssignment::new().promote(child, CompositingReasons::WILL_CHANGE);
    d.update_lifecycle(&mut table);

    assert_eq!(
        surface_frame(&d, child, SurfaceRole::AncestorClip),
        Rect::new(20.0, 30.0, 120.0, 130.0),
        "ancestor clip is the clipping box"
    );
    assert_eq!(
        surface_frame(&d, child, SurfaceRole::Primary),
        Rect::new(0.0, 0.0, 300.0, 300.0),
        "the child's own surface is not truncated"
    );
}

#[test]
fn overlapping_siblings_share_one_squashing_surface() {
    let mut d = document();
    let view = d.boxes().root();
    let owner = d.append_box(view, boxed(relative(), (0.0, 0.0), (1.0, 1.0)));
    let first = d.append_box(view, boxed(relative(), (0.0, 0.0), (10.0, 10.0)));
    let second = d.append_box(view, boxed(relative(), (5.0, 5.0), (10.0, 10.0)));
    let mut table = PrecomputedAssignment::new()
        .promote(owner, CompositingReasons::WILL_CHANGE)
        .squash(first, owner)
        .squash(second, owner);
    d.update_lifecycle(&mut table);

    assert_eq!(
        surface_frame(&d, owner, SurfaceRole::Squashing),
        Rect::new(0.0, 0.0, 15.0, 15.0),
        "squashing surface is the union of both members"
    );
    let q = d.compositing_query();
    let m = d.layers().mapping(layer(&d, owner), q).unwrap();
    let a = m.squashed_layer(layer(&d, first)).unwrap();
    let b = m.squashed_layer(layer(&d, second)).unwrap();
    assert_eq!(
        b.offset_from_box - a.offset_from_box,
        Vec2::new(-5.0, -5.0),
        "second layer sits (5, 5) into the surface"
    );
    assert_eq!(
        d.layers().compositing_state(layer(&d, second), q),
        CompositingState::Squashed {
            owner: layer(&d, owner)
        },
        "second layer is squashed into the owner"
    );
}

#[test]
fn fixed_box_offset_is_remapped_under_a_scrolled_root() {
    let mut d = document();
    let view = d.boxes().root();
    d.set_scroll_offset(view, Vec2::new(0.0, 500.0));
    let fixed = d.append_box(
        view,
        boxed(positioned(PositionScheme::Fixed), (10.0, 20.0), (50.0, 50.0)),
    );
    let out = d.update_lifecycle(&mut PrecomputedAssignment::new());

    let v = visit(&out, fixed);
    assert_eq!(v.mode, OffsetMode::Mapped, "cached offsets are never used for fixed boxes");
    assert_eq!(v.offset, Vec2::new(10.0, 20.0), "scroll is not subtracted");

    d.set_scroll_offset(view, Vec2::new(0.0, 120.0));
    let out = d.update_lifecycle(&mut PrecomputedAssignment::new());
    assert_eq!(visit(&out, fixed).offset, Vec2::new(10.0, 20.0), "offset ignores the new scroll");
}

fn surface_snapshot(d: &Document) -> Vec<(PaintLayerId, SurfaceRole, Point, Size, Vec2)> {
    let q = d.compositing_query();
    let mut all = Vec::new();
    for l in d.layers().iter() {
        if let Some(m) = d.layers().mapping(l, q) {
            for s in m.surfaces() {
                all.push((l, s.role, s.position, s.size, s.offset_from_box));
            }
        }
    }
    all
}

#[test]
fn rerunning_the_update_is_idempotent() {
    let mut d = document();
    let view = d.boxes().root();
    let scroller = d.append_box(
        view,
        boxed(
            BoxStyle {
                overflow_clip: true,
                ..BoxStyle::default()
            },
            (10.5, 10.25),
            (200.0, 200.0),
        )
        .with_scroll(ScrollState {
            content_size: Size::new(200.0, 800.0),
            prefers_composited_scrolling: true,
            vertical_scrollbar: true,
            ..ScrollState::default()
        }),
    );
    let inner = d.append_box(scroller, boxed(relative(), (3.3, 7.7), (50.0, 50.0)));
    let spun = d.append_box(
        view,
        boxed(
            BoxStyle {
                transform: Some(Transform3d::from_rotation_z(0.3)),
                ..BoxStyle::default()
            },
            (300.0, 40.0),
            (80.0, 80.0),
        ),
    );
    let squashed = d.append_box(view, boxed(relative(), (305.0, 45.0), (20.0, 20.0)));
    let mut table = PrecomputedAssignment::new()
        .promote(inner, CompositingReasons::WILL_CHANGE)
        .promote(spun, CompositingReasons::TRANSFORM_3D)
        .squash(squashed, spun);

    d.update_lifecycle(&mut table);
    let before = surface_snapshot(&d);
    assert!(!before.is_empty(), "something was composited");
    let out = d.update_lifecycle(&mut table);
    assert_eq!(surface_snapshot(&d), before, "surfaces moved without a change");
    assert_eq!(out.summary.measured, 0, "nothing was dirty");
    assert!(out.invalidations.is_empty(), "nothing to repaint: {:?}", out.invalidations);
}

#[test]
fn squashing_surface_covers_every_member_as_members_come_and_go() {
    let mut d = document();
    let view = d.boxes().root();
    let owner = d.append_box(view, boxed(relative(), (0.0, 0.0), (10.0, 10.0)));
    let a = d.append_box(view, boxed(relative(), (4.5, 2.25), (10.0, 10.0)));
    let b = d.append_box(view, boxed(relative(), (12.0, 30.0), (10.0, 10.0)));
    let mut table = PrecomputedAssignment::new()
        .promote(owner, CompositingReasons::WILL_CHANGE)
        .squash(a, owner)
        .squash(b, owner);

    let check = |d: &Document, members: &[BoxId]| {
        let q = d.compositing_query();
        let m = d.layers().mapping(layer(d, owner), q).unwrap();
        let bounds = m.surface(SurfaceRole::Squashing).unwrap().bounds();
        for &member in members {
            let s = m.squashed_layer(layer(d, member)).expect("member is squashed");
            assert!(
                contains_rect(bounds, s.local_clip),
                "{member:?} at {:?} escapes {bounds:?}",
                s.local_clip
            );
            assert_eq!(s.local_clip.size(), Size::new(10.0, 10.0), "{member:?} is not truncated");
        }
    };
    d.update_lifecycle(&mut table);
    check(&d, &[a, b]);

    let c = d.append_box(view, boxed(relative(), (-7.5, 3.0), (10.0, 10.0)));
    table = table.squash(c, owner);
    d.update_lifecycle(&mut table);
    check(&d, &[a, b, c]);

    d.remove_box(b);
    d.update_lifecycle(&mut table);
    check(&d, &[a, c]);
}

#[test]
fn clips_shrink_down_the_walk() {
    let mut d = document();
    let view = d.boxes().root();
    let mut parent = view;
    let mut chain = Vec::new();
    for (offset, size) in [(5.0, 300.0), (10.0, 200.0), (15.0, 120.0), (20.0, 60.0)] {
        let style = BoxStyle {
            overflow_clip: true,
            ..BoxStyle::default()
        };
        let b = d.append_box(parent, boxed(style, (offset, offset), (size, size)));
        chain.push(b);
        parent = b;
    }
    let leaf = d.append_box(parent, boxed(BoxStyle::default(), (0.0, 0.0), (500.0, 500.0)));
    chain.push(leaf);
    let out = d.update_lifecycle(&mut PrecomputedAssignment::new());

    for pair in chain.windows(2) {
        let outer = visit(&out, pair[0]);
        let inner = visit(&out, pair[1]);
        assert_eq!(outer.container, inner.container, "the chain shares one container");
        if let (Some(o), Some(i)) = (outer.clip, inner.clip) {
            assert!(contains_rect(o, i), "clip of {:?} grew past {o:?}: {i:?}", pair[1]);
        }
    }
    assert!(visit(&out, leaf).clip.is_some(), "leaf is clipped");
}

#[test]
fn surface_origins_match_snapped_box_origins() {
    let mut d = document();
    let view = d.boxes().root();
    let clip_style = BoxStyle {
        overflow_clip: true,
        ..relative()
    };
    let outer = d.append_box(view, boxed(clip_style, (10.4, 20.6), (200.0, 200.0)));
    let spun = d.append_box(
        outer,
        boxed(
            BoxStyle {
                position: PositionScheme::Absolute,
                transform: Some(Transform3d::from_scale(1.5, 1.5, 1.0)),
                ..BoxStyle::default()
            },
            (3.3, 4.7),
            (80.0, 80.0),
        ),
    );
    let inner = d.append_box(spun, boxed(relative(), (5.5, 0.25), (20.0, 20.0)));
    let mut table = PrecomputedAssignment::new()
        .promote(outer, CompositingReasons::WILL_CHANGE)
        .promote(spun, CompositingReasons::WILL_CHANGE)
        .promote(inner, CompositingReasons::WILL_CHANGE);
    d.update_lifecycle(&mut table);

    let q = d.compositing_query();
    let tree = d.layers();
    for b in [outer, spun, inner] {
        let l = layer(&d, b);
        let primary = tree.mapping(l, q).unwrap().primary();
        let summed = tree.surface_origin(l, SurfaceRole::Primary, q).unwrap();
        let direct = tree.offset_to_root(l) - tree.subpixel_accumulation(l) + primary.offset_from_box;
        assert!(
            (summed.to_vec2() - direct).hypot() < 1e-9,
            "{b:?}: summed {summed:?} vs direct {direct:?}"
        );
        assert_eq!(summed, Point::new(summed.x.round(), summed.y.round()), "surfaces sit on whole pixels");
    }
}

#[test]
fn vector_content_invalidates_through_its_viewport() {
    let mut d = document();
    let view = d.boxes().root();
    let svg = d.append_box(
        view,
        LayoutBox::new(BoxKind::VectorRoot {
            viewport_transform: Affine::scale(2.0),
        })
        .with_geometry(BoxGeometry::new(Point::new(100.0, 100.0), Size::new(200.0, 200.0))),
    );
    let shape = d.append_box(
        svg,
        LayoutBox::new(BoxKind::VectorShape {
            local_transform: Affine::translate((10.0, 10.0)),
        })
        .with_geometry(BoxGeometry::new(Point::ZERO, Size::new(5.0, 5.0))),
    );
    let out = d.update_lifecycle(&mut PrecomputedAssignment::new());

    let painted: Vec<Rect> = out
        .invalidations
        .iter()
        .filter(|i| i.source == shape)
        .map(|i| i.rect)
        .collect();
    assert_eq!(
        painted,
        vec![Rect::new(120.0, 120.0, 130.0, 130.0)],
        "shape is scaled by the viewport"
    );
    assert_eq!(visit(&out, shape).mode, OffsetMode::Cached, "vector shapes keep cached offsets");
}
