// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel snapping and subpixel bookkeeping.
//!
//! Layout produces fractional (`f64`) geometry. Backing surfaces live on the
//! integer device-pixel grid, so every surface origin is snapped and the
//! discarded remainder is carried as a [`SubpixelAccumulation`] that painting
//! reapplies. All helpers round half away from zero, matching `f64::round`.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect, Size, Vec2};

/// The fractional remainder left behind when a layer's offset from its
/// compositing ancestor was snapped to whole pixels.
///
/// Each component lies in `[-0.5, 0.5]`.
pub type SubpixelAccumulation = Vec2;

/// Rounds a point to the nearest whole pixel.
#[inline]
#[must_use]
pub fn snap_point(p: Point) -> Point {
    Point::new(p.x.round(), p.y.round())
}

/// Rounds a vector to whole pixels.
#[inline]
#[must_use]
pub fn snap_vec(v: Vec2) -> Vec2 {
    Vec2::new(v.x.round(), v.y.round())
}

/// Snaps one extent so that the far edge lands on the same pixel it would if
/// snapped on its own: `round(location + size) - round(location)`.
#[inline]
#[must_use]
pub fn snap_size_to_pixel(size: f64, location: f64) -> f64 {
    (location + size).round() - location.round()
}

/// Snaps a rectangle edge-wise: the origin rounds and each far edge rounds
/// independently, so adjacent rectangles never gain a gap or an overlap.
#[must_use]
pub fn pixel_snapped_rect(r: Rect) -> Rect {
    let r = r.abs();
    let x0 = r.x0.round();
    let y0 = r.y0.round();
    Rect::new(
        x0,
        y0,
        x0 + snap_size_to_pixel(r.width(), r.x0),
        y0 + snap_size_to_pixel(r.height(), r.y0),
    )
}

/// The smallest whole-pixel rectangle containing `r`.
#[must_use]
pub fn enclosing_rect(r: Rect) -> Rect {
    let r = r.abs();
    Rect::new(r.x0.floor(), r.y0.floor(), r.x1.ceil(), r.y1.ceil())
}

/// Splits a fractional offset into its snapped whole-pixel part and the
/// remainder.
#[inline]
#[must_use]
pub fn split_subpixel(offset: Vec2) -> (Vec2, SubpixelAccumulation) {
    let snapped = snap_vec(offset);
    (snapped, offset - snapped)
}

/// Returns `true` when `outer` fully contains `inner`.
///
/// Empty inner rectangles are contained everywhere.
#[must_use]
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    if inner.is_zero_area() {
        return true;
    }
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Intersects two rectangles, returning [`Rect::ZERO`] when they are disjoint.
#[must_use]
pub fn intersect_or_zero(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if r.width() <= 0.0 || r.height() <= 0.0 {
        Rect::ZERO
    } else {
        r
    }
}

/// Unites two rectangles, treating zero-area rectangles as absent.
#[must_use]
pub fn union_non_empty(a: Rect, b: Rect) -> Rect {
    match (a.is_zero_area(), b.is_zero_area()) {
        (true, _) => b,
        (_, true) => a,
        _ => a.union(b),
    }
}

/// Returns the rectangle with `origin` and `size`.
#[inline]
#[must_use]
pub fn rect_at(origin: Point, size: Size) -> Rect {
    Rect::from_origin_size(origin, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_rounds_half_away_from_zero() {
        assert_eq!(snap_point(Point::new(0.5, -0.5)), Point::new(1.0, -1.0));
        assert_eq!(snap_point(Point::new(1.49, 2.51)), Point::new(1.0, 3.0));
    }

    #[test]
    fn size_snaps_relative_to_location() {
        // 0.4 + 10.2 = 10.6 -> 11, minus round(0.4) = 0.
        assert_eq!(snap_size_to_pixel(10.2, 0.4), 11.0);
        // 0.6 + 10.2 = 10.8 -> 11, minus round(0.6) = 1.
        assert_eq!(snap_size_to_pixel(10.2, 0.6), 10.0);
    }

    #[test]
    fn adjacent_rects_stay_adjacent_after_snapping() {
        let a = pixel_snapped_rect(Rect::new(0.3, 0.0, 10.6, 5.0));
        let b = pixel_snapped_rect(Rect::new(10.6, 0.0, 20.2, 5.0));
        assert_eq!(a.x1, b.x0, "shared edge must snap to the same pixel");
    }

    #[test]
    fn enclosing_rect_contains_input() {
        let r = Rect::new(0.4, 1.6, 10.4, 11.2);
        let e = enclosing_rect(r);
        assert_eq!(e, Rect::new(0.0, 1.0, 11.0, 12.0));
        assert!(contains_rect(e, r));
    }

    #[test]
    fn split_subpixel_keeps_remainder_small() {
        let (snapped, rem) = split_subpixel(Vec2::new(10.3, -4.7));
        assert_eq!(snapped, Vec2::new(10.0, -5.0));
        assert!((rem.x - 0.3).abs() < 1e-9);
        assert!((rem.y - 0.3).abs() < 1e-9);
    }

    #[test]
    fn disjoint_intersection_is_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(intersect_or_zero(a, b), Rect::ZERO);
    }

    #[test]
    fn union_ignores_empty() {
        let a = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(union_non_empty(Rect::ZERO, a), a);
        assert_eq!(union_non_empty(a, Rect::ZERO), a);
    }
}
