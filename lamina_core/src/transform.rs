// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 transform for CSS transforms and perspective.
//!
//! Covers what the layer tree needs from 3-D transforms: composition,
//! transform-origin handling, point and rectangle mapping, flattening at the
//! edge of a 3-D rendering context, and projecting a screen point back onto a
//! layer's plane for depth-sorted hit testing.

use core::ops::Mul;

use kurbo::{Affine, Point, Rect, Vec2};

/// Homogeneous `w` values at or below this are treated as behind the viewer.
const W_EPSILON: f64 = 1e-9;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Y axis (radians).
    #[must_use]
    pub fn from_rotation_y(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [c, 0.0, -s, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [s, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a CSS `perspective(d)` matrix.
    ///
    /// Non-positive distances produce the identity, matching how a
    /// `perspective: 0` declaration is ignored.
    #[must_use]
    pub fn from_perspective(distance: f64) -> Self {
        if distance <= 0.0 {
            return Self::IDENTITY;
        }
        let mut t = Self::IDENTITY;
        t.cols[2][3] = -1.0 / distance;
        t
    }

    /// Embeds a 2-D affine transform.
    #[must_use]
    pub fn from_affine(a: Affine) -> Self {
        let [m0, m1, m2, m3, m4, m5] = a.as_coeffs();
        Self {
            cols: [
                [m0, m1, 0.0, 0.0],
                [m2, m3, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [m4, m5, 0.0, 1.0],
            ],
        }
    }

    /// Wraps `self` so it applies about `origin` instead of `(0, 0, 0)`.
    #[must_use]
    pub fn about_origin(self, origin: Point) -> Self {
        Self::from_translation(origin.x, origin.y, 0.0)
            * self
            * Self::from_translation(-origin.x, -origin.y, 0.0)
    }

    /// Returns the 2-D translation component.
    #[inline]
    #[must_use]
    pub const fn translation(&self) -> Vec2 {
        Vec2::new(self.cols[3][0], self.cols[3][1])
    }

    /// Whether the transform is exactly the identity.
    #[inline]
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Whether the transform has no effect on `z` and no perspective, so it
    /// can be expressed as a 2-D [`Affine`].
    #[must_use]
    pub fn is_affine_2d(&self) -> bool {
        let c = &self.cols;
        c[0][2] == 0.0
            && c[0][3] == 0.0
            && c[1][2] == 0.0
            && c[1][3] == 0.0
            && c[2][0] == 0.0
            && c[2][1] == 0.0
            && c[2][2] == 1.0
            && c[2][3] == 0.0
            && c[3][2] == 0.0
            && c[3][3] == 1.0
    }

    /// Whether the transform is a pure 2-D translation.
    #[must_use]
    pub fn is_translation_2d(&self) -> bool {
        let c = &self.cols;
        self.is_affine_2d() && c[0][0] == 1.0 && c[0][1] == 0.0 && c[1][0] == 0.0 && c[1][1] == 1.0
    }

    /// Drops the 3-D components, keeping the 2-D affine part.
    #[must_use]
    pub fn to_affine(&self) -> Affine {
        let c = &self.cols;
        Affine::new([c[0][0], c[0][1], c[1][0], c[1][1], c[3][0], c[3][1]])
    }

    /// Flattens the transform into the `z = 0` plane, as happens at the
    /// boundary of a 3-D rendering context.
    #[must_use]
    pub fn flatten(mut self) -> Self {
        self.cols[0][2] = 0.0;
        self.cols[1][2] = 0.0;
        self.cols[2] = [0.0, 0.0, 1.0, 0.0];
        self.cols[3][2] = 0.0;
        self
    }

    /// Maps the point `(p.x, p.y, 0)` and returns the projected 2-D point
    /// plus its depth, or `None` if it falls behind the viewer.
    #[must_use]
    pub fn map_point_with_depth(&self, p: Point) -> Option<(Point, f64)> {
        let c = &self.cols;
        let x = c[0][0] * p.x + c[1][0] * p.y + c[3][0];
        let y = c[0][1] * p.x + c[1][1] * p.y + c[3][1];
        let z = c[0][2] * p.x + c[1][2] * p.y + c[3][2];
        let w = c[0][3] * p.x + c[1][3] * p.y + c[3][3];
        if w <= W_EPSILON {
            return None;
        }
        Some((Point::new(x / w, y / w), z / w))
    }

    /// Maps a point, dropping depth.
    #[must_use]
    pub fn map_point(&self, p: Point) -> Option<Point> {
        self.map_point_with_depth(p).map(|(p, _)| p)
    }

    /// Maps a rectangle and returns the bounding box of the projected quad.
    ///
    /// Corners behind the viewer are skipped; if every corner is behind the
    /// viewer the result is [`Rect::ZERO`].
    #[must_use]
    pub fn map_rect(&self, r: Rect) -> Rect {
        if self.is_affine_2d() {
            return self.to_affine().transform_rect_bbox(r);
        }
        let corners = [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ];
        let mut out: Option<Rect> = None;
        for corner in corners {
            if let Some(p) = self.map_point(corner) {
                out = Some(match out {
                    Some(acc) => acc.union_pt(p),
                    None => Rect::from_points(p, p),
                });
            }
        }
        out.unwrap_or(Rect::ZERO)
    }

    /// Finds the point on this transform's `z = 0` plane that projects onto
    /// the screen point `screen`, returning it with its depth.
    ///
    /// Returns `None` when the plane is seen edge-on or the point lies behind
    /// the viewer.
    #[must_use]
    pub fn project_point_to_plane(&self, screen: Point) -> Option<(Point, f64)> {
        let c = &self.cols;
        let (sx, sy) = (screen.x, screen.y);
        // Solve X = sx * W and Y = sy * W for the local (x, y).
        let a = c[0][0] - sx * c[0][3];
        let b = c[1][0] - sx * c[1][3];
        let e = sx * c[3][3] - c[3][0];
        let cc = c[0][1] - sy * c[0][3];
        let d = c[1][1] - sy * c[1][3];
        let f = sy * c[3][3] - c[3][1];
        let det = a * d - b * cc;
        if det.abs() < 1e-12 {
            return None;
        }
        let local = Point::new((e * d - b * f) / det, (a * f - e * cc) / det);
        let (_, depth) = self.map_point_with_depth(local)?;
        Some((local, depth))
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

fn sin_cos(radians: f64) -> (f64, f64) {
    #[cfg(feature = "std")]
    {
        radians.sin_cos()
    }
    #[cfg(not(feature = "std"))]
    {
        use kurbo::common::FloatFuncs as _;
        (radians.sin(), radians.cos())
    }
}
