// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column fragmentation.
//!
//! Content inside a multi-column box is laid out in a single tall "flow
//! thread" whose origin is the multi-column box's content-box origin. Column
//! `i` shows the flow-thread band `[i * h, (i + 1) * h)` and is drawn
//! `i * (w + gap)` to the right of the first column. A layer inside such a
//! box has no single position, only one rectangle per column it touches.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

use super::id::PaintLayerId;
use super::tree::PaintLayerTree;
use crate::box_tree::{BoxTree, Columns};
use crate::geometry::intersect_or_zero;

/// A layer's place in the flow thread of its multi-column ancestor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pagination {
    /// The multi-column box's layer.
    pub container: PaintLayerId,
    /// Column metrics.
    pub columns: Columns,
    /// The flow-thread origin in the container's layer space.
    pub content_origin: Point,
    /// The layer's origin in flow-thread space.
    pub flow_offset: Vec2,
}

/// One column's share of a fragmented rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    /// Column index.
    pub column: usize,
    /// The visible piece, in the multi-column container's layer space.
    pub visual_rect: Rect,
}

impl Pagination {
    /// Splits `rect`, given in the paginated layer's space, into per-column
    /// rectangles in the container's layer space.
    #[must_use]
    pub fn fragments(&self, rect: Rect) -> Vec<Fragment> {
        fragment_flow_rect(&self.columns, self.content_origin, rect + self.flow_offset)
    }
}

/// Splits a flow-thread rectangle into per-column visual rectangles,
/// offset by the flow thread's `content_origin`.
#[must_use]
pub fn fragment_flow_rect(columns: &Columns, content_origin: Point, flow_rect: Rect) -> Vec<Fragment> {
    let mut out = Vec::new();
    let h = columns.column_height;
    if h <= 0.0 || flow_rect.is_zero_area() {
        return out;
    }
    let stride = columns.column_width + columns.gap;
    let mut column = 0_usize;
    let mut top = 0.0;
    let mut left = 0.0;
    while top < flow_rect.y1 {
        let band = Rect::new(flow_rect.x0, top, flow_rect.x1, top + h);
        let piece = intersect_or_zero(flow_rect, band);
        if !piece.is_zero_area() {
            out.push(Fragment {
                column,
                visual_rect: piece + Vec2::new(left, -top) + content_origin.to_vec2(),
            });
        }
        column += 1;
        top += h;
        left += stride;
    }
    out
}

impl PaintLayerTree {
    /// Per-column rectangles of the layer's bounds, in its multi-column
    /// container's layer space. Empty for layers that are not paginated.
    #[must_use]
    pub fn fragments(&self, boxes: &BoxTree, id: PaintLayerId) -> Vec<Fragment> {
        match self.pagination(id) {
            Some(p) => p.fragments(self.local_bounding_box(boxes, id)),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Columns {
        Columns {
            column_width: 100.0,
            column_height: 200.0,
            gap: 20.0,
        }
    }

    #[test]
    fn rect_inside_one_column_is_not_split() {
        let f = fragment_flow_rect(&columns(), Point::ZERO, Rect::new(10.0, 10.0, 50.0, 50.0));
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].visual_rect, Rect::new(10.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn rect_crossing_a_column_break_is_split() {
        let f = fragment_flow_rect(&columns(), Point::new(5.0, 5.0), Rect::new(0.0, 150.0, 80.0, 250.0));
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].column, 0);
        assert_eq!(f[0].visual_rect, Rect::new(5.0, 155.0, 85.0, 205.0));
        assert_eq!(f[1].column, 1);
        assert_eq!(
            f[1].visual_rect,
            Rect::new(125.0, 5.0, 205.0, 55.0),
            "second column starts one stride right and one column height up"
        );
    }

    #[test]
    fn degenerate_columns_produce_nothing() {
        let c = Columns {
            column_height: 0.0,
            ..columns()
        };
        assert!(fragment_flow_rect(&c, Point::ZERO, Rect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
    }
}
