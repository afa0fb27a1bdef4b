// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scrollable-area sub-object of a scrolling layer.

use kurbo::{Rect, Size, Vec2};

use crate::box_tree::LayoutBox;
use crate::compositing::CompositorSettings;

/// Scroll state of a layer whose box clips and scrolls its overflow.
///
/// All rectangles are in the box's border-box coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollableArea {
    offset: Vec2,
    content_size: Size,
    padding_box: Rect,
    horizontal_scrollbar: bool,
    vertical_scrollbar: bool,
    thickness: f64,
    resizer: bool,
    overlay: bool,
    needs_composited_scrolling: bool,
}

impl ScrollableArea {
    /// Builds the area from a box, or `None` if the box does not scroll.
    pub(crate) fn from_box(b: &LayoutBox, settings: &CompositorSettings) -> Option<Self> {
        let scroll = b.scroll?;
        if !b.style.overflow_clip {
            return None;
        }
        let padding_box = b.geometry.padding_box();
        let scrollable = scroll.content_size.width > padding_box.width()
            || scroll.content_size.height > padding_box.height();
        Some(Self {
            offset: scroll.offset,
            content_size: scroll.content_size,
            padding_box,
            horizontal_scrollbar: scroll.horizontal_scrollbar,
            vertical_scrollbar: scroll.vertical_scrollbar,
            thickness: scroll.scrollbar_thickness,
            resizer: scroll.resizer,
            overlay: scroll.overlay_scrollbars || settings.overlay_scrollbars,
            needs_composited_scrolling: settings.composited_scrolling
                && scroll.prefers_composited_scrolling
                && scrollable,
        })
    }

    /// The current scroll offset.
    #[must_use]
    pub fn scroll_offset(&self) -> Vec2 {
        self.offset
    }

    /// Size of the scrollable overflow.
    #[must_use]
    pub fn content_size(&self) -> Size {
        self.content_size
    }

    /// The scroll viewport.
    #[must_use]
    pub fn padding_box(&self) -> Rect {
        self.padding_box
    }

    /// Whether the compositor scrolls this area.
    #[must_use]
    pub fn needs_composited_scrolling(&self) -> bool {
        self.needs_composited_scrolling
    }

    /// Whether scrollbars float over the content.
    #[must_use]
    pub fn has_overlay_scrollbars(&self) -> bool {
        self.overlay && self.has_scrollbars()
    }

    /// Whether any scrollbar is present.
    #[must_use]
    pub fn has_scrollbars(&self) -> bool {
        self.horizontal_scrollbar || self.vertical_scrollbar
    }

    /// Whether a resizer corner is present.
    #[must_use]
    pub fn has_resizer(&self) -> bool {
        self.resizer
    }

    /// Whether scrollbars or a resizer need an overflow-controls host.
    #[must_use]
    pub fn has_overflow_controls(&self) -> bool {
        self.has_scrollbars() || self.resizer
    }

    /// The horizontal scrollbar track, if present.
    #[must_use]
    pub fn horizontal_scrollbar_rect(&self) -> Option<Rect> {
        if !self.horizontal_scrollbar {
            return None;
        }
        let p = self.padding_box;
        let t = self.thickness;
        let corner = if self.has_corner() { t } else { 0.0 };
        Some(Rect::new(p.x0, p.y1 - t, (p.x1 - corner).max(p.x0), p.y1))
    }

    /// The vertical scrollbar track, if present.
    #[must_use]
    pub fn vertical_scrollbar_rect(&self) -> Option<Rect> {
        if !self.vertical_scrollbar {
            return None;
        }
        let p = self.padding_box;
        let t = self.thickness;
        let corner = if self.has_corner() { t } else { 0.0 };
        Some(Rect::new(p.x1 - t, p.y0, p.x1, (p.y1 - corner).max(p.y0)))
    }

    /// The scroll corner, present when both scrollbars or a resizer are.
    #[must_use]
    pub fn scroll_corner_rect(&self) -> Option<Rect> {
        if !self.has_corner() {
            return None;
        }
        let p = self.padding_box;
        let t = self.thickness;
        Some(Rect::new(p.x1 - t, p.y1 - t, p.x1, p.y1))
    }

    /// The largest valid scroll offset.
    #[must_use]
    pub fn max_scroll_offset(&self) -> Vec2 {
        Vec2::new(
            (self.content_size.width - self.padding_box.width()).max(0.0),
            (self.content_size.height - self.padding_box.height()).max(0.0),
        )
    }

    fn has_corner(&self) -> bool {
        (self.horizontal_scrollbar && self.vertical_scrollbar) || self.resizer
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;

    use super::*;
    use crate::box_tree::{BoxGeometry, ScrollState};

    fn scroller(scroll: ScrollState) -> LayoutBox {
        LayoutBox::block()
            .with_geometry(BoxGeometry::new(Point::ZERO, Size::new(100.0, 80.0)))
            .with_scroll(scroll)
    }

    #[test]
    fn composited_scrolling_needs_overflow_and_permission() {
        let scroll = ScrollState {
            content_size: Size::new(100.0, 400.0),
            prefers_composited_scrolling: true,
            ..ScrollState::default()
        };
        let b = scroller(scroll);
        let on = ScrollableArea::from_box(&b, &CompositorSettings::new()).unwrap();
        assert!(on.needs_composited_scrolling());
        let off = ScrollableArea::from_box(
            &b,
            &CompositorSettings::new().with_composited_scrolling(false),
        )
        .unwrap();
        assert!(!off.needs_composited_scrolling());

        let short = scroller(ScrollState {
            content_size: Size::new(100.0, 80.0),
            prefers_composited_scrolling: true,
            ..ScrollState::default()
        });
        let area = ScrollableArea::from_box(&short, &CompositorSettings::new()).unwrap();
        assert!(
            !area.needs_composited_scrolling(),
            "content that fits does not scroll"
        );
    }

    #[test]
    fn scrollbar_rects_leave_room_for_the_corner() {
        let b = scroller(ScrollState {
            content_size: Size::new(300.0, 300.0),
            horizontal_scrollbar: true,
            vertical_scrollbar: true,
            scrollbar_thickness: 10.0,
            ..ScrollState::default()
        });
        let area = ScrollableArea::from_box(&b, &CompositorSettings::new()).unwrap();
        assert_eq!(
            area.vertical_scrollbar_rect(),
            Some(Rect::new(90.0, 0.0, 100.0, 70.0))
        );
        assert_eq!(
            area.horizontal_scrollbar_rect(),
            Some(Rect::new(0.0, 70.0, 90.0, 80.0))
        );
        assert_eq!(
            area.scroll_corner_rect(),
            Some(Rect::new(90.0, 70.0, 100.0, 80.0))
        );
        assert_eq!(area.max_scroll_offset(), Vec2::new(200.0, 220.0));
    }

    #[test]
    fn non_scrolling_box_has_no_area() {
        let b = LayoutBox::block();
        assert!(ScrollableArea::from_box(&b, &CompositorSettings::new()).is_none());
    }
}
