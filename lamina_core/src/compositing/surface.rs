// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backing surfaces and the painting phases they carry.

use alloc::vec::Vec;

use bitflags::bitflags;
use kurbo::{Point, Rect, Size, Vec2};

use super::allocator::SurfaceHandle;
use crate::box_tree::{BoxId, ReplacedKind};
use crate::transform::Transform3d;

/// The named surfaces a layer mapping may own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceRole {
    /// Clips the layer on behalf of a non-composited ancestor.
    AncestorClip,
    /// The layer's own content.
    Primary,
    /// Applies perspective to children.
    ChildTransform,
    /// Clips composited children to the padding box.
    ChildClip,
    /// Scroll viewport (clips to the padding box).
    ScrollOuter,
    /// Scrolled contents, offset by the scroll position.
    ScrollInner,
    /// Selection highlight over the scrolled contents.
    ScrollSelection,
    /// Foreground painted above negative z-order children.
    Foreground,
    /// Background painted separately from the rest of the layer.
    Background,
    /// CSS mask or clip-path.
    Mask,
    /// Mask applied to composited children (rounded or path clip).
    ChildClipMask,
    /// Holds the squashing surface in the parent's coordinate space.
    SquashingContainer,
    /// Shared backing for squashed layers.
    Squashing,
    /// Horizontal scrollbar.
    HorizontalScrollbar,
    /// Vertical scrollbar.
    VerticalScrollbar,
    /// Scroll corner or resizer.
    ScrollCorner,
    /// Hosts scrollbars above the content.
    OverflowControlsHost,
    /// Clips the overflow controls host like the ancestor clip.
    OverflowControlsClip,
}

impl SurfaceRole {
    /// Number of roles.
    pub const COUNT: usize = 18;

    /// Every role, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::AncestorClip,
        Self::Primary,
        Self::ChildTransform,
        Self::ChildClip,
        Self::ScrollOuter,
        Self::ScrollInner,
        Self::ScrollSelection,
        Self::Foreground,
        Self::Background,
        Self::Mask,
        Self::ChildClipMask,
        Self::SquashingContainer,
        Self::Squashing,
        Self::HorizontalScrollbar,
        Self::VerticalScrollbar,
        Self::ScrollCorner,
        Self::OverflowControlsHost,
        Self::OverflowControlsClip,
    ];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// A stable kebab-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AncestorClip => "ancestor-clip",
            Self::Primary => "primary",
            Self::ChildTransform => "child-transform",
            Self::ChildClip => "child-clip",
            Self::ScrollOuter => "scroll-outer",
            Self::ScrollInner => "scroll-inner",
            Self::ScrollSelection => "scroll-selection",
            Self::Foreground => "foreground",
            Self::Background => "background",
            Self::Mask => "mask",
            Self::ChildClipMask => "child-clip-mask",
            Self::SquashingContainer => "squashing-container",
            Self::Squashing => "squashing",
            Self::HorizontalScrollbar => "horizontal-scrollbar",
            Self::VerticalScrollbar => "vertical-scrollbar",
            Self::ScrollCorner => "scroll-corner",
            Self::OverflowControlsHost => "overflow-controls-host",
            Self::OverflowControlsClip => "overflow-controls-clip",
        }
    }
}

bitflags! {
    /// Which logical painting phases a surface is responsible for.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PaintPhases: u8 {
        /// Backgrounds and borders.
        const BACKGROUND = 1 << 0;
        /// Negative z-order children that are not composited.
        const NEGATIVE_Z_ORDER = 1 << 1;
        /// Normal-flow content and positive z-order children.
        const FOREGROUND = 1 << 2;
        /// Masks.
        const MASK = 1 << 3;
        /// Content inside the scroller's overflow clip.
        const OVERFLOW_CONTENTS = 1 << 4;
        /// Painted by a composited scroller.
        const COMPOSITED_SCROLL = 1 << 5;
        /// The clip mask for composited children.
        const CHILD_CLIPPING_MASK = 1 << 6;
    }
}

impl PaintPhases {
    /// Background, negative z-order, and foreground.
    pub const ALL_CONTENT: Self = Self::BACKGROUND
        .union(Self::NEGATIVE_Z_ORDER)
        .union(Self::FOREGROUND);
}

/// Content supplied to a surface as a platform handle instead of painting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlatformContent {
    /// The replaced box providing the content.
    pub source: BoxId,
    /// What kind of content it is.
    pub kind: ReplacedKind,
}

/// One backing surface and its measured geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    /// The allocator's handle.
    pub handle: SurfaceHandle,
    /// Which role this surface plays in its mapping.
    pub role: SurfaceRole,
    /// Origin relative to the parent surface.
    pub position: Point,
    /// Size in device pixels.
    pub size: Size,
    /// Surface origin minus the owning box's snapped origin, in box space.
    pub offset_from_box: Vec2,
    /// Transform applied about `transform_origin`.
    pub transform: Option<Transform3d>,
    /// Transform origin relative to the surface.
    pub transform_origin: Point,
    /// Whether children are clipped to the surface bounds.
    pub masks_to_bounds: bool,
    /// Whether the surface has painted content.
    pub draws_content: bool,
    /// Platform content shown instead of, or under, painted content.
    pub content: Option<PlatformContent>,
    /// Painting phases routed to this surface.
    pub phases: PaintPhases,
    /// Rectangles needing repaint, in surface coordinates.
    pub invalidations: Vec<Rect>,
    /// Whether the whole surface needs repaint.
    pub needs_display: bool,
}

impl Surface {
    /// A fresh surface that needs a full paint.
    #[must_use]
    pub fn new(role: SurfaceRole, handle: SurfaceHandle) -> Self {
        Self {
            handle,
            role,
            position: Point::ZERO,
            size: Size::ZERO,
            offset_from_box: Vec2::ZERO,
            transform: None,
            transform_origin: Point::ZERO,
            masks_to_bounds: false,
            draws_content: false,
            content: None,
            phases: PaintPhases::empty(),
            invalidations: Vec::new(),
            needs_display: true,
        }
    }

    /// The surface bounds in its own coordinates.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size)
    }

    /// The surface bounds in its parent's coordinates.
    #[must_use]
    pub fn frame(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// Records a rectangle needing repaint. Rectangles outside the surface
    /// are dropped; surfaces that do not draw ignore invalidation.
    pub fn invalidate_rect(&mut self, rect: Rect) {
        if !self.draws_content || self.needs_display {
            return;
        }
        let r = crate::geometry::intersect_or_zero(rect, self.bounds());
        if !r.is_zero_area() {
            self.invalidations.push(r);
        }
    }

    /// Marks the whole surface for repaint.
    pub fn set_needs_display(&mut self) {
        self.needs_display = true;
        self.invalidations.clear();
    }

    /// Clears pending repaint state after the paint collaborator consumed it.
    pub fn clear_invalidations(&mut self) {
        self.needs_display = false;
        self.invalidations.clear();
    }
}
