// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolved style and geometry consumed from the layout collaborator.

use kurbo::{Affine, Insets, Point, Rect, Size, Vec2};

use crate::transform::Transform3d;

/// CSS positioning scheme, with the resolved in-flow offset where one applies.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PositionScheme {
    /// `position: static`.
    #[default]
    Static,
    /// `position: relative` with its resolved offset.
    Relative(Vec2),
    /// `position: sticky` with its current stick offset.
    Sticky(Vec2),
    /// `position: absolute`.
    Absolute,
    /// `position: fixed`.
    Fixed,
}

impl PositionScheme {
    /// Anything but `static`.
    #[inline]
    #[must_use]
    pub const fn is_positioned(self) -> bool {
        !matches!(self, Self::Static)
    }

    /// `absolute` or `fixed`.
    #[inline]
    #[must_use]
    pub const fn is_out_of_flow(self) -> bool {
        matches!(self, Self::Absolute | Self::Fixed)
    }

    /// `fixed`.
    #[inline]
    #[must_use]
    pub const fn is_fixed(self) -> bool {
        matches!(self, Self::Fixed)
    }

    /// The offset a relative or sticky box is shifted by after layout.
    #[inline]
    #[must_use]
    pub const fn in_flow_offset(self) -> Vec2 {
        match self {
            Self::Relative(v) | Self::Sticky(v) => v,
            _ => Vec2::ZERO,
        }
    }
}

/// CSS `visibility`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Painted and hit-testable.
    #[default]
    Visible,
    /// Takes up space but paints nothing.
    Hidden,
}

/// Multi-column fragmentation of a box's content.
///
/// Content flows into a single column-wide strip (the *flow thread*) that is
/// sliced every `column_height` and laid out horizontally.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Columns {
    /// Width of each column.
    pub column_width: f64,
    /// Height of each column; the flow thread is sliced at multiples of this.
    pub column_height: f64,
    /// Horizontal gap between columns.
    pub gap: f64,
}

/// Kinds of replaced content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplacedKind {
    /// A raster or vector image.
    Image,
    /// A `<canvas>`.
    Canvas,
    /// A `<video>`.
    Video,
    /// A plugin object.
    Plugin,
    /// An embedded frame.
    Frame,
}

impl ReplacedKind {
    /// Whether the content is supplied to the compositor as a platform
    /// handle rather than painted.
    #[must_use]
    pub const fn has_platform_content(self) -> bool {
        matches!(self, Self::Canvas | Self::Video | Self::Plugin | Self::Frame)
    }
}

/// The closed set of box kinds with layer-relevant behavior.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxKind {
    /// The root box covering the viewport.
    View,
    /// A block container.
    Block,
    /// An inline box.
    Inline,
    /// Replaced content.
    Replaced(ReplacedKind),
    /// Root of an embedded vector coordinate system. `viewport_transform`
    /// maps the children's user space into this box's border box.
    VectorRoot {
        /// User space to border box.
        viewport_transform: Affine,
    },
    /// A shape inside an embedded vector coordinate system, positioned only
    /// by its transform.
    VectorShape {
        /// Shape space to the parent's user space.
        local_transform: Affine,
    },
}

impl BoxKind {
    /// Whether the box is inside (or is a shape of) a vector coordinate
    /// system, where `location` is unused.
    #[must_use]
    pub const fn is_vector_shape(self) -> bool {
        matches!(self, Self::VectorShape { .. })
    }

    /// Embedded frames and plugins that composite their own content.
    #[must_use]
    pub const fn requires_accelerated_compositing(self) -> bool {
        matches!(
            self,
            Self::Replaced(ReplacedKind::Frame | ReplacedKind::Plugin)
        )
    }
}

/// The subset of computed style the layer machinery reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxStyle {
    /// Positioning scheme.
    pub position: PositionScheme,
    /// `z-index`; `None` is `auto`.
    pub z_index: Option<i32>,
    /// Resolved `transform`, without origin.
    pub transform: Option<Transform3d>,
    /// `transform-origin` in border-box coordinates.
    pub transform_origin: Point,
    /// `perspective` distance applied to children.
    pub perspective: Option<f64>,
    /// `perspective-origin` in border-box coordinates.
    pub perspective_origin: Point,
    /// `transform-style: preserve-3d`.
    pub preserve_3d: bool,
    /// `backface-visibility: hidden`.
    pub backface_hidden: bool,
    /// `opacity`.
    pub opacity: f32,
    /// Any `filter`.
    pub has_filter: bool,
    /// Any `mask`.
    pub has_mask: bool,
    /// Any `clip-path`.
    pub has_clip_path: bool,
    /// Uniform border radius.
    pub border_radius: f64,
    /// `overflow` other than `visible`.
    pub overflow_clip: bool,
    /// `background-attachment: fixed`.
    pub background_attachment_fixed: bool,
    /// `visibility`.
    pub visibility: Visibility,
    /// Background, border, or shadow that paints.
    pub has_box_decorations: bool,
    /// Text or replaced content that paints.
    pub paints_content: bool,
    /// Selection gaps to paint.
    pub has_selection: bool,
    /// Multi-column layout of the content.
    pub columns: Option<Columns>,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            position: PositionScheme::Static,
            z_index: None,
            transform: None,
            transform_origin: Point::ZERO,
            perspective: None,
            perspective_origin: Point::ZERO,
            preserve_3d: false,
            backface_hidden: false,
            opacity: 1.0,
            has_filter: false,
            has_mask: false,
            has_clip_path: false,
            border_radius: 0.0,
            overflow_clip: false,
            background_attachment_fixed: false,
            visibility: Visibility::Visible,
            has_box_decorations: false,
            paints_content: true,
            has_selection: false,
            columns: None,
        }
    }
}

impl BoxStyle {
    /// Transform, perspective, or preserve-3d. Such boxes contain fixed
    /// descendants and break cheap offset accumulation.
    #[must_use]
    pub fn has_transform_related_property(&self) -> bool {
        self.transform.is_some() || self.perspective.is_some() || self.preserve_3d
    }

    /// Whether the box starts a new stacking context.
    #[must_use]
    pub fn creates_stacking_context(&self) -> bool {
        (self.position.is_positioned() && self.z_index.is_some())
            || self.position.is_fixed()
            || matches!(self.position, PositionScheme::Sticky(_))
            || self.opacity < 1.0
            || self.has_transform_related_property()
            || self.has_filter
            || self.has_mask
            || self.has_clip_path
    }

    /// The transform about its origin, in border-box coordinates.
    #[must_use]
    pub fn transform_about_origin(&self) -> Option<Transform3d> {
        self.transform.map(|t| t.about_origin(self.transform_origin))
    }

    /// Whether the transform moves content off the `z = 0` plane.
    #[must_use]
    pub fn has_3d_transform(&self) -> bool {
        self.transform.is_some_and(|t| !t.is_affine_2d())
    }
}

/// Post-layout geometry of one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxGeometry {
    /// Border-box origin relative to the containing block's border box.
    pub location: Point,
    /// Border-box size.
    pub size: Size,
    /// Border widths.
    pub border: Insets,
    /// Padding widths.
    pub padding: Insets,
    /// Visual overflow in border-box coordinates.
    pub visual_overflow: Rect,
}

impl Default for BoxGeometry {
    fn default() -> Self {
        Self::new(Point::ZERO, Size::ZERO)
    }
}

impl BoxGeometry {
    /// Borderless geometry whose visual overflow is the border box.
    #[must_use]
    pub fn new(location: Point, size: Size) -> Self {
        Self {
            location,
            size,
            border: Insets::ZERO,
            padding: Insets::ZERO,
            visual_overflow: Rect::from_origin_size(Point::ZERO, size),
        }
    }

    /// Builder-style border setter.
    #[must_use]
    pub fn with_border(mut self, border: Insets) -> Self {
        self.border = border;
        self
    }

    /// Builder-style padding setter.
    #[must_use]
    pub fn with_padding(mut self, padding: Insets) -> Self {
        self.padding = padding;
        self
    }

    /// Builder-style visual overflow setter.
    #[must_use]
    pub fn with_visual_overflow(mut self, overflow: Rect) -> Self {
        self.visual_overflow = overflow;
        self
    }

    /// The border box in its own coordinates.
    #[must_use]
    pub fn border_box(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size)
    }

    /// The padding box (border box minus borders) in border-box coordinates.
    /// Overflow clipping happens here.
    #[must_use]
    pub fn padding_box(&self) -> Rect {
        Rect::new(
            self.border.x0,
            self.border.y0,
            (self.size.width - self.border.x1).max(self.border.x0),
            (self.size.height - self.border.y1).max(self.border.y0),
        )
    }

    /// The content box (padding box minus padding).
    #[must_use]
    pub fn content_box(&self) -> Rect {
        let p = self.padding_box();
        Rect::new(
            p.x0 + self.padding.x0,
            p.y0 + self.padding.y0,
            (p.x1 - self.padding.x1).max(p.x0 + self.padding.x0),
            (p.y1 - self.padding.y1).max(p.y0 + self.padding.y0),
        )
    }

    /// The border box in its containing block's coordinates.
    #[must_use]
    pub fn frame(&self) -> Rect {
        Rect::from_origin_size(self.location, self.size)
    }
}

/// Scroll state of a box that clips overflow and can scroll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollState {
    /// Current scroll offset.
    pub offset: Vec2,
    /// Size of the scrollable overflow.
    pub content_size: Size,
    /// A horizontal scrollbar is present.
    pub horizontal_scrollbar: bool,
    /// A vertical scrollbar is present.
    pub vertical_scrollbar: bool,
    /// Scrollbar thickness (zero for overlay scrollbars).
    pub scrollbar_thickness: f64,
    /// A resizer corner is present.
    pub resizer: bool,
    /// Scrollbars float above content instead of taking up space.
    pub overlay_scrollbars: bool,
    /// The content asked to be scrolled by the compositor.
    pub prefers_composited_scrolling: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            content_size: Size::ZERO,
            horizontal_scrollbar: false,
            vertical_scrollbar: false,
            scrollbar_thickness: 15.0,
            resizer: false,
            overlay_scrollbars: false,
            prefers_composited_scrolling: false,
        }
    }
}
