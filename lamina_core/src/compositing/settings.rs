// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor configuration.

/// Knobs that change which surfaces the compositing update creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompositorSettings {
    /// Maximum number of live backing surfaces; `None` is unlimited.
    pub surface_budget: Option<usize>,
    /// Allow scrolling surfaces for boxes that prefer composited scrolling.
    pub composited_scrolling: bool,
    /// Give the view a separate background surface when its background is
    /// `background-attachment: fixed`, so scrolling does not repaint it.
    pub decouple_fixed_backgrounds: bool,
    /// Scrollbars float above content and make their layer self-painting.
    pub overlay_scrollbars: bool,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositorSettings {
    /// Unlimited surfaces, composited scrolling on, fixed backgrounds
    /// decoupled, classic scrollbars.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            surface_budget: None,
            composited_scrolling: true,
            decouple_fixed_backgrounds: true,
            overlay_scrollbars: false,
        }
    }

    /// Default settings with a surface budget.
    #[must_use]
    pub const fn constrained(budget: usize) -> Self {
        Self {
            surface_budget: Some(budget),
            ..Self::new()
        }
    }

    /// Builder-style overlay scrollbar toggle.
    #[must_use]
    pub const fn with_overlay_scrollbars(mut self, overlay: bool) -> Self {
        self.overlay_scrollbars = overlay;
        self
    }

    /// Builder-style composited scrolling toggle.
    #[must_use]
    pub const fn with_composited_scrolling(mut self, enabled: bool) -> Self {
        self.composited_scrolling = enabled;
        self
    }
}
