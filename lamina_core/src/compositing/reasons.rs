// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Why a layer is composited.

use bitflags::bitflags;

bitflags! {
    /// Reasons the overlap collaborator promoted a layer to its own backing.
    ///
    /// Opaque to this crate apart from [`SQUASHING_DISALLOWED`], which is a
    /// constraint rather than a reason, and [`ROOT`], which the compositing
    /// update adds to the root layer itself.
    ///
    /// [`SQUASHING_DISALLOWED`]: Self::SQUASHING_DISALLOWED
    /// [`ROOT`]: Self::ROOT
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CompositingReasons: u32 {
        /// The root layer is always composited.
        const ROOT = 1 << 0;
        /// A 3D transform.
        const TRANSFORM_3D = 1 << 1;
        /// Accelerated video.
        const VIDEO = 1 << 2;
        /// Accelerated canvas.
        const CANVAS = 1 << 3;
        /// A plugin.
        const PLUGIN = 1 << 4;
        /// An embedded frame.
        const IFRAME = 1 << 5;
        /// `backface-visibility: hidden`.
        const BACKFACE_VISIBILITY_HIDDEN = 1 << 6;
        /// A running transform or opacity animation.
        const ANIMATION = 1 << 7;
        /// `will-change`.
        const WILL_CHANGE = 1 << 8;
        /// Overlaps composited content beneath it.
        const OVERLAP = 1 << 9;
        /// Might overlap content beneath it during an animation.
        const ASSUMED_OVERLAP = 1 << 10;
        /// Has composited children with negative z-index.
        const NEGATIVE_Z_INDEX_CHILDREN = 1 << 11;
        /// Scrolls with composited scrolling.
        const OVERFLOW_SCROLLING = 1 << 12;
        /// Applies perspective to composited children.
        const PERSPECTIVE = 1 << 13;
        /// Establishes a preserve-3d context with composited children.
        const PRESERVE_3D = 1 << 14;
        /// Opacity applied to composited descendants.
        const OPACITY_WITH_COMPOSITED_DESCENDANTS = 1 << 15;
        /// Fixed position.
        const FIXED_POSITION = 1 << 16;
        /// Clips composited descendants.
        const CLIPS_COMPOSITED_DESCENDANTS = 1 << 17;
        /// May not be squashed into another layer's backing.
        const SQUASHING_DISALLOWED = 1 << 18;
    }
}

impl CompositingReasons {
    /// Whether these reasons promote the layer to its own backing.
    #[inline]
    #[must_use]
    pub fn promotes(self) -> bool {
        !self.difference(Self::SQUASHING_DISALLOWED).is_empty()
    }
}
