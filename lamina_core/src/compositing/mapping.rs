// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer mappings: the backing surfaces owned by one composited layer.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

use super::allocator::{SurfaceAllocator, SurfaceError, SurfaceHandle};
use super::surface::{Surface, SurfaceRole};
use crate::layer::PaintLayerId;
use crate::trace::Tracer;

/// One layer painting into its owner's squashing surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SquashedLayer {
    /// The squashed layer.
    pub layer: PaintLayerId,
    /// Offset of the squashing surface's origin from the layer's box
    /// origin, in whole pixels.
    pub offset_from_box: Vec2,
    /// Fractional remainder reapplied when the layer paints.
    pub subpixel_accumulation: Vec2,
    /// The area the layer paints into, in squashing-surface coordinates.
    pub local_clip: Rect,
    /// Whether the geometry above has been derived at least once.
    pub(crate) measured: bool,
}

impl SquashedLayer {
    fn new(layer: PaintLayerId) -> Self {
        Self {
            layer,
            offset_from_box: Vec2::ZERO,
            subpixel_accumulation: Vec2::ZERO,
            local_clip: Rect::ZERO,
            measured: false,
        }
    }
}

/// Which surfaces a mapping needs. Recomputed from scratch every
/// configuration pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MappingRequirements {
    /// A non-composited ancestor clips this layer.
    pub ancestor_clip: bool,
    /// Perspective applies to children.
    pub child_transform: bool,
    /// Composited descendants must be clipped to the padding box.
    pub child_clip: bool,
    /// The compositor scrolls this layer's content.
    pub scrolling: bool,
    /// Composited negative z-order children paint between background and
    /// foreground.
    pub foreground: bool,
    /// The background is decoupled from the rest of the layer.
    pub background: bool,
    /// CSS mask or clip-path on the layer's own content.
    pub mask: bool,
    /// Rounded or path clip applied to composited children.
    pub child_clip_mask: bool,
    /// Other layers share this mapping's squashing surface.
    pub squashing: bool,
    /// A horizontal scrollbar is shown.
    pub horizontal_scrollbar: bool,
    /// A vertical scrollbar is shown.
    pub vertical_scrollbar: bool,
    /// A scroll corner or resizer is shown.
    pub scroll_corner: bool,
}

impl MappingRequirements {
    /// Whether the surface for `role` should exist.
    #[must_use]
    pub fn wants(&self, role: SurfaceRole) -> bool {
        match role {
            SurfaceRole::Primary => true,
            SurfaceRole::AncestorClip => self.ancestor_clip,
            SurfaceRole::ChildTransform => self.child_transform,
            SurfaceRole::ChildClip => self.child_clip && !self.scrolling,
            SurfaceRole::ScrollOuter | SurfaceRole::ScrollInner | SurfaceRole::ScrollSelection => {
                self.scrolling
            }
            SurfaceRole::Foreground => self.foreground,
            SurfaceRole::Background => self.background,
            SurfaceRole::Mask => self.mask,
            SurfaceRole::ChildClipMask => self.child_clip_mask && (self.child_clip || self.scrolling),
            SurfaceRole::SquashingContainer | SurfaceRole::Squashing => self.squashing,
            SurfaceRole::HorizontalScrollbar => self.horizontal_scrollbar,
            SurfaceRole::VerticalScrollbar => self.vertical_scrollbar,
            SurfaceRole::ScrollCorner => self.scroll_corner,
            SurfaceRole::OverflowControlsHost => self.has_overflow_controls(),
            SurfaceRole::OverflowControlsClip => self.has_overflow_controls() && self.ancestor_clip,
        }
    }

    /// Whether any scrollbar or corner is shown.
    #[must_use]
    pub fn has_overflow_controls(&self) -> bool {
        self.horizontal_scrollbar || self.vertical_scrollbar || self.scroll_corner
    }
}

/// What one configuration changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigureChanges {
    pub(crate) flips: u32,
    pub(crate) scrolling_created: bool,
    pub(crate) scrolling_destroyed: bool,
}

/// The backing surfaces owned by one composited paint layer.
///
/// Surfaces chain primary → child-transform → child-clip → scroll outer →
/// scroll inner → selection. Masks, squashing and overflow controls hang
/// off that chain without stacking. See [`surface_parent`](Self::surface_parent).
#[derive(Debug)]
pub struct LayerMapping {
    owner: PaintLayerId,
    surfaces: [Option<Surface>; SurfaceRole::COUNT],
    squashed: Vec<SquashedLayer>,
    requirements: MappingRequirements,
    needs_relink: bool,
    /// Origin of the surface children attach to, in the owner's snapped
    /// layer space.
    pub(crate) child_containment_origin: Point,
    /// Primary bounds in the owner's snapped layer space.
    pub(crate) composited_bounds: Rect,
}

impl LayerMapping {
    /// Creates a mapping with only its primary surface.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the primary surface cannot be
    /// created.
    pub fn new(
        owner: PaintLayerId,
        allocator: &mut dyn SurfaceAllocator,
        tracer: &mut Tracer<'_>,
    ) -> Result<Self, SurfaceError> {
        let handle = allocator.allocate(SurfaceRole::Primary)?;
        tracer.surface_created(owner.index(), SurfaceRole::Primary, handle);
        let mut surfaces: [Option<Surface>; SurfaceRole::COUNT] = Default::default();
        surfaces[SurfaceRole::Primary.index()] = Some(Surface::new(SurfaceRole::Primary, handle));
        Ok(Self {
            owner,
            surfaces,
            squashed: Vec::new(),
            requirements: MappingRequirements::default(),
            needs_relink: true,
            child_containment_origin: Point::ZERO,
            composited_bounds: Rect::ZERO,
        })
    }

    /// The layer owning this mapping.
    #[must_use]
    pub fn owner(&self) -> PaintLayerId {
        self.owner
    }

    /// The requirements applied by the last configuration.
    #[must_use]
    pub fn requirements(&self) -> MappingRequirements {
        self.requirements
    }

    /// Whether the surface chain changed since the last relink.
    #[must_use]
    pub fn needs_relink(&self) -> bool {
        self.needs_relink
    }

    /// Acknowledges a relink.
    pub fn clear_needs_relink(&mut self) {
        self.needs_relink = false;
    }

    /// The surface for `role`, if present.
    #[must_use]
    pub fn surface(&self, role: SurfaceRole) -> Option<&Surface> {
        self.surfaces[role.index()].as_ref()
    }

    pub(crate) fn surface_mut(&mut self, role: SurfaceRole) -> Option<&mut Surface> {
        self.surfaces[role.index()].as_mut()
    }

    /// Whether the surface for `role` exists.
    #[must_use]
    pub fn has(&self, role: SurfaceRole) -> bool {
        self.surfaces[role.index()].is_some()
    }

    /// The primary surface.
    #[must_use]
    pub fn primary(&self) -> &Surface {
        match self.surface(SurfaceRole::Primary) {
            Some(s) => s,
            None => panic!("layer mapping without a primary surface"),
        }
    }

    /// Present surfaces in role order.
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> + '_ {
        self.surfaces.iter().flatten()
    }

    /// Handles of every present surface.
    #[must_use]
    pub fn surface_handles(&self) -> Vec<SurfaceHandle> {
        self.surfaces().map(|s| s.handle).collect()
    }

    /// Primary bounds in the owner's snapped layer space.
    #[must_use]
    pub fn composited_bounds(&self) -> Rect {
        self.composited_bounds
    }

    /// The surface children of this layer attach to.
    #[must_use]
    pub fn child_containment_role(&self) -> SurfaceRole {
        [
            SurfaceRole::ScrollInner,
            SurfaceRole::ChildClip,
            SurfaceRole::ChildTransform,
        ]
        .into_iter()
        .find(|&r| self.has(r))
        .unwrap_or(SurfaceRole::Primary)
    }

    /// The role `role` attaches to, or `None` if it attaches to the
    /// compositing parent's child containment surface.
    #[must_use]
    pub fn surface_parent(&self, role: SurfaceRole) -> Option<SurfaceRole> {
        let first = |roles: &[SurfaceRole]| roles.iter().copied().find(|&r| self.has(r));
        match role {
            SurfaceRole::AncestorClip | SurfaceRole::SquashingContainer => None,
            SurfaceRole::Primary | SurfaceRole::Background => first(&[SurfaceRole::AncestorClip]),
            SurfaceRole::ChildTransform | SurfaceRole::Foreground | SurfaceRole::Mask => {
                Some(SurfaceRole::Primary)
            }
            SurfaceRole::ChildClip | SurfaceRole::ScrollOuter => {
                first(&[SurfaceRole::ChildTransform]).or(Some(SurfaceRole::Primary))
            }
            SurfaceRole::ScrollInner => Some(SurfaceRole::ScrollOuter),
            SurfaceRole::ScrollSelection => Some(SurfaceRole::ScrollInner),
            SurfaceRole::ChildClipMask => first(&[SurfaceRole::ScrollOuter, SurfaceRole::ChildClip]),
            SurfaceRole::Squashing => Some(SurfaceRole::SquashingContainer),
            SurfaceRole::HorizontalScrollbar | SurfaceRole::VerticalScrollbar | SurfaceRole::ScrollCorner => {
                Some(SurfaceRole::OverflowControlsHost)
            }
            SurfaceRole::OverflowControlsHost => first(&[SurfaceRole::OverflowControlsClip]),
            SurfaceRole::OverflowControlsClip => None,
        }
    }

    /// Layers sharing the squashing surface, in assignment order.
    #[must_use]
    pub fn squashed_layers(&self) -> &[SquashedLayer] {
        &self.squashed
    }

    /// The stored entry for a squashed layer.
    #[must_use]
    pub fn squashed_layer(&self, layer: PaintLayerId) -> Option<&SquashedLayer> {
        self.squashed.iter().find(|s| s.layer == layer)
    }

    pub(crate) fn squashed_layers_mut(&mut self) -> &mut [SquashedLayer] {
        &mut self.squashed
    }

    pub(crate) fn add_squashed_layer(&mut self, layer: PaintLayerId) {
        if self.squashed.iter().all(|s| s.layer != layer) {
            self.squashed.push(SquashedLayer::new(layer));
        }
    }

    pub(crate) fn remove_squashed_layer(&mut self, layer: PaintLayerId) {
        self.squashed.retain(|s| s.layer != layer);
    }

    pub(crate) fn take_squashed_layers(&mut self) -> Vec<PaintLayerId> {
        self.squashed.drain(..).map(|s| s.layer).collect()
    }

    /// Creates and releases surfaces so that exactly those `req` wants
    /// exist.
    ///
    /// On an allocation failure the surfaces created so far stay, and the
    /// failing role is returned with the error.
    pub(crate) fn configure_surfaces(
        &mut self,
        req: MappingRequirements,
        allocator: &mut dyn SurfaceAllocator,
        tracer: &mut Tracer<'_>,
    ) -> Result<ConfigureChanges, (SurfaceRole, SurfaceError)> {
        let mut changes = ConfigureChanges::default();
        for role in SurfaceRole::ALL {
            let want = req.wants(role);
            let slot = &mut self.surfaces[role.index()];
            match (want, slot.is_some()) {
                (true, false) => {
                    let handle = allocator.allocate(role).map_err(|e| (role, e))?;
                    tracer.surface_created(self.owner.index(), role, handle);
                    *slot = Some(Surface::new(role, handle));
                    changes.flips += 1;
                    if role == SurfaceRole::ScrollOuter {
                        changes.scrolling_created = true;
                    }
                }
                (false, true) => {
                    if let Some(surface) = slot.take() {
                        allocator.release(surface.handle);
                        tracer.surface_destroyed(self.owner.index(), role, surface.handle);
                    }
                    changes.flips += 1;
                    if role == SurfaceRole::ScrollOuter {
                        changes.scrolling_destroyed = true;
                    }
                }
                _ => {}
            }
        }
        if changes.flips > 0 {
            self.needs_relink = true;
        }
        self.requirements = req;
        Ok(changes)
    }

    /// Marks every drawing surface for a full repaint.
    pub fn set_needs_display(&mut self) {
        for s in self.surfaces.iter_mut().flatten() {
            if s.draws_content {
                s.set_needs_display();
            }
        }
    }

    /// Clears pending repaint state on every surface.
    pub fn clear_invalidations(&mut self) {
        for s in self.surfaces.iter_mut().flatten() {
            s.clear_invalidations();
        }
    }
}
