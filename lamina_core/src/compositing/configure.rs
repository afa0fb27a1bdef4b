// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Applying assignment decisions and deciding which surfaces exist.

use alloc::boxed::Box;
use alloc::vec::Vec;

use kurbo::Rect;

use super::allocator::{SurfaceAllocator, SurfaceError};
use super::assign::CompositingDecisions;
use super::mapping::{LayerMapping, MappingRequirements};
use super::reasons::CompositingReasons;
use super::settings::CompositorSettings;
use super::surface::{PaintPhases, PlatformContent, Surface, SurfaceRole};
use super::update::{CompositingOutput, ScrollingNotification};
use crate::box_tree::{BoxKind, BoxTree};
use crate::dirty;
use crate::geometry::intersect_or_zero;
use crate::layer::{CompositedState, PaintLayerId, PaintLayerTree};
use crate::trace::{AllocationFailedEvent, Tracer};

impl PaintLayerTree {
    /// Stores the assigned reasons and moves every layer into the state the
    /// decisions ask for. The root always owns a mapping.
    pub(crate) fn apply_decisions(
        &mut self,
        boxes: &BoxTree,
        decisions: &CompositingDecisions,
        allocator: &mut dyn SurfaceAllocator,
        tracer: &mut Tracer<'_>,
        out: &mut CompositingOutput,
    ) {
        let order = self.pre_order();
        let root = self.root();
        let before: Vec<_> = order
            .iter()
            .filter(|&&l| is_fixed(boxes, self, l))
            .map(|&l| (l, self.compositing_state_unchecked(l)))
            .collect();

        for &l in &order {
            let mut reasons = decisions.reasons_for(l);
            if Some(l) == root {
                reasons |= CompositingReasons::ROOT;
            }
            if self.record(l).reasons != reasons {
                self.record_mut(l).reasons = reasons;
                self.dirty.mark(l.idx, dirty::CONFIGURATION);
            }
            if reasons.promotes() {
                if !self.owns_mapping(l) {
                    match LayerMapping::new(l, allocator, tracer) {
                        Ok(mapping) => self.set_owns(l, Box::new(mapping)),
                        Err(error) => {
                            let frame_index = tracer.frame_index();
                            tracer.allocation_failed(&AllocationFailedEvent {
                                frame_index,
                                layer_index: l.index(),
                                role: SurfaceRole::Primary,
                                error,
                                squashed_dropped: 0,
                            });
                            self.release_squashing(l);
                            out.degraded.push(l);
                        }
                    }
                }
            } else if self.owns_mapping(l) {
                self.demote(l, allocator, out);
            }
        }

        for &l in &order {
            let target = decisions
                .squashing_owner(l)
                .filter(|&o| o != l && self.is_alive(o) && self.owns_mapping(o) && !self.owns_mapping(l));
            match (target, self.squashing_owner(l)) {
                (Some(owner), current) if current != Some(owner) => self.squash_into(l, owner),
                (None, Some(_)) => self.release_squashing(l),
                _ => {}
            }
        }

        for (l, was) in before {
            if self.compositing_state_unchecked(l) != was {
                out.scrolling.push(ScrollingNotification::FixedContainerChanged(l));
            }
        }
    }

    /// Drops a layer's mapping, reporting a lost scrolling surface.
    pub(crate) fn demote(
        &mut self,
        l: PaintLayerId,
        allocator: &mut dyn SurfaceAllocator,
        out: &mut CompositingOutput,
    ) {
        if self
            .mapping_unchecked(l)
            .is_some_and(|m| m.has(SurfaceRole::ScrollOuter))
        {
            out.scrolling
                .push(ScrollingNotification::ScrollingSurfaceDestroyed(l));
        }
        self.set_not_composited(l, allocator);
    }

    /// The clip that non-composited layers between `l` and its compositing
    /// ancestor `ca` apply to it, in `ca`'s layout space.
    ///
    /// Walks clip parents up to `ca` or one of its ancestors, intersecting
    /// the padding boxes of clipping boxes on the way.
    pub(crate) fn ancestor_clip_rect(&self, boxes: &BoxTree, l: PaintLayerId, ca: PaintLayerId) -> Option<Rect> {
        let mut clip: Option<Rect> = None;
        let mut cur = self.clip_parent(boxes, l);
        while let Some(c) = cur {
            if c == ca || self.is_descendant_of(ca, c) {
                break;
            }
            if let Some(cb) = boxes.try_get(self.box_of(c))
                && cb.style.overflow_clip
            {
                let r = cb.geometry.padding_box() + self.offset_from_ancestor(c, ca);
                clip = Some(clip.map_or(r, |acc| intersect_or_zero(acc, r)));
            }
            cur = self.clip_parent(boxes, c);
        }
        clip
    }

    /// Evaluates every surface predicate for an owning layer.
    ///
    /// # Panics
    ///
    /// Panics if the layer's z-order lists are stale.
    #[must_use]
    pub fn mapping_requirements(
        &self,
        boxes: &BoxTree,
        settings: &CompositorSettings,
        l: PaintLayerId,
    ) -> MappingRequirements {
        let record = self.record(l);
        let Some(lb) = boxes.try_get(record.box_id) else {
            return MappingRequirements::default();
        };
        let reasons = record.reasons;
        let scrollable = record.scrollable;
        let scrolling = scrollable.is_some_and(|s| s.needs_composited_scrolling());
        let visible = lb.is_visible();
        let child_clip = lb.style.overflow_clip
            && (reasons.contains(CompositingReasons::CLIPS_COMPOSITED_DESCENDANTS)
                || self.has_composited_descendant_unchecked(l));
        let squashing = self
            .mapping_unchecked(l)
            .is_some_and(|m| !m.squashed_layers().is_empty());

        MappingRequirements {
            ancestor_clip: self
                .compositing_ancestor_unchecked(l)
                .is_some_and(|ca| self.ancestor_clip_rect(boxes, l, ca).is_some()),
            child_transform: lb.style.perspective.is_some(),
            child_clip,
            scrolling,
            foreground: reasons.contains(CompositingReasons::NEGATIVE_Z_INDEX_CHILDREN)
                || self
                    .negative_z_order_list(l)
                    .iter()
                    .any(|&c| self.owns_mapping(c)),
            background: settings.decouple_fixed_backgrounds
                && self.root() == Some(l)
                && lb.style.background_attachment_fixed,
            mask: lb.style.has_mask || lb.style.has_clip_path,
            child_clip_mask: lb.style.border_radius > 0.0 || lb.style.has_clip_path,
            squashing,
            horizontal_scrollbar: visible
                && scrollable.is_some_and(|s| s.horizontal_scrollbar_rect().is_some()),
            vertical_scrollbar: visible && scrollable.is_some_and(|s| s.vertical_scrollbar_rect().is_some()),
            scroll_corner: visible && scrollable.is_some_and(|s| s.scroll_corner_rect().is_some()),
        }
    }

    /// Brings every mapping's surface set in line with its requirements.
    ///
    /// Allocation failures degrade: a failed squashing surface returns the
    /// squashed layers to not composited; any other failure drops the whole
    /// mapping. Degrading changes other layers' predicates, so the pass
    /// repeats until nothing degrades. Returns the number of mappings
    /// configured.
    pub(crate) fn configure_mappings(
        &mut self,
        boxes: &BoxTree,
        settings: &CompositorSettings,
        allocator: &mut dyn SurfaceAllocator,
        tracer: &mut Tracer<'_>,
        out: &mut CompositingOutput,
    ) -> u32 {
        let mut configured = 0;
        loop {
            let mut degraded = false;
            for l in self.pre_order() {
                if !self.owns_mapping(l) {
                    continue;
                }
                configured += 1;
                let req = self.mapping_requirements(boxes, settings, l);
                match self.configure_one(l, req, allocator, tracer) {
                    Ok(changes) => {
                        if changes.scrolling_created {
                            out.scrolling
                                .push(ScrollingNotification::ScrollingSurfaceCreated(l));
                        }
                        if changes.scrolling_destroyed {
                            out.scrolling
                                .push(ScrollingNotification::ScrollingSurfaceDestroyed(l));
                        }
                        if changes.flips > 0 {
                            self.mark_geometry_dirty(l);
                        }
                        self.update_surface_contents(boxes, l);
                    }
                    Err((role, error)) if is_squashing_role(role) => {
                        degraded = true;
                        let dropped = self.drop_squashed_layers(l);
                        self.trace_degraded(tracer, l, role, error, count_u32(dropped.len()));
                        let req = MappingRequirements {
                            squashing: false,
                            ..req
                        };
                        if let Err((role, error)) = self.configure_one(l, req, allocator, tracer) {
                            self.trace_degraded(tracer, l, role, error, 0);
                            self.demote(l, allocator, out);
                        }
                        out.degraded.extend(dropped);
                    }
                    Err((role, error)) => {
                        degraded = true;
                        let dropped = self
                            .mapping_unchecked(l)
                            .map_or(0, |m| m.squashed_layers().len());
                        self.trace_degraded(tracer, l, role, error, count_u32(dropped));
                        self.demote(l, allocator, out);
                        out.degraded.push(l);
                    }
                }
            }
            if !degraded {
                return configured;
            }
        }
    }

    fn configure_one(
        &mut self,
        l: PaintLayerId,
        req: MappingRequirements,
        allocator: &mut dyn SurfaceAllocator,
        tracer: &mut Tracer<'_>,
    ) -> Result<super::mapping::ConfigureChanges, (SurfaceRole, SurfaceError)> {
        match self.mapping_mut(l) {
            Some(m) => m.configure_surfaces(req, allocator, tracer),
            None => Ok(super::mapping::ConfigureChanges::default()),
        }
    }

    /// Returns the owner's squashed layers to not composited.
    fn drop_squashed_layers(&mut self, owner: PaintLayerId) -> Vec<PaintLayerId> {
        let members = match self.mapping_mut(owner) {
            Some(m) => m.take_squashed_layers(),
            None => Vec::new(),
        };
        for &member in &members {
            if self.is_alive(member) {
                self.record_mut(member).composited = CompositedState::NotComposited;
                self.dirty.mark(member.idx, dirty::CONFIGURATION);
                self.mark_geometry_dirty(member);
            }
        }
        members
    }

    fn trace_degraded(
        &self,
        tracer: &mut Tracer<'_>,
        l: PaintLayerId,
        role: SurfaceRole,
        error: SurfaceError,
        squashed_dropped: u32,
    ) {
        let frame_index = tracer.frame_index();
        tracer.allocation_failed(&AllocationFailedEvent {
            frame_index,
            layer_index: l.index(),
            role,
            error,
            squashed_dropped,
        });
    }

    /// Whether anything paints into `l`'s own backing: its visible content,
    /// or that of self-painting descendants without a backing of their own.
    pub(crate) fn paints_into_backing(&self, l: PaintLayerId) -> bool {
        if self.has_visible_content(l) {
            return true;
        }
        self.children(l).any(|c| {
            self.is_self_painting(c)
                && !self.owns_mapping(c)
                && self.squashing_owner(c).is_none()
                && self.paints_into_backing(c)
        })
    }

    /// Sets drawing flags, painting phases and platform content on every
    /// surface of `l`'s mapping.
    fn update_surface_contents(&mut self, boxes: &BoxTree, l: PaintLayerId) {
        let b = self.box_of(l);
        let Some(lb) = boxes.try_get(b) else {
            return;
        };
        let draws = self.paints_into_backing(l);
        let squash_draws = self.mapping_unchecked(l).is_some_and(|m| {
            m.squashed_layers()
                .iter()
                .any(|s| self.is_alive(s.layer) && self.paints_into_backing(s.layer))
        });
        let platform = match lb.kind {
            BoxKind::Replaced(kind) if kind.has_platform_content() => Some(PlatformContent { source: b, kind }),
            _ => None,
        };
        let decorations = lb.is_visible() && lb.style.has_box_decorations;
        let selection = lb.is_visible() && lb.style.has_selection;

        let Some(m) = self.mapping_mut(l) else {
            return;
        };
        let has_foreground = m.has(SurfaceRole::Foreground);
        let scrolling = m.has(SurfaceRole::ScrollOuter);
        let mut primary_phases = PaintPhases::BACKGROUND
            | PaintPhases::NEGATIVE_Z_ORDER
            | PaintPhases::FOREGROUND
            | PaintPhases::MASK;
        if has_foreground || scrolling {
            primary_phases.remove(PaintPhases::FOREGROUND);
        }
        if m.has(SurfaceRole::Mask) {
            primary_phases.remove(PaintPhases::MASK);
        }
        if m.has(SurfaceRole::Background) {
            primary_phases.remove(PaintPhases::BACKGROUND);
        }
        if scrolling {
            primary_phases.insert(PaintPhases::COMPOSITED_SCROLL);
        }
        let mut inner_phases = PaintPhases::OVERFLOW_CONTENTS | PaintPhases::COMPOSITED_SCROLL;
        if !has_foreground {
            inner_phases.insert(PaintPhases::FOREGROUND);
        }

        for role in SurfaceRole::ALL {
            let Some(s) = m.surface_mut(role) else {
                continue;
            };
            let (phases, draws_content) = match role {
                SurfaceRole::Primary => (primary_phases, if platform.is_some() { decorations } else { draws }),
                SurfaceRole::Foreground => (PaintPhases::FOREGROUND, draws),
                SurfaceRole::Background => (PaintPhases::BACKGROUND, decorations),
                SurfaceRole::Mask => (PaintPhases::MASK, true),
                SurfaceRole::ChildClipMask => (PaintPhases::CHILD_CLIPPING_MASK, true),
                SurfaceRole::ScrollInner => (inner_phases, draws),
                SurfaceRole::ScrollSelection => (PaintPhases::OVERFLOW_CONTENTS, selection),
                SurfaceRole::Squashing => (PaintPhases::ALL_CONTENT, squash_draws),
                SurfaceRole::HorizontalScrollbar
                | SurfaceRole::VerticalScrollbar
                | SurfaceRole::ScrollCorner => (PaintPhases::empty(), true),
                _ => (PaintPhases::empty(), false),
            };
            s.phases = phases;
            s.content = if role == SurfaceRole::Primary { platform } else { None };
            set_draws_content(s, draws_content);
        }
    }
}

fn set_draws_content(s: &mut Surface, draws: bool) {
    if draws && !s.draws_content {
        s.draws_content = true;
        s.set_needs_display();
    } else {
        s.draws_content = draws;
    }
}

fn is_squashing_role(role: SurfaceRole) -> bool {
    matches!(role, SurfaceRole::Squashing | SurfaceRole::SquashingContainer)
}

fn is_fixed(boxes: &BoxTree, tree: &PaintLayerTree, l: PaintLayerId) -> bool {
    boxes
        .try_get(tree.box_of(l))
        .is_some_and(|b| b.style.position.is_fixed())
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
