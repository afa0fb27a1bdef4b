// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The paint invalidation walk.
//!
//! The walk follows the containing-block tree from the view: a box's walk
//! children are the boxes whose containing block it is, in box order. Each
//! box reads the state its walk parent derived, computes its paint rect in
//! the active container's space, compares it with what it painted last
//! frame, and derives the state its own children read.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use kurbo::{Affine, Point, Rect, Vec2};

use super::mapping::{is_composited_scroller, map_point_to_container, map_rect_to_container};
use super::state::{OffsetMode, PaintInvalidationState};
use crate::box_tree::{BoxId, BoxKind, BoxTree, LayoutBox};
use crate::compositing::SurfaceRole;
use crate::geometry::{enclosing_rect, union_non_empty};
use crate::layer::{PaintLayerId, PaintLayerTree};
use crate::trace::{PhaseKind, Tracer};

/// Why a rectangle was invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationReason {
    /// Everything the box painted, old and new.
    Full,
    /// The box moved within its container.
    Location,
    /// The box grew or shrank in place; only the changed strips repaint.
    Incremental,
    /// The box moved because a box above it moved.
    Subtree,
    /// The box's geometry settled after the main walk.
    Delayed,
}

/// One rectangle of one surface needing repaint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintInvalidation {
    /// The box whose painting changed.
    pub source: BoxId,
    /// The layer owning the target surface.
    pub container: PaintLayerId,
    /// The target surface.
    pub role: SurfaceRole,
    /// Rectangle in surface coordinates.
    pub rect: Rect,
    /// Why.
    pub reason: InvalidationReason,
}

/// What the walk derived for one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisitRecord {
    /// The visited box.
    pub box_id: BoxId,
    /// The layer whose layout space `offset` and `clip` are in.
    pub container: PaintLayerId,
    /// The box's border-box origin in container space.
    pub offset: Vec2,
    /// The clip applied to the box's paint rect, if any.
    pub clip: Option<Rect>,
    /// How `offset` was derived.
    pub mode: OffsetMode,
}

/// Everything one walk produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvalidationOutput {
    /// Invalidations in emission order.
    pub invalidations: Vec<PaintInvalidation>,
    /// One record per visited box, in walk order.
    pub visits: Vec<VisitRecord>,
}

type Target = (PaintLayerId, SurfaceRole);

#[derive(Clone, Debug, PartialEq)]
struct PaintedGeometry {
    target: Target,
    /// In target surface coordinates, one per column for boxes in a
    /// multi-column flow.
    rects: Vec<Rect>,
    /// Border-box origin in container space.
    location: Vec2,
}

impl PaintedGeometry {
    fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::ZERO, |acc, &r| union_non_empty(acc, r))
    }
}

/// Remembers what every box painted last frame and walks the tree to find
/// what changed.
#[derive(Clone, Debug, Default)]
pub struct PaintInvalidator {
    previous: BTreeMap<BoxId, PaintedGeometry>,
}

impl PaintInvalidator {
    /// Creates an invalidator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The area `b` painted last frame, with its target surface. Boxes in
    /// a multi-column flow report the bounds of their pieces.
    #[must_use]
    pub fn painted_rect(&self, b: BoxId) -> Option<(PaintLayerId, SurfaceRole, Rect)> {
        self.previous
            .get(&b)
            .map(|p| (p.target.0, p.target.1, p.bounds()))
    }

    /// Runs the walk over the whole document.
    ///
    /// Layer mappings must be measured. Every emitted rectangle is also
    /// recorded on its target surface. Boxes whose geometry is pending are
    /// processed once, after every other box. All paint invalidation flags
    /// are cleared afterwards.
    pub fn invalidate_paint(
        &mut self,
        boxes: &mut BoxTree,
        tree: &mut PaintLayerTree,
        tracer: &mut Tracer<'_>,
    ) -> InvalidationOutput {
        tracer.phase_begin(PhaseKind::PaintInvalidation);
        let Some(root_layer) = tree.root() else {
            tracer.phase_end(PhaseKind::PaintInvalidation, 0);
            return InvalidationOutput::default();
        };

        let mut walk = Walk {
            boxes: &*boxes,
            tree: &*tree,
            previous: &mut self.previous,
            walk_children: walk_children(boxes),
            seen: BTreeSet::new(),
            pending: Vec::new(),
            out: InvalidationOutput::default(),
        };
        walk.visit(boxes.root(), &PaintInvalidationState::for_root(root_layer));
        let settled = walk.process_pending();
        walk.forget_removed();
        let out = walk.out;

        for inv in &out.invalidations {
            if let Some(s) = tree
                .mapping_mut(inv.container)
                .and_then(|m| m.surface_mut(inv.role))
            {
                s.invalidate_rect(inv.rect);
            }
            #[cfg(feature = "trace-rich")]
            {
                let frame_index = tracer.frame_index();
                tracer.invalidation(&crate::trace::InvalidationEvent {
                    frame_index,
                    box_index: inv.source.index(),
                    container_layer: inv.container.index(),
                    role: inv.role,
                    rect: inv.rect,
                    reason: inv.reason,
                });
            }
        }
        for b in settled {
            boxes.set_geometry_pending(b, false);
        }
        boxes.clear_paint_invalidation_flags();
        tracer.phase_end(PhaseKind::PaintInvalidation, count(out.visits.len()));
        out
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Containing-block children of every box, in box pre-order.
fn walk_children(boxes: &BoxTree) -> BTreeMap<BoxId, Vec<BoxId>> {
    let mut children: BTreeMap<BoxId, Vec<BoxId>> = BTreeMap::new();
    for b in boxes.pre_order(boxes.root()) {
        if let Some(cb) = boxes.containing_block(b) {
            children.entry(cb).or_default().push(b);
        }
    }
    children
}

/// The nearest layer, starting at `l` and following compositing
/// containers, whose content has a surface of its own: an owner or a
/// squashed layer.
fn invalidation_space(tree: &PaintLayerTree, l: PaintLayerId) -> Option<PaintLayerId> {
    let mut cur = Some(l);
    while let Some(c) = cur {
        if establishes_space(tree, c) {
            return Some(c);
        }
        cur = tree.compositing_container(c);
    }
    None
}

fn establishes_space(tree: &PaintLayerTree, l: PaintLayerId) -> bool {
    tree.owns_mapping(l) || tree.squashing_owner(l).is_some()
}

/// The surface content of `space` paints into. The space's own box paints
/// into the primary surface; its descendants into the scrolled contents or
/// foreground when those exist.
fn target_for(tree: &PaintLayerTree, space: PaintLayerId, own_box: bool) -> Option<Target> {
    if let Some(m) = tree.mapping_unchecked(space) {
        let role = if own_box {
            SurfaceRole::Primary
        } else {
            [SurfaceRole::ScrollInner, SurfaceRole::Foreground]
                .into_iter()
                .find(|&r| m.has(r))
                .unwrap_or(SurfaceRole::Primary)
        };
        return Some((space, role));
    }
    tree.squashing_owner(space)
        .map(|owner| (owner, SurfaceRole::Squashing))
}

/// Converts a rect in `space`'s layout space to target surface coordinates.
fn to_surface(tree: &PaintLayerTree, space: PaintLayerId, target: Target, rect: Rect) -> Option<Rect> {
    let (acc, offset_from_box) = if let Some(m) = tree.mapping_unchecked(space) {
        (tree.subpixel_accumulation(space), m.surface(target.1)?.offset_from_box)
    } else {
        let owner = tree.mapping_unchecked(target.0)?;
        let squashed = owner.squashed_layer(space)?;
        (squashed.subpixel_accumulation, squashed.offset_from_box)
    };
    Some(enclosing_rect(rect + acc - offset_from_box))
}

/// The area a box paints, in its border-box space.
fn local_paint_rect(lb: &LayoutBox) -> Rect {
    if lb.paints_something() {
        union_non_empty(lb.geometry.border_box(), lb.geometry.visual_overflow)
    } else {
        Rect::ZERO
    }
}

/// The strips between two rects sharing an origin.
fn incremental_strips(old: Rect, new: Rect) -> [Rect; 2] {
    let right = Rect::new(
        old.x1.min(new.x1),
        new.y0,
        old.x1.max(new.x1),
        old.y1.max(new.y1),
    );
    let bottom = Rect::new(
        new.x0,
        old.y1.min(new.y1),
        old.x1.max(new.x1),
        old.y1.max(new.y1),
    );
    [right, bottom]
}

struct PendingBox {
    box_id: BoxId,
    painted: PaintedGeometry,
}

struct Walk<'a> {
    boxes: &'a BoxTree,
    tree: &'a PaintLayerTree,
    previous: &'a mut BTreeMap<BoxId, PaintedGeometry>,
    walk_children: BTreeMap<BoxId, Vec<BoxId>>,
    seen: BTreeSet<BoxId>,
    pending: Vec<PendingBox>,
    out: InvalidationOutput,
}

impl Walk<'_> {
    fn visit(&mut self, b: BoxId, state: &PaintInvalidationState) {
        let (boxes, tree) = (self.boxes, self.tree);
        let lb = boxes.get(b);
        let own_layer = lb.layer().filter(|&l| tree.is_alive(l));
        let establishes = own_layer.filter(|&l| establishes_space(tree, l));
        let expected = boxes
            .enclosing_layer(b)
            .filter(|&l| tree.is_alive(l))
            .and_then(|l| invalidation_space(tree, l));

        let (level, mode, origin) = if let Some(l) = establishes {
            (state.establish_container(l), OffsetMode::Cached, Vec2::ZERO)
        } else if let Some(space) = expected.filter(|&s| s != state.container()) {
            let origin = map_point_to_container(boxes, tree, b, Point::ZERO, space).to_vec2();
            (state.establish_container(space), OffsetMode::Mapped, origin)
        } else if lb.style.position.is_fixed() || !state.cached_offsets_enabled() {
            let origin =
                map_point_to_container(boxes, tree, b, Point::ZERO, state.container()).to_vec2();
            (*state, OffsetMode::Mapped, origin)
        } else if lb.kind.is_vector_shape() {
            (*state, OffsetMode::Cached, state.offset())
        } else {
            let origin =
                state.offset() + lb.geometry.location.to_vec2() + lb.style.position.in_flow_offset();
            (*state, OffsetMode::Cached, origin)
        };
        let space = level.container();

        let local = local_paint_rect(lb);
        let rect = match (lb.kind, mode) {
            (_, OffsetMode::Mapped) => map_rect_to_container(boxes, tree, b, local, space),
            (BoxKind::VectorShape { local_transform }, OffsetMode::Cached) => level
                .subtree_transform()
                .map_or(local, |st| (st * local_transform).transform_rect_bbox(local)),
            _ => match lb.style.transform_about_origin() {
                Some(t) if establishes.is_none() => t.map_rect(local) + origin,
                _ => local + origin,
            },
        };
        let rects = level.paint_rects(rect);
        self.out.visits.push(VisitRecord {
            box_id: b,
            container: space,
            offset: origin,
            clip: level.clip(),
            mode,
        });
        self.seen.insert(b);

        let target = target_for(tree, space, tree.box_of(space) == b);
        let painted = target.and_then(|t| {
            let rects = rects
                .iter()
                .map(|&r| to_surface(tree, space, t, r))
                .collect::<Option<Vec<_>>>()?;
            Some(PaintedGeometry {
                target: t,
                rects,
                location: origin,
            })
        });
        let previous = self.previous.get(&b).cloned();
        let moved = matches!(
            (&previous, &painted),
            (Some(p), Some(n)) if p.target == n.target && p.location != n.location
        );
        if let Some(painted) = painted {
            if lb.is_geometry_pending() {
                self.pending.push(PendingBox { box_id: b, painted });
            } else {
                self.invalidate_box(b, lb, previous, &painted, level.ancestor_had_location_change());
                self.previous.insert(b, painted);
            }
        }

        let mut child = level;
        child.set_offset(origin);
        if establishes.is_none() {
            if moved {
                child.set_ancestor_had_location_change();
            }
            if let Some(t) = lb.style.transform_about_origin() {
                if t.is_translation_2d() {
                    child.shift(t.translation());
                } else {
                    child.disable_cached_offsets();
                }
            }
        }
        if lb.style.overflow_clip && child.cached_offsets_enabled() {
            if !is_composited_scroller(boxes, tree, b) {
                child.apply_clip(lb.geometry.padding_box() + child.offset());
            }
            child.shift(-lb.scroll_offset());
        }
        if let Some(columns) = lb.style.columns
            && child.cached_offsets_enabled()
        {
            let content_origin = lb.geometry.content_box().origin() + child.offset();
            child.enter_flow_thread(columns, content_origin);
        }
        match lb.kind {
            BoxKind::VectorRoot { viewport_transform } if child.cached_offsets_enabled() => {
                child.set_subtree_transform(Affine::translate(child.offset()) * viewport_transform);
            }
            BoxKind::VectorShape { local_transform } => {
                if let Some(st) = level.subtree_transform() {
                    child.set_subtree_transform(st * local_transform);
                }
            }
            _ => {}
        }

        let children = self.walk_children.get(&b).cloned().unwrap_or_default();
        for c in children {
            self.visit(c, &child);
        }
    }

    fn invalidate_box(
        &mut self,
        b: BoxId,
        lb: &LayoutBox,
        previous: Option<PaintedGeometry>,
        painted: &PaintedGeometry,
        ancestor_moved: bool,
    ) {
        let Some(old) = previous else {
            self.emit_all(b, painted, InvalidationReason::Full);
            return;
        };
        let reason = if lb.full_paint_invalidation || old.target != painted.target {
            InvalidationReason::Full
        } else if old.location != painted.location {
            if ancestor_moved {
                InvalidationReason::Subtree
            } else {
                InvalidationReason::Location
            }
        } else if old.rects != painted.rects {
            if let ([o], [n]) = (old.rects.as_slice(), painted.rects.as_slice())
                && o.origin() == n.origin()
            {
                for strip in incremental_strips(*o, *n) {
                    self.emit(b, painted.target, strip, InvalidationReason::Incremental);
                }
                return;
            }
            InvalidationReason::Full
        } else if lb.needs_paint_invalidation {
            InvalidationReason::Full
        } else {
            return;
        };
        self.emit_pair(b, &old, painted, reason);
    }

    /// Invalidates the old rects on the old target and the new rects on the
    /// new one, once if they coincide.
    fn emit_pair(&mut self, b: BoxId, old: &PaintedGeometry, new: &PaintedGeometry, reason: InvalidationReason) {
        if old.target != new.target || old.rects != new.rects {
            self.emit_all(b, old, reason);
        }
        self.emit_all(b, new, reason);
    }

    fn emit_all(&mut self, source: BoxId, painted: &PaintedGeometry, reason: InvalidationReason) {
        for &rect in &painted.rects {
            self.emit(source, painted.target, rect, reason);
        }
    }

    fn emit(&mut self, source: BoxId, target: Target, rect: Rect, reason: InvalidationReason) {
        if rect.is_zero_area() {
            return;
        }
        let (container, role) = target;
        let live = self.tree.is_alive(container)
            && self
                .tree
                .mapping_unchecked(container)
                .is_some_and(|m| m.has(role));
        if live {
            self.out.invalidations.push(PaintInvalidation {
                source,
                container,
                role,
                rect,
                reason,
            });
        }
    }

    /// Invalidates every box whose geometry settled during the walk.
    /// Returns them so their pending flag can be cleared.
    fn process_pending(&mut self) -> Vec<BoxId> {
        let pending = core::mem::take(&mut self.pending);
        let mut settled = Vec::with_capacity(pending.len());
        for p in pending {
            match self.previous.get(&p.box_id).cloned() {
                Some(old) => self.emit_pair(p.box_id, &old, &p.painted, InvalidationReason::Delayed),
                None => self.emit_all(p.box_id, &p.painted, InvalidationReason::Delayed),
            }
            self.previous.insert(p.box_id, p.painted);
            settled.push(p.box_id);
        }
        settled
    }

    /// Invalidates what removed boxes painted and drops their history.
    fn forget_removed(&mut self) {
        let gone: Vec<BoxId> = self
            .previous
            .keys()
            .copied()
            .filter(|b| !self.seen.contains(b))
            .collect();
        for b in gone {
            if let Some(old) = self.previous.remove(&b) {
                self.emit_all(b, &old, InvalidationReason::Full);
            }
        }
    }
}
