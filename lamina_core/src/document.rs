// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The document: box tree, paint layer tree and lifecycle driven as one
//! pipeline.
//!
//! [`Document::update_lifecycle`] runs every phase in order and returns what
//! the paint and scrolling collaborators need from the frame. Mutations
//! rewind the lifecycle so the next update redoes the affected work.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use kurbo::{Size, Vec2};

use crate::box_tree::{BoxGeometry, BoxId, BoxStyle, BoxTree, LayoutBox};
use crate::compositing::{
    CompositingAssigner, CompositorSettings, RepaintRequest, ScrollingNotification,
    SurfaceAllocator, SurfacePool,
};
use crate::invalidation::{PaintInvalidation, PaintInvalidator, VisitRecord};
use crate::layer::{CompositingState, PaintLayerTree};
use crate::lifecycle::{CompositingQuery, DeferredTask, DocumentLifecycle, LifecycleState};
use crate::trace::{FrameSummary, FrameSummaryBuilder, PhaseKind, Tracer};

/// What one lifecycle update produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutput {
    /// Rectangles to repaint, per surface.
    pub invalidations: Vec<PaintInvalidation>,
    /// Squashed layers to repaint in full.
    pub repaints: Vec<RepaintRequest>,
    /// Changes the scrolling coordinator must hear about.
    pub scrolling: Vec<ScrollingNotification>,
    /// One record per box visited by the invalidation walk.
    pub visits: Vec<VisitRecord>,
    /// Counters for the frame.
    pub summary: FrameSummary,
}

/// A document and everything derived from it.
#[derive(Debug)]
pub struct Document<A: SurfaceAllocator = SurfacePool> {
    boxes: BoxTree,
    tree: PaintLayerTree,
    lifecycle: DocumentLifecycle,
    settings: CompositorSettings,
    allocator: A,
    invalidator: PaintInvalidator,
    deferred: VecDeque<DeferredTask>,
    frame_index: u64,
    pagination_stale: bool,
}

impl Document {
    /// Creates a document with a view of `viewport` size, using a
    /// [`SurfacePool`] limited by the settings' surface budget.
    #[must_use]
    pub fn new(viewport: Size, settings: CompositorSettings) -> Self {
        Self::with_allocator(viewport, settings, SurfacePool::new(settings.surface_budget))
    }
}

impl<A: SurfaceAllocator> Document<A> {
    /// Creates a document that allocates surfaces from `allocator`.
    #[must_use]
    pub fn with_allocator(viewport: Size, settings: CompositorSettings, allocator: A) -> Self {
        let mut lifecycle = DocumentLifecycle::new();
        lifecycle.advance_to(LifecycleState::Inactive);
        Self {
            boxes: BoxTree::new(viewport),
            tree: PaintLayerTree::new(),
            lifecycle,
            settings,
            allocator,
            invalidator: PaintInvalidator::new(),
            deferred: VecDeque::new(),
            frame_index: 0,
            pagination_stale: true,
        }
    }

    /// The box tree.
    #[must_use]
    pub fn boxes(&self) -> &BoxTree {
        &self.boxes
    }

    /// The paint layer tree.
    #[must_use]
    pub fn layers(&self) -> &PaintLayerTree {
        &self.tree
    }

    /// The lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> &DocumentLifecycle {
        &self.lifecycle
    }

    /// The compositor settings.
    #[must_use]
    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// The surface allocator.
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Paint history of the invalidation walk.
    #[must_use]
    pub fn invalidator(&self) -> &PaintInvalidator {
        &self.invalidator
    }

    /// A token for reading compositing state.
    ///
    /// # Panics
    ///
    /// Panics before the first compositing update.
    #[track_caller]
    #[must_use]
    pub fn compositing_query(&self) -> CompositingQuery<'_> {
        self.lifecycle.compositing_query()
    }

    /// Appends a box under `parent`.
    pub fn append_box(&mut self, parent: BoxId, data: LayoutBox) -> BoxId {
        self.invalidate_lifecycle();
        self.boxes.append(parent, data)
    }

    /// Removes `b` and its subtree. Their layers are torn down on the next
    /// update; what they painted is invalidated then.
    ///
    /// # Panics
    ///
    /// Panics when removing the view.
    pub fn remove_box(&mut self, b: BoxId) -> usize {
        assert_ne!(b, self.boxes.root(), "the view cannot be removed");
        self.invalidate_lifecycle();
        if let Some(parent) = self.boxes.parent(b) {
            self.mark_geometry_changed(parent);
        }
        self.boxes.remove_subtree(b).len()
    }

    /// Replaces a box's style. The box repaints in full.
    pub fn set_style(&mut self, b: BoxId, style: BoxStyle) {
        self.invalidate_lifecycle();
        self.boxes.get_mut(b).style = style;
        self.boxes.mark_for_paint_invalidation(b, true);
        self.pagination_stale = true;
        if let Some(l) = self.boxes.get(b).layer().filter(|&l| self.tree.is_alive(l)) {
            self.tree.mark_configuration_dirty(l);
        }
        self.mark_geometry_changed(b);
    }

    /// Replaces a box's post-layout geometry.
    pub fn set_geometry(&mut self, b: BoxId, geometry: BoxGeometry) {
        self.invalidate_lifecycle();
        self.boxes.get_mut(b).geometry = geometry;
        self.boxes.mark_for_paint_invalidation(b, false);
        self.pagination_stale = true;
        self.mark_geometry_changed(b);
    }

    /// Marks a box's geometry as not yet settled. It is invalidated after
    /// the rest of the next walk.
    pub fn set_geometry_pending(&mut self, b: BoxId) {
        self.invalidate_lifecycle();
        self.boxes.set_geometry_pending(b, true);
    }

    /// Scrolls a box that has scroll state. Boxes without one are left
    /// alone. Scrollbar repositioning finishes in a deferred task.
    pub fn set_scroll_offset(&mut self, b: BoxId, offset: Vec2) {
        let Some(scroll) = self.boxes.get_mut(b).scroll.as_mut() else {
            return;
        };
        if scroll.offset == offset {
            return;
        }
        scroll.offset = offset;
        self.invalidate_lifecycle();
        self.mark_geometry_changed(b);
        if let Some(l) = self.boxes.get(b).layer().filter(|&l| self.tree.is_alive(l))
            && self
                .tree
                .scrollable_area(l)
                .is_some_and(|s| s.has_overflow_controls())
        {
            self.post_task(DeferredTask::RepositionOverflowControls(l));
        }
    }

    /// Queues a task for [`run_deferred_tasks`](Self::run_deferred_tasks).
    pub fn post_task(&mut self, task: DeferredTask) {
        self.deferred.push_back(task);
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    /// Runs every queued task once. Tasks for layers that no longer exist
    /// are dropped. Returns how many ran.
    ///
    /// # Panics
    ///
    /// Panics if called from inside layout.
    #[track_caller]
    pub fn run_deferred_tasks(&mut self) -> usize {
        self.lifecycle.assert_not_in_layout();
        let mut ran = 0;
        while let Some(task) = self.deferred.pop_front() {
            match task {
                DeferredTask::RepositionOverflowControls(l) if self.tree.is_alive(l) => {
                    self.tree.mark_geometry_dirty(l);
                }
                DeferredTask::InvalidateLayer(l) if self.tree.is_alive(l) => {
                    if let Some(m) = self.tree.mapping_mut(l) {
                        m.set_needs_display();
                    }
                }
                _ => continue,
            }
            ran += 1;
        }
        if ran > 0 {
            self.invalidate_lifecycle();
        }
        ran
    }

    /// Runs the pipeline up to issued paint invalidations.
    pub fn update_lifecycle(&mut self, assigner: &mut dyn CompositingAssigner) -> FrameOutput {
        self.update_lifecycle_traced(assigner, &mut Tracer::none())
    }

    /// Like [`update_lifecycle`](Self::update_lifecycle), reporting to
    /// `tracer`.
    ///
    /// # Panics
    ///
    /// Panics if called from inside layout or on a stopped document.
    #[track_caller]
    pub fn update_lifecycle_traced(
        &mut self,
        assigner: &mut dyn CompositingAssigner,
        tracer: &mut Tracer<'_>,
    ) -> FrameOutput {
        self.lifecycle.assert_not_in_layout();
        if self.lifecycle.state() == LifecycleState::Inactive {
            self.lifecycle.advance_to(LifecycleState::VisualUpdatePending);
        } else {
            self.lifecycle
                .ensure_state_at_most(LifecycleState::VisualUpdatePending);
        }
        self.frame_index += 1;
        tracer.set_frame_index(self.frame_index);
        let mut summary = FrameSummaryBuilder::new(self.frame_index);

        // Style and layout are computed by collaborators; only the
        // bookkeeping runs here.
        tracer.phase_begin(PhaseKind::Style);
        self.lifecycle.advance_to(LifecycleState::InStyleRecalc);
        self.lifecycle.finish_phase();
        tracer.phase_end(PhaseKind::Style, 0);
        tracer.phase_begin(PhaseKind::Layout);
        self.lifecycle.enter_layout();
        self.lifecycle.exit_layout();
        self.lifecycle.finish_phase();
        tracer.phase_end(PhaseKind::Layout, 0);

        self.lifecycle.advance_to(LifecycleState::InCompositingUpdate);
        tracer.phase_begin(PhaseKind::LayerTree);
        let sync = self
            .tree
            .sync_with_box_tree(&mut self.boxes, &self.settings, &mut self.allocator);
        let touched = sync.created + sync.destroyed + sync.relinked;
        if let Some(root) = self.tree.root() {
            let moved = self.tree.update_layer_positions_after_layout(&self.boxes, root);
            if moved || touched > 0 || self.pagination_stale {
                self.tree.update_pagination_contexts(&self.boxes);
                self.pagination_stale = false;
            }
            self.tree.update_descendant_dependent_flags(&self.boxes, root);
        }
        self.tree.update_all_z_order_lists();
        tracer.phase_end(PhaseKind::LayerTree, touched);
        summary.phase_items(PhaseKind::LayerTree, touched);

        let decisions = assigner.assign(&self.tree, &self.boxes);
        let compositing = self.tree.update_compositing(
            &self.boxes,
            &self.settings,
            &decisions,
            &mut self.allocator,
            tracer,
        );
        summary.phase_items(PhaseKind::Configure, compositing.configured);
        summary.phase_items(PhaseKind::Measure, compositing.measured);
        self.lifecycle.finish_phase();

        self.lifecycle.advance_to(LifecycleState::InPaintInvalidation);
        let walked = self
            .invalidator
            .invalidate_paint(&mut self.boxes, &mut self.tree, tracer);
        self.lifecycle.finish_phase();
        summary.phase_items(PhaseKind::PaintInvalidation, count(walked.visits.len()));

        let q = CompositingQuery::known_safe();
        let (mut composited, mut squashed) = (0, 0);
        for l in self.tree.iter() {
            match self.tree.compositing_state(l, q) {
                CompositingState::OwnsBacking => composited += 1,
                CompositingState::Squashed { .. } => squashed += 1,
                CompositingState::NotComposited => {}
            }
        }
        summary.layer_counts(
            count(self.tree.len()),
            composited,
            squashed,
            count(self.allocator.live()),
        );
        summary.outputs(
            count(walked.invalidations.len()),
            count(compositing.repaints.len()),
            count(compositing.degraded.len()),
        );
        let summary = summary.finish();
        tracer.frame_summary(&summary);

        FrameOutput {
            invalidations: walked.invalidations,
            repaints: compositing.repaints,
            scrolling: compositing.scrolling,
            visits: walked.visits,
            summary,
        }
    }

    /// Tells the document the paint collaborator consumed this frame's
    /// invalidations. Clears every surface's pending repaint state.
    ///
    /// # Panics
    ///
    /// Panics unless paint invalidation has finished.
    #[track_caller]
    pub fn commit_paint(&mut self) {
        self.lifecycle.advance_to(LifecycleState::InPaint);
        let layers: Vec<_> = self.tree.iter().collect();
        for l in layers {
            if let Some(m) = self.tree.mapping_mut(l) {
                m.clear_invalidations();
            }
        }
        self.lifecycle.finish_phase();
    }

    /// Tears the document down, releasing every surface.
    pub fn stop(&mut self) {
        self.lifecycle.advance_to(LifecycleState::Stopping);
        let mut layers = self.tree.pre_order();
        layers.reverse();
        for &l in &layers {
            self.tree.detach_layer(l);
        }
        for l in layers {
            let b = self.tree.box_of(l);
            if self.boxes.is_alive(b) {
                self.boxes.set_layer(b, None);
            }
            self.tree.destroy_layer(l, &mut self.allocator);
        }
        self.deferred.clear();
        self.lifecycle.advance_to(LifecycleState::Stopped);
    }

    fn invalidate_lifecycle(&mut self) {
        self.lifecycle
            .ensure_state_at_most(LifecycleState::VisualUpdatePending);
    }

    fn mark_geometry_changed(&mut self, b: BoxId) {
        if let Some(l) = self.boxes.enclosing_layer(b).filter(|&l| self.tree.is_alive(l)) {
            self.tree.mark_geometry_dirty(l);
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Rect};

    use super::*;
    use crate::box_tree::{Columns, PositionScheme};
    use crate::compositing::{CompositingReasons, PrecomputedAssignment, SurfaceRole};
    use crate::invalidation::InvalidationReason;

    fn doc() -> Document {
        Document::new(Size::new(800.0, 600.0), CompositorSettings::new())
    }

    fn block(at: (f64, f64), size: f64) -> LayoutBox {
        LayoutBox::block().with_geometry(BoxGeometry::new(Point::new(at.0, at.1), Size::new(size, size)))
    }

    #[test]
    fn update_runs_every_phase() {
        let mut d = doc();
        assert_eq!(d.lifecycle().state(), LifecycleState::Inactive);
        let out = d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert_eq!(d.lifecycle().state(), LifecycleState::PaintInvalidationClean);
        assert_eq!(out.summary.frame_index, 1);
        assert_eq!(out.summary.composited_layers, 1, "the root is composited");
        assert_eq!(out.visits.len(), 1, "only the view exists");

        d.commit_paint();
        assert_eq!(d.lifecycle().state(), LifecycleState::PaintClean);
        let out = d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert!(out.invalidations.is_empty(), "nothing changed: {out:?}");
    }

    #[test]
    fn pagination_follows_moves_and_column_changes() {
        let mut d = doc();
        let view = d.boxes().root();
        let columns = Columns {
            column_width: 100.0,
            column_height: 100.0,
            gap: 20.0,
        };
        let container = d.append_box(
            view,
            block((0.0, 0.0), 100.0).with_style(BoxStyle {
                columns: Some(columns),
                ..BoxStyle::default()
            }),
        );
        let child = d.append_box(
            container,
            block((0.0, 50.0), 20.0).with_style(BoxStyle {
                position: PositionScheme::Relative(Vec2::ZERO),
                ..BoxStyle::default()
            }),
        );
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        let l = d.boxes().get(child).layer().unwrap();
        assert_eq!(d.layers().pagination(l).unwrap().flow_offset, Vec2::new(0.0, 50.0));

        d.set_geometry(child, BoxGeometry::new(Point::new(0.0, 90.0), Size::new(20.0, 20.0)));
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert_eq!(d.layers().pagination(l).unwrap().flow_offset, Vec2::new(0.0, 90.0));
        assert_eq!(d.layers().fragments(d.boxes(), l).len(), 2, "the child straddles a break");

        let taller = Columns {
            column_height: 200.0,
            ..columns
        };
        d.set_style(
            container,
            BoxStyle {
                columns: Some(taller),
                ..BoxStyle::default()
            },
        );
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert_eq!(d.layers().pagination(l).unwrap().columns, taller, "no layer moved");
        assert_eq!(d.layers().fragments(d.boxes(), l).len(), 1);
    }

    #[test]
    fn mutations_rewind_the_lifecycle() {
        let mut d = doc();
        let view = d.boxes().root();
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        let b = d.append_box(view, block((10.0, 10.0), 20.0));
        assert_eq!(d.lifecycle().state(), LifecycleState::VisualUpdatePending);

        let out = d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert!(out.invalidations.iter().any(|i| i.source == b && i.reason == InvalidationReason::Full));

        d.set_geometry(b, BoxGeometry::new(Point::new(30.0, 10.0), Size::new(20.0, 20.0)));
        let out = d.update_lifecycle(&mut PrecomputedAssignment::new());
        let rects: Vec<Rect> = out
            .invalidations
            .iter()
            .filter(|i| i.source == b)
            .map(|i| i.rect)
            .collect();
        assert_eq!(
            rects,
            alloc::vec![Rect::new(10.0, 10.0, 30.0, 30.0), Rect::new(30.0, 10.0, 50.0, 30.0)]
        );

        d.remove_box(b);
        let out = d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert!(out.invalidations.iter().any(|i| i.source == b), "removal repaints");
        assert_eq!(d.invalidator().painted_rect(b), None);
    }

    #[test]
    fn promoted_boxes_get_their_own_surfaces() {
        let mut d = doc();
        let view = d.boxes().root();
        let b = d.append_box(
            view,
            block((40.0, 40.0), 50.0).with_style(BoxStyle {
                position: PositionScheme::Relative(Vec2::ZERO),
                ..BoxStyle::default()
            }),
        );
        let mut table = PrecomputedAssignment::new().promote(b, CompositingReasons::WILL_CHANGE);
        let out = d.update_lifecycle(&mut table);
        assert_eq!(out.summary.composited_layers, 2);
        assert_eq!(out.summary.surfaces, u32::try_from(d.allocator().live()).unwrap());

        let l = d.boxes().get(b).layer().unwrap();
        let m = d.layers().mapping(l, d.compositing_query()).unwrap();
        assert_eq!(m.surface(SurfaceRole::Primary).unwrap().frame(), Rect::new(40.0, 40.0, 90.0, 90.0));
    }

    #[test]
    fn scrolling_queues_overflow_control_repositioning() {
        let mut d = doc();
        let view = d.boxes().root();
        let scroller = d.append_box(
            view,
            block((0.0, 0.0), 100.0).with_scroll(crate::box_tree::ScrollState {
                content_size: Size::new(100.0, 400.0),
                vertical_scrollbar: true,
                ..crate::box_tree::ScrollState::default()
            }),
        );
        d.update_lifecycle(&mut PrecomputedAssignment::new());

        d.set_scroll_offset(scroller, Vec2::new(0.0, 50.0));
        assert_eq!(d.pending_tasks(), 1);
        assert_eq!(d.run_deferred_tasks(), 1);
        assert_eq!(d.pending_tasks(), 0);
        assert_eq!(d.lifecycle().state(), LifecycleState::VisualUpdatePending);
    }

    #[test]
    fn tasks_for_dead_layers_are_dropped() {
        let mut d = doc();
        let view = d.boxes().root();
        let b = d.append_box(
            view,
            block((0.0, 0.0), 10.0).with_style(BoxStyle {
                position: PositionScheme::Absolute,
                ..BoxStyle::default()
            }),
        );
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        let l = d.boxes().get(b).layer().unwrap();
        d.remove_box(b);
        d.update_lifecycle(&mut PrecomputedAssignment::new());

        d.post_task(DeferredTask::InvalidateLayer(l));
        assert_eq!(d.run_deferred_tasks(), 0);
    }

    #[test]
    #[should_panic(expected = "re-entrant layout")]
    fn deferred_tasks_check_the_layout_guard() {
        let mut d = doc();
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        d.commit_paint();
        d.lifecycle.ensure_state_at_most(LifecycleState::VisualUpdatePending);
        d.lifecycle.enter_layout();
        d.run_deferred_tasks();
    }

    #[test]
    fn stopping_releases_every_surface() {
        let mut d = doc();
        d.update_lifecycle(&mut PrecomputedAssignment::new());
        assert!(d.allocator().live() > 0, "the root has surfaces");
        d.stop();
        assert_eq!(d.allocator().live(), 0);
        assert_eq!(d.lifecycle().state(), LifecycleState::Stopped);
    }
}
