// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the document pipeline.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! lifecycle phases call as they run. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects per-phase work counts during a frame and
//! produces a [`FrameSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`SquashedRepaintEvent`] and
//!   [`InvalidationEvent`] plus the corresponding `TraceSink` methods.

#[cfg(feature = "trace-rich")]
use kurbo::{Rect, Vec2};

use crate::compositing::{SurfaceError, SurfaceHandle, SurfaceRole};
#[cfg(feature = "trace-rich")]
use crate::invalidation::InvalidationReason;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which lifecycle phase is being reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Style recalculation bookkeeping.
    Style,
    /// Layout bookkeeping (layout itself is external).
    Layout,
    /// Paint layer sync, positions, descendant flags, z-order lists.
    LayerTree,
    /// Applying the overlap collaborator's decisions.
    Assign,
    /// Layer mapping configuration (surface existence).
    Configure,
    /// Layer mapping geometry.
    Measure,
    /// The paint invalidation walk.
    PaintInvalidation,
    /// Painting (external; bookkeeping only).
    Paint,
}

impl PhaseKind {
    /// Number of phases.
    pub const COUNT: usize = 8;

    /// Every phase, in pipeline order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Style,
        Self::Layout,
        Self::LayerTree,
        Self::Assign,
        Self::Configure,
        Self::Measure,
        Self::PaintInvalidation,
        Self::Paint,
    ];

    /// A stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Layout => "layout",
            Self::LayerTree => "layer-tree",
            Self::Assign => "assign",
            Self::Configure => "configure",
            Self::Measure => "measure",
            Self::PaintInvalidation => "paint-invalidation",
            Self::Paint => "paint",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a lifecycle phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
}

/// Marks the end of a lifecycle phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Layers, surfaces, or boxes the phase touched.
    pub items: u32,
}

/// Emitted when a layer mapping creates or releases a backing surface.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Raw slot index of the owning paint layer.
    pub layer_index: u32,
    /// Which surface.
    pub role: SurfaceRole,
    /// The allocator's handle.
    pub handle: SurfaceHandle,
}

/// Emitted when a layer degrades because a surface could not be allocated.
#[derive(Clone, Copy, Debug)]
pub struct AllocationFailedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Raw slot index of the layer that degraded.
    pub layer_index: u32,
    /// The surface whose allocation failed.
    pub role: SurfaceRole,
    /// Why.
    pub error: SurfaceError,
    /// Squashed layers that degraded along with it.
    pub squashed_dropped: u32,
}

/// Emitted when a squashed layer's integer offset changed and it must be
/// repainted in full.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct SquashedRepaintEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Raw slot index of the squashed layer.
    pub layer_index: u32,
    /// Previously stored offset from the squashing surface.
    pub old_offset: Vec2,
    /// Newly derived offset.
    pub new_offset: Vec2,
}

/// Emitted for each paint invalidation rectangle.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct InvalidationEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Raw slot index of the invalidated box.
    pub box_index: u32,
    /// Raw slot index of the layer owning the target surface.
    pub container_layer: u32,
    /// Target surface.
    pub role: SurfaceRole,
    /// Rectangle in surface coordinates.
    pub rect: Rect,
    /// Why.
    pub reason: InvalidationReason,
}

/// Per-frame summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Live paint layers.
    pub layers: u32,
    /// Layers owning a layer mapping.
    pub composited_layers: u32,
    /// Layers squashed into another layer's mapping.
    pub squashed_layers: u32,
    /// Live backing surfaces.
    pub surfaces: u32,
    /// Layers configured.
    pub configured: u32,
    /// Layers measured.
    pub measured: u32,
    /// Boxes visited by the paint invalidation walk.
    pub visited: u32,
    /// Invalidation rectangles issued.
    pub invalidations: u32,
    /// Full squashed-layer repaints requested.
    pub repaints: u32,
    /// Layers that degraded after an allocation failure.
    pub degraded: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the document pipeline.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a lifecycle phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a lifecycle phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a backing surface is created.
    fn on_surface_created(&mut self, e: &SurfaceEvent) {
        _ = e;
    }

    /// Called when a backing surface is released.
    fn on_surface_destroyed(&mut self, e: &SurfaceEvent) {
        _ = e;
    }

    /// Called when a layer degrades after an allocation failure.
    fn on_allocation_failed(&mut self, e: &AllocationFailedEvent) {
        _ = e;
    }

    /// Called with a per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called when a squashed layer needs a full repaint (requires
    /// `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_squashed_repaint(&mut self, e: &SquashedRepaintEvent) {
        _ = e;
    }

    /// Called per invalidation rectangle (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_invalidation(&mut self, e: &InvalidationEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
    frame_index: u64,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer")
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self {
                sink: Some(sink),
                frame_index: 0,
            }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
                frame_index: 0,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self {
                sink: None,
                frame_index: 0,
            }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
                frame_index: 0,
            }
        }
    }

    /// The frame index stamped on events built by the helper methods.
    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Sets the frame index stamped on subsequent events.
    #[inline]
    pub fn set_frame_index(&mut self, frame_index: u64) {
        self.frame_index = frame_index;
    }

    /// Emits a [`PhaseBeginEvent`] for the current frame.
    #[inline]
    pub fn phase_begin(&mut self, phase: PhaseKind) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(&PhaseBeginEvent {
                frame_index: self.frame_index,
                phase,
            });
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = phase;
        }
    }

    /// Emits a [`PhaseEndEvent`] for the current frame.
    #[inline]
    pub fn phase_end(&mut self, phase: PhaseKind, items: u32) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(&PhaseEndEvent {
                frame_index: self.frame_index,
                phase,
                items,
            });
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (phase, items);
        }
    }

    /// Emits a surface-created [`SurfaceEvent`].
    #[inline]
    pub fn surface_created(&mut self, layer_index: u32, role: SurfaceRole, handle: SurfaceHandle) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_surface_created(&SurfaceEvent {
                frame_index: self.frame_index,
                layer_index,
                role,
                handle,
            });
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (layer_index, role, handle);
        }
    }

    /// Emits a surface-destroyed [`SurfaceEvent`].
    #[inline]
    pub fn surface_destroyed(
        &mut self,
        layer_index: u32,
        role: SurfaceRole,
        handle: SurfaceHandle,
    ) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_surface_destroyed(&SurfaceEvent {
                frame_index: self.frame_index,
                layer_index,
                role,
                handle,
            });
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = (layer_index, role, handle);
        }
    }

    /// Emits an [`AllocationFailedEvent`].
    #[inline]
    pub fn allocation_failed(&mut self, e: &AllocationFailedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_allocation_failed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`SquashedRepaintEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn squashed_repaint(&mut self, e: &SquashedRepaintEvent) {
        if let Some(s) = &mut self.sink {
            s.on_squashed_repaint(e);
        }
    }

    /// Emits an [`InvalidationEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn invalidation(&mut self, e: &InvalidationEvent) {
        if let Some(s) = &mut self.sink {
            s.on_invalidation(e);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects per-phase work counts during a frame and produces a
/// [`FrameSummary`].
#[derive(Clone, Debug, Default)]
pub struct FrameSummaryBuilder {
    summary: FrameSummary,
    phase_items: [u32; PhaseKind::COUNT],
}

impl FrameSummaryBuilder {
    /// Starts building a summary for `frame_index`.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            summary: FrameSummary {
                frame_index,
                ..FrameSummary::default()
            },
            phase_items: [0; PhaseKind::COUNT],
        }
    }

    /// Records how many items a phase touched.
    pub fn phase_items(&mut self, phase: PhaseKind, items: u32) {
        self.phase_items[phase.index()] = items;
    }

    /// Returns the item count recorded for a phase.
    #[must_use]
    pub fn items_for(&self, phase: PhaseKind) -> u32 {
        self.phase_items[phase.index()]
    }

    /// Records layer-tree population counts.
    pub fn layer_counts(&mut self, layers: u32, composited: u32, squashed: u32, surfaces: u32) {
        self.summary.layers = layers;
        self.summary.composited_layers = composited;
        self.summary.squashed_layers = squashed;
        self.summary.surfaces = surfaces;
    }

    /// Records paint-invalidation output counts.
    pub fn outputs(&mut self, invalidations: u32, repaints: u32, degraded: u32) {
        self.summary.invalidations = invalidations;
        self.summary.repaints = repaints;
        self.summary.degraded = degraded;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            configured: self.items_for(PhaseKind::Configure),
            measured: self.items_for(PhaseKind::Measure),
            visited: self.items_for(PhaseKind::PaintInvalidation),
            ..self.summary
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
