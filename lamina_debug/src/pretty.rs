// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use lamina_core::trace::{
    AllocationFailedEvent, FrameSummary, InvalidationEvent, PhaseBeginEvent, PhaseEndEvent,
    SquashedRepaintEvent, SurfaceEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    invalidations: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("invalidations", &self.invalidations)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            invalidations: true,
        }
    }

    /// Whether to print one line per invalidation rectangle. On by default.
    #[must_use]
    pub fn with_invalidations(mut self, enabled: bool) -> Self {
        self.invalidations = enabled;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(self.writer, "[phase:begin] frame={} {}", e.frame_index, e.phase.name());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} items={}",
            e.frame_index,
            e.phase.name(),
            e.items,
        );
    }

    fn on_surface_created(&mut self, e: &SurfaceEvent) {
        let _ = writeln!(
            self.writer,
            "[surface:+] frame={} layer={} {} #{}",
            e.frame_index,
            e.layer_index,
            e.role.name(),
            e.handle.0,
        );
    }

    fn on_surface_destroyed(&mut self, e: &SurfaceEvent) {
        let _ = writeln!(
            self.writer,
            "[surface:-] frame={} layer={} {} #{}",
            e.frame_index,
            e.layer_index,
            e.role.name(),
            e.handle.0,
        );
    }

    fn on_allocation_failed(&mut self, e: &AllocationFailedEvent) {
        let _ = writeln!(
            self.writer,
            "[degraded] frame={} layer={} {}: {} (squashed dropped={})",
            e.frame_index,
            e.layer_index,
            e.role.name(),
            e.error,
            e.squashed_dropped,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} layers={} composited={} squashed={} surfaces={} \
             configured={} measured={} visited={} invalidations={} repaints={} degraded={}",
            s.frame_index,
            s.layers,
            s.composited_layers,
            s.squashed_layers,
            s.surfaces,
            s.configured,
            s.measured,
            s.visited,
            s.invalidations,
            s.repaints,
            s.degraded,
        );
    }

    fn on_squashed_repaint(&mut self, e: &SquashedRepaintEvent) {
        let _ = writeln!(
            self.writer,
            "[squash:repaint] frame={} layer={} ({}, {}) -> ({}, {})",
            e.frame_index,
            e.layer_index,
            e.old_offset.x,
            e.old_offset.y,
            e.new_offset.x,
            e.new_offset.y,
        );
    }

    fn on_invalidation(&mut self, e: &InvalidationEvent) {
        if !self.invalidations {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[invalidate] frame={} box={} -> layer={} {} [{} {} {} {}] {:?}",
            e.frame_index,
            e.box_index,
            e.container_layer,
            e.role.name(),
            e.rect.x0,
            e.rect.y0,
            e.rect.x1,
            e.rect.y1,
            e.reason,
        );
    }
}
