// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use kurbo::{Rect, Vec2};
use lamina_core::compositing::{SurfaceError, SurfaceHandle, SurfaceRole};
use lamina_core::invalidation::InvalidationReason;
use lamina_core::trace::{
    AllocationFailedEvent, FrameSummary, InvalidationEvent, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, SquashedRepaintEvent, SurfaceEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE_BEGIN: u8 = 1;
const TAG_PHASE_END: u8 = 2;
const TAG_SURFACE_CREATED: u8 = 3;
const TAG_SURFACE_DESTROYED: u8 = 4;
const TAG_ALLOCATION_FAILED: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_SQUASHED_REPAINT: u8 = 7;
const TAG_INVALIDATION: u8 = 8;

const REASONS: [InvalidationReason; 5] = [
    InvalidationReason::Full,
    InvalidationReason::Location,
    InvalidationReason::Incremental,
    InvalidationReason::Subtree,
    InvalidationReason::Delayed,
];

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_vec2(&mut self, v: Vec2) {
        self.write_f64(v.x);
        self.write_f64(v.y);
    }

    fn write_rect(&mut self, r: Rect) {
        for v in [r.x0, r.y0, r.x1, r.y1] {
            self.write_f64(v);
        }
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(p as u8);
    }

    fn write_role(&mut self, r: SurfaceRole) {
        self.write_u8(r as u8);
    }

    fn write_surface_event(&mut self, tag: u8, e: &SurfaceEvent) {
        self.write_u8(tag);
        self.write_u64(e.frame_index);
        self.write_u32(e.layer_index);
        self.write_role(e.role);
        self.write_u32(e.handle.0);
    }
}

impl TraceSink for RecorderSink {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u32(e.items);
    }

    fn on_surface_created(&mut self, e: &SurfaceEvent) {
        self.write_surface_event(TAG_SURFACE_CREATED, e);
    }

    fn on_surface_destroyed(&mut self, e: &SurfaceEvent) {
        self.write_surface_event(TAG_SURFACE_DESTROYED, e);
    }

    fn on_allocation_failed(&mut self, e: &AllocationFailedEvent) {
        self.write_u8(TAG_ALLOCATION_FAILED);
        self.write_u64(e.frame_index);
        self.write_u32(e.layer_index);
        self.write_role(e.role);
        match e.error {
            SurfaceError::BudgetExhausted { budget } => {
                self.write_u8(0);
                self.write_u64(budget as u64);
            }
            SurfaceError::Refused { role } => {
                self.write_u8(1);
                self.write_u64(role as u64);
            }
        }
        self.write_u32(e.squashed_dropped);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        for v in [
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
        ] {
            self.write_u32(v);
        }
    }

    fn on_squashed_repaint(&mut self, e: &SquashedRepaintEvent) {
        self.write_u8(TAG_SQUASHED_REPAINT);
        self.write_u64(e.frame_index);
        self.write_u32(e.layer_index);
        self.write_vec2(e.old_offset);
        self.write_vec2(e.new_offset);
    }

    fn on_invalidation(&mut self, e: &InvalidationEvent) {
        self.write_u8(TAG_INVALIDATION);
        self.write_u64(e.frame_index);
        self.write_u32(e.box_index);
        self.write_u32(e.container_layer);
        self.write_role(e.role);
        self.write_rect(e.rect);
        self.write_u8(e.reason as u8);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A surface-created [`SurfaceEvent`].
    SurfaceCreated(SurfaceEvent),
    /// A surface-destroyed [`SurfaceEvent`].
    SurfaceDestroyed(SurfaceEvent),
    /// An [`AllocationFailedEvent`].
    AllocationFailed(AllocationFailedEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// A [`SquashedRepaintEvent`].
    SquashedRepaint(SquashedRepaintEvent),
    /// An [`InvalidationEvent`].
    Invalidation(InvalidationEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_vec2(&mut self) -> Option<Vec2> {
        Some(Vec2::new(self.read_f64()?, self.read_f64()?))
    }

    fn read_rect(&mut self) -> Option<Rect> {
        Some(Rect::new(
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
        ))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        PhaseKind::ALL.get(usize::from(self.read_u8()?)).copied()
    }

    fn read_role(&mut self) -> Option<SurfaceRole> {
        SurfaceRole::ALL.get(usize::from(self.read_u8()?)).copied()
    }

    fn read_surface_event(&mut self) -> Option<SurfaceEvent> {
        Some(SurfaceEvent {
            frame_index: self.read_u64()?,
            layer_index: self.read_u32()?,
            role: self.read_role()?,
            handle: SurfaceHandle(self.read_u32()?),
        })
    }

    fn decode_allocation_failed(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let layer_index = self.read_u32()?;
        let role = self.read_role()?;
        let kind = self.read_u8()?;
        let payload = self.read_u64()?;
        let error = match kind {
            0 => SurfaceError::BudgetExhausted {
                budget: usize::try_from(payload).ok()?,
            },
            _ => SurfaceError::Refused {
                role: *SurfaceRole::ALL.get(usize::try_from(payload).ok()?)?,
            },
        };
        Some(RecordedEvent::AllocationFailed(AllocationFailedEvent {
            frame_index,
            layer_index,
            role,
            error,
            squashed_dropped: self.read_u32()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            layers: self.read_u32()?,
            composited_layers: self.read_u32()?,
            squashed_layers: self.read_u32()?,
            surfaces: self.read_u32()?,
            configured: self.read_u32()?,
            measured: self.read_u32()?,
            visited: self.read_u32()?,
            invalidations: self.read_u32()?,
            repaints: self.read_u32()?,
            degraded: self.read_u32()?,
        }))
    }

    fn decode_invalidation(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Invalidation(InvalidationEvent {
            frame_index: self.read_u64()?,
            box_index: self.read_u32()?,
            container_layer: self.read_u32()?,
            role: self.read_role()?,
            rect: self.read_rect()?,
            reason: *REASONS.get(usize::from(self.read_u8()?))?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_PHASE_BEGIN => Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
                frame_index: self.read_u64()?,
                phase: self.read_phase()?,
            })),
            TAG_PHASE_END => Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
                frame_index: self.read_u64()?,
                phase: self.read_phase()?,
                items: self.read_u32()?,
            })),
            TAG_SURFACE_CREATED => self.read_surface_event().map(RecordedEvent::SurfaceCreated),
            TAG_SURFACE_DESTROYED => self.read_surface_event().map(RecordedEvent::SurfaceDestroyed),
            TAG_ALLOCATION_FAILED => self.decode_allocation_failed(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_SQUASHED_REPAINT => Some(RecordedEvent::SquashedRepaint(SquashedRepaintEvent {
                frame_index: self.read_u64()?,
                layer_index: self.read_u32()?,
                old_offset: self.read_vec2()?,
                new_offset: self.read_vec2()?,
            })),
            TAG_INVALIDATION => self.decode_invalidation(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Size};
    use lamina_core::box_tree::{BoxGeometry, BoxStyle, LayoutBox, PositionScheme};
    use lamina_core::compositing::{
        CompositingReasons, CompositorSettings, PrecomputedAssignment,
    };
    use lamina_core::document::Document;
    use lamina_core::trace::Tracer;

    #[test]
    fn allocation_failures_keep_their_error() {
        let mut rec = RecorderSink::new();
        rec.on_allocation_failed(&AllocationFailedEvent {
            frame_index: 2,
            layer_index: 5,
            role: SurfaceRole::Squashing,
            error: SurfaceError::BudgetExhausted { budget: 8 },
            squashed_dropped: 3,
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1, "one event recorded");
        match &events[0] {
            RecordedEvent::AllocationFailed(e) => {
                assert_eq!(e.role, SurfaceRole::Squashing, "role survives");
                assert_eq!(e.error, SurfaceError::BudgetExhausted { budget: 8 }, "error survives");
                assert_eq!(e.squashed_dropped, 3, "dropped count survives");
            }
            other => panic!("expected AllocationFailed, got {other:?}"),
        }
    }

    #[test]
    fn truncated_recordings_stop_cleanly() {
        let mut rec = RecorderSink::new();
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 1,
            phase: PhaseKind::Configure,
            items: 2,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 1,
            phase: PhaseKind::Measure,
            items: 2,
        });
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1, "the partial record is dropped");
    }

    #[test]
    fn records_a_whole_frame() {
        let mut d = Document::new(Size::new(200.0, 200.0), CompositorSettings::new());
        let view = d.boxes().root();
        let b = d.append_box(
            view,
            LayoutBox::block()
                .with_style(BoxStyle {
                    position: PositionScheme::Relative(Vec2::ZERO),
                    ..BoxStyle::default()
                })
                .with_geometry(BoxGeometry::new(Point::new(10.0, 10.0), Size::new(20.0, 20.0))),
        );
        let mut table = PrecomputedAssignment::new().promote(b, CompositingReasons::WILL_CHANGE);
        let mut rec = RecorderSink::new();
        d.update_lifecycle_traced(&mut table, &mut Tracer::new(&mut rec));

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        let created = events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::SurfaceCreated(_)))
            .count();
        assert!(created >= 2, "root and promoted primaries were created, got {created}");
        assert!(
            events.iter().any(|e| matches!(e, RecordedEvent::Invalidation(_))),
            "invalidations were recorded"
        );
        match events.last() {
            Some(RecordedEvent::FrameSummary(s)) => {
                assert_eq!(s.frame_index, 1, "first frame");
                assert_eq!(s.composited_layers, 2, "root and promoted box");
            }
            other => panic!("expected FrameSummary last, got {other:?}"),
        }
    }
}
