// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document lifecycle state machine.
//!
//! The pipeline runs style → layout → compositing → paint invalidation →
//! paint, strictly in order. [`DocumentLifecycle`] records where the document
//! is and rejects illegal transitions with a panic; they are programmer
//! errors, never runtime conditions.
//!
//! Compositing state (which layers own surfaces, which are squashed) is only
//! meaningful once the compositing update has started. Queries for it take a
//! [`CompositingQuery`] token, which can only be obtained from the lifecycle
//! in a legal state or from the explicit [`CompositingQuery::known_safe`]
//! escape hatch.

use core::fmt;
use core::marker::PhantomData;

use crate::layer::PaintLayerId;

/// Where a document is in its update pipeline.
///
/// Variants are declared in pipeline order; comparisons follow that order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Not yet set up.
    Uninitialized,
    /// Set up, nothing scheduled.
    Inactive,
    /// Something changed; a full update is needed.
    VisualUpdatePending,
    /// Style recalculation is running.
    InStyleRecalc,
    /// Style is up to date.
    StyleClean,
    /// Layout is running.
    InPerformLayout,
    /// Layout finished; post-layout fixups may rerun layout.
    AfterPerformLayout,
    /// Layout is up to date.
    LayoutClean,
    /// Layer configuration and geometry are running.
    InCompositingUpdate,
    /// Compositing state is up to date.
    CompositingClean,
    /// The paint invalidation walk is running.
    InPaintInvalidation,
    /// Invalidations are issued.
    PaintInvalidationClean,
    /// Painting is running.
    InPaint,
    /// Everything is up to date.
    PaintClean,
    /// Teardown has started.
    Stopping,
    /// Torn down.
    Stopped,
}

impl LifecycleState {
    /// Whether this is an `In*` state, during which the document must not be
    /// rewound.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::InStyleRecalc
                | Self::InPerformLayout
                | Self::AfterPerformLayout
                | Self::InCompositingUpdate
                | Self::InPaintInvalidation
                | Self::InPaint
        )
    }

    /// The state that follows a finished `In*` state.
    const fn clean_state(self) -> Option<Self> {
        match self {
            Self::InStyleRecalc => Some(Self::StyleClean),
            Self::AfterPerformLayout => Some(Self::LayoutClean),
            Self::InCompositingUpdate => Some(Self::CompositingClean),
            Self::InPaintInvalidation => Some(Self::PaintInvalidationClean),
            Self::InPaint => Some(Self::PaintClean),
            _ => None,
        }
    }
}

/// A deferred one-shot task that re-enters the pipeline later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeferredTask {
    /// Finish repositioning scrollbars and the scroll corner after a scroll.
    RepositionOverflowControls(PaintLayerId),
    /// Invalidate everything a layer's surfaces show.
    InvalidateLayer(PaintLayerId),
}

/// The lifecycle state machine of one document.
#[derive(Clone, Debug)]
pub struct DocumentLifecycle {
    state: LifecycleState,
    in_layout: bool,
}

impl Default for DocumentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLifecycle {
    /// Creates a lifecycle in [`LifecycleState::Uninitialized`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            in_layout: false,
        }
    }

    /// The current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the document is at or past `state` (and not tearing down).
    #[must_use]
    pub fn is_at_least(&self, state: LifecycleState) -> bool {
        self.state >= state && self.state < LifecycleState::Stopping
    }

    /// Whether moving to `next` is legal from the current state.
    #[must_use]
    pub fn can_advance_to(&self, next: LifecycleState) -> bool {
        use LifecycleState as S;
        let cur = self.state;
        if cur == S::Stopped {
            return false;
        }
        if next == S::Stopping {
            return cur != S::Stopping;
        }
        if next == S::Stopped {
            return cur == S::Stopping;
        }
        if cur == S::Stopping {
            return false;
        }
        if let Some(clean) = cur.clean_state() {
            return next == clean
                || (cur == S::AfterPerformLayout && next == S::InPerformLayout);
        }
        match cur {
            S::Uninitialized => next == S::Inactive,
            S::InPerformLayout => next == S::AfterPerformLayout,
            // From a pending or clean state, start any later phase. Phases
            // may be skipped when there is nothing to do for them.
            _ => match next {
                S::VisualUpdatePending => cur == S::Inactive,
                S::InStyleRecalc
                | S::InPerformLayout
                | S::InCompositingUpdate
                | S::InPaintInvalidation
                | S::InPaint => next > cur && Self::prerequisites_met(cur, next),
                _ => false,
            },
        }
    }

    fn prerequisites_met(cur: LifecycleState, next: LifecycleState) -> bool {
        use LifecycleState as S;
        match next {
            S::InStyleRecalc => true,
            S::InPerformLayout => cur >= S::StyleClean || cur == S::VisualUpdatePending,
            S::InCompositingUpdate => cur >= S::LayoutClean,
            S::InPaintInvalidation => cur >= S::CompositingClean,
            S::InPaint => cur >= S::PaintInvalidationClean,
            _ => false,
        }
    }

    /// Moves to `next`.
    ///
    /// # Panics
    ///
    /// Panics on an illegal transition.
    #[track_caller]
    pub fn advance_to(&mut self, next: LifecycleState) {
        assert!(
            self.can_advance_to(next),
            "illegal lifecycle transition from {:?} to {next:?}",
            self.state
        );
        self.state = next;
    }

    /// Finishes the current `In*` state, moving to its clean state.
    ///
    /// # Panics
    ///
    /// Panics if the current state is not an `In*` state.
    #[track_caller]
    pub fn finish_phase(&mut self) {
        let Some(clean) = self.state.clean_state() else {
            panic!("no phase in progress (state is {:?})", self.state);
        };
        self.state = clean;
    }

    /// Rewinds to at most `state`. Called when a mutation invalidates work
    /// done by later phases.
    ///
    /// # Panics
    ///
    /// Panics if a phase is in progress or the document is stopping.
    #[track_caller]
    pub fn ensure_state_at_most(&mut self, state: LifecycleState) {
        assert!(
            !self.state.is_in_progress(),
            "cannot rewind to {state:?} while {:?} is in progress",
            self.state
        );
        assert!(
            self.state < LifecycleState::Stopping,
            "cannot rewind a stopping document"
        );
        if self.state > state {
            self.state = state;
        }
    }

    /// Enters layout.
    ///
    /// # Panics
    ///
    /// Panics if layout is already running.
    #[track_caller]
    pub fn enter_layout(&mut self) {
        assert!(!self.in_layout, "re-entrant layout");
        self.advance_to(LifecycleState::InPerformLayout);
        self.in_layout = true;
    }

    /// Leaves layout, moving to [`LifecycleState::AfterPerformLayout`].
    ///
    /// # Panics
    ///
    /// Panics if layout is not running.
    #[track_caller]
    pub fn exit_layout(&mut self) {
        assert!(self.in_layout, "exit_layout without enter_layout");
        self.in_layout = false;
        self.advance_to(LifecycleState::AfterPerformLayout);
    }

    /// Whether layout is running.
    #[inline]
    #[must_use]
    pub fn is_in_layout(&self) -> bool {
        self.in_layout
    }

    /// Asserts that layout is not running. Deferred tasks check this before
    /// re-entering the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if layout is running.
    #[track_caller]
    pub fn assert_not_in_layout(&self) {
        assert!(!self.in_layout, "re-entrant layout");
    }

    /// Returns a token permitting compositing-state queries.
    ///
    /// # Panics
    ///
    /// Panics unless the compositing update has started and the document is
    /// not tearing down.
    #[track_caller]
    pub fn compositing_query(&self) -> CompositingQuery<'_> {
        assert!(
            self.is_at_least(LifecycleState::InCompositingUpdate),
            "compositing state queried during {:?}",
            self.state
        );
        CompositingQuery {
            _lifecycle: PhantomData,
        }
    }
}

/// Permission to read compositing state.
///
/// Obtained from [`DocumentLifecycle::compositing_query`], which checks that
/// the document is in a phase where compositing state is well-defined.
#[derive(Clone, Copy)]
pub struct CompositingQuery<'a> {
    _lifecycle: PhantomData<&'a DocumentLifecycle>,
}

impl CompositingQuery<'static> {
    /// A token for callers that know compositing state is stable without
    /// consulting the lifecycle, such as teardown of a layer whose mapping
    /// is being released or diagnostics run after a completed frame.
    #[must_use]
    pub const fn known_safe() -> Self {
        Self {
            _lifecycle: PhantomData,
        }
    }
}

impl fmt::Debug for CompositingQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompositingQuery")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState as S;

    fn at(state: S) -> DocumentLifecycle {
        DocumentLifecycle {
            state,
            in_layout: false,
        }
    }

    #[test]
    fn full_pipeline_in_order() {
        let mut lc = DocumentLifecycle::new();
        lc.advance_to(S::Inactive);
        lc.advance_to(S::VisualUpdatePending);
        lc.advance_to(S::InStyleRecalc);
        lc.finish_phase();
        lc.enter_layout();
        lc.exit_layout();
        lc.finish_phase();
        assert_eq!(lc.state(), S::LayoutClean);
        lc.advance_to(S::InCompositingUpdate);
        lc.finish_phase();
        lc.advance_to(S::InPaintInvalidation);
        lc.finish_phase();
        lc.advance_to(S::InPaint);
        lc.finish_phase();
        assert_eq!(lc.state(), S::PaintClean);
    }

    #[test]
    #[should_panic(expected = "illegal lifecycle transition")]
    fn cannot_skip_layout_into_compositing() {
        let mut lc = at(S::StyleClean);
        lc.advance_to(S::InCompositingUpdate);
    }

    #[test]
    #[should_panic(expected = "re-entrant layout")]
    fn nested_layout_panics() {
        let mut lc = at(S::StyleClean);
        lc.enter_layout();
        lc.enter_layout();
    }

    #[test]
    fn rewind_only_moves_backwards() {
        let mut lc = at(S::PaintClean);
        lc.ensure_state_at_most(S::VisualUpdatePending);
        assert_eq!(lc.state(), S::VisualUpdatePending);
        lc.ensure_state_at_most(S::PaintClean);
        assert_eq!(lc.state(), S::VisualUpdatePending, "never moves forward");
    }

    #[test]
    #[should_panic(expected = "while InCompositingUpdate is in progress")]
    fn rewind_during_phase_panics() {
        let mut lc = at(S::InCompositingUpdate);
        lc.ensure_state_at_most(S::VisualUpdatePending);
    }

    #[test]
    fn compositing_query_allowed_after_update_starts() {
        let lc = at(S::InCompositingUpdate);
        let _ = lc.compositing_query();
        let lc = at(S::PaintClean);
        let _ = lc.compositing_query();
    }

    #[test]
    #[should_panic(expected = "compositing state queried during LayoutClean")]
    fn compositing_query_before_update_panics() {
        let lc = at(S::LayoutClean);
        let _ = lc.compositing_query();
    }

    #[test]
    #[should_panic(expected = "compositing state queried during Stopping")]
    fn compositing_query_while_stopping_panics() {
        let lc = at(S::Stopping);
        let _ = lc.compositing_query();
    }

    #[test]
    fn relayout_after_perform_layout_is_legal() {
        let mut lc = at(S::AfterPerformLayout);
        assert!(lc.can_advance_to(S::InPerformLayout));
        lc.advance_to(S::InPerformLayout);
    }

    #[test]
    fn stop_from_anywhere_but_stopped() {
        let mut lc = at(S::CompositingClean);
        lc.advance_to(S::Stopping);
        lc.advance_to(S::Stopped);
        assert!(!lc.can_advance_to(S::Stopping));
    }
}
