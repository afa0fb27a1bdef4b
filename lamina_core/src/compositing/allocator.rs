// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backing-surface allocation.

use core::fmt;

use super::surface::SurfaceRole;

/// An opaque handle to a backing surface issued by a [`SurfaceAllocator`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u32);

impl fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceHandle({})", self.0)
    }
}

/// Why a backing surface could not be created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The allocator's surface budget is spent.
    #[error("surface budget of {budget} exhausted")]
    BudgetExhausted {
        /// The configured budget.
        budget: usize,
    },
    /// The platform refused the allocation.
    #[error("platform refused a {role:?} surface")]
    Refused {
        /// The surface that was requested.
        role: SurfaceRole,
    },
}

/// Creates and releases backing surfaces.
///
/// The compositing update never propagates allocation errors; a layer whose
/// surface cannot be allocated degrades to not composited.
pub trait SurfaceAllocator {
    /// Allocates a surface for `role`.
    ///
    /// # Errors
    ///
    /// Returns a [`SurfaceError`] when no surface can be created.
    fn allocate(&mut self, role: SurfaceRole) -> Result<SurfaceHandle, SurfaceError>;

    /// Returns a surface to the allocator.
    fn release(&mut self, handle: SurfaceHandle);

    /// Number of live surfaces.
    fn live(&self) -> usize;
}

/// The default allocator: sequential handles, optionally capped by a budget.
#[derive(Clone, Debug, Default)]
pub struct SurfacePool {
    budget: Option<usize>,
    next: u32,
    live: usize,
}

impl SurfacePool {
    /// Creates a pool. `None` means unlimited.
    #[must_use]
    pub const fn new(budget: Option<usize>) -> Self {
        Self {
            budget,
            next: 0,
            live: 0,
        }
    }

    /// Changes the budget. Live surfaces above a lowered budget stay alive.
    pub fn set_budget(&mut self, budget: Option<usize>) {
        self.budget = budget;
    }
}

impl SurfaceAllocator for SurfacePool {
    fn allocate(&mut self, role: SurfaceRole) -> Result<SurfaceHandle, SurfaceError> {
        _ = role;
        if let Some(budget) = self.budget
            && self.live >= budget
        {
            return Err(SurfaceError::BudgetExhausted { budget });
        }
        self.live += 1;
        self.next = self.next.wrapping_add(1);
        Ok(SurfaceHandle(self.next))
    }

    fn release(&mut self, handle: SurfaceHandle) {
        _ = handle;
        self.live = self.live.saturating_sub(1);
    }

    fn live(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_enforces_budget() {
        let mut pool = SurfacePool::new(Some(2));
        let a = pool.allocate(SurfaceRole::Primary).unwrap();
        let _b = pool.allocate(SurfaceRole::ChildClip).unwrap();
        assert_eq!(
            pool.allocate(SurfaceRole::Mask),
            Err(SurfaceError::BudgetExhausted { budget: 2 })
        );
        pool.release(a);
        assert!(pool.allocate(SurfaceRole::Mask).is_ok(), "released slot is reusable");
        assert_eq!(pool.live(), 2);
    }

    #[test]
    fn handles_are_distinct() {
        let mut pool = SurfacePool::new(None);
        let a = pool.allocate(SurfaceRole::Primary).unwrap();
        let b = pool.allocate(SurfaceRole::Primary).unwrap();
        assert_ne!(a, b);
    }
}
