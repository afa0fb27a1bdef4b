// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explicit lazily-recomputed values.

/// A value that is either known or must be recomputed before use.
///
/// Readers never recompute on access. Invalidation is an explicit call at the
/// mutation site, and recomputation happens in a dedicated update pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Cached<T> {
    /// The value must be recomputed.
    #[default]
    Stale,
    /// The value is current.
    Computed(T),
}

impl<T> Cached<T> {
    /// Returns the value if it is current.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Stale => None,
            Self::Computed(v) => Some(v),
        }
    }

    /// Whether the value must be recomputed.
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    /// Marks the value stale. Returns `true` if it was current.
    #[inline]
    pub fn invalidate(&mut self) -> bool {
        !core::mem::replace(self, Self::Stale).is_stale()
    }

    /// Stores a freshly computed value.
    #[inline]
    pub fn set(&mut self, value: T) {
        *self = Self::Computed(value);
    }
}

impl<T: Copy> Cached<T> {
    /// Returns the current value.
    ///
    /// # Panics
    ///
    /// Panics if the value is stale; `what` names it in the message.
    #[inline]
    #[track_caller]
    pub fn expect_current(&self, what: &str) -> T {
        match self {
            Self::Computed(v) => *v,
            Self::Stale => panic!("{what} is stale; run the update pass first"),
        }
    }
}
