// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What a paint backend needs from [`lamina_core`] after a frame.
//!
//! - [`SurfacePlan`]: every backing surface of the frame, back to front,
//!   with its position, size and attachment.
//! - [`DamageRegion`]: the part of one surface that needs repainting,
//!   collected for the whole tree by [`collect_damage`].

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod damage;
mod plan;

pub use damage::{DamageRegion, SurfaceDamage, collect_damage};
pub use plan::{PlanItem, SurfacePlan};
