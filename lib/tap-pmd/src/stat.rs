// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Counter blocks.
//!
//! A counter block is a struct of named [`StatU64`] fields. Rather
//! than implementing [`StatProvider`] by hand, derive it:
//!
//! ```
//! use tap_pmd::stat::StatProvider;
//! use tap_pmd::stat::StatU64;
//!
//! #[derive(StatProvider)]
//! pub struct LinkStats {
//!     frames: StatU64,
//!     drops: StatU64,
//! }
//!
//! let mut stats = LinkStats::new();
//! stats.frames += 3;
//! assert_eq!(stats.snapshot().frames, 3);
//! stats.reset();
//! assert_eq!(stats.snapshot(), LinkStatsSnap::default());
//! ```
pub use stat_macro::StatProvider;

/// A provider of a block of named 64-bit counters.
pub trait StatProvider {
    const NUM_FIELDS: u32;
    type Snap;

    fn new() -> Self;

    fn num_fields(&self) -> u32 {
        Self::NUM_FIELDS
    }

    /// Return a copy of the current values.
    fn snapshot(&self) -> Self::Snap;

    /// Zero every counter in the block.
    fn reset(&mut self);
}

/// A 64-bit unsigned counter.
#[derive(Debug)]
pub struct StatU64 {
    value: u64,
}

impl StatU64 {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn set(&mut self, val: u64) {
        self.value = val;
    }

    pub fn val(&self) -> u64 {
        self.value
    }
}

impl Default for StatU64 {
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::AddAssign<u64> for StatU64 {
    #[inline]
    fn add_assign(&mut self, other: u64) {
        self.value = self.value.wrapping_add(other);
    }
}

impl core::ops::SubAssign<u64> for StatU64 {
    #[inline]
    fn sub_assign(&mut self, other: u64) {
        self.value = self.value.wrapping_sub(other);
    }
}
