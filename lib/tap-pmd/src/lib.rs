// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A poll mode network port backed by a Linux TAP interface.
//!
//! A [`driver::TapDriver`] creates [`engine::port::Port`]s. Each port
//! owns up to 16 queue pairs, each an independent descriptor on the
//! same TAP interface, and is driven through the
//! [`ethdev::EthDevOps`] operation table: configure, set up queues,
//! start, then receive and transmit in non-blocking bursts.
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

// This is needed so that the stat-macro (`#[derive(StatProvider)]`)
// can use fully-qualified type paths.
extern crate self as tap_pmd;

pub use tap_api as api;

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod ethdev;
pub mod mbuf;
pub mod os;
pub mod print;
pub mod provider;
pub mod stat;

pub use error::Error;
pub use error::Result;
