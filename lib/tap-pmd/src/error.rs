// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use crate::engine::port::PortState;
use thiserror::Error;

/// Errors returned by port creation and control operations.
///
/// The data path never returns an error: running out of buffers, or
/// a descriptor that would block, simply ends a burst early.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// A request was rejected before any side effect took place.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lifecycle operation was called in the wrong state.
    #[error("operation not valid in state {0}")]
    BadState(PortState),

    /// The kernel device could not be opened or configured.
    #[error("TAP device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("out of resources: {0}")]
    OutOfResources(String),
}

pub type Result<T> = core::result::Result<T, Error>;
