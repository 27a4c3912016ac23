// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// 10 Gb/s, expressed in Mb/s.
pub const ETH_SPEED_NUM_10G: u32 = 10_000;

/// The speed advertised when none is configured.
pub const DEFAULT_SPEED: u32 = ETH_SPEED_NUM_10G;

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum LinkState {
    #[default]
    Down,
    Up,
}

impl Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Down => "DOWN",
            Self::Up => "UP",
        };
        write!(f, "{s}")
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum LinkDuplex {
    Half,
    #[default]
    Full,
}

impl Display for LinkDuplex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Half => "half",
            Self::Full => "full",
        };
        write!(f, "{s}")
    }
}

/// The link as reported to the framework.
///
/// A TAP device has no physical medium, so everything but `state` is
/// fixed when the port is created.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LinkStatus {
    /// Speed in Mb/s.
    pub speed: u32,
    pub duplex: LinkDuplex,
    pub autoneg: bool,
    pub state: LinkState,
}

impl LinkStatus {
    pub fn new(speed: u32) -> Self {
        Self {
            speed,
            duplex: LinkDuplex::Full,
            autoneg: false,
            state: LinkState::Down,
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up
    }
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

impl Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} Mb/s {}-duplex{}",
            self.state,
            self.speed,
            self.duplex,
            if self.autoneg { " autoneg" } else { "" }
        )
    }
}
