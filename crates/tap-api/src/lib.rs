// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types shared between the TAP port driver and its consumers.
#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

use serde::Deserialize;
use serde::Serialize;

pub mod link;
pub mod mac;
pub mod stat;

pub use link::*;
pub use mac::*;
pub use stat::*;

/// The maximum number of queue pairs a single port may carry.
pub const MAX_QUEUES: u16 = 16;

pub const ETHER_ADDR_LEN: usize = 6;
pub const ETHER_HDR_LEN: usize = 14;
pub const ETHER_CRC_LEN: usize = 4;
pub const ETHER_VLAN_LEN: usize = 4;
pub const ETHER_MTU: usize = 1500;

/// The largest untagged frame, header included, FCS excluded.
pub const ETH_FRAME_LEN: usize = ETHER_HDR_LEN + ETHER_MTU;

/// The largest VLAN tagged frame, FCS included.
pub const ETHER_MAX_VLAN_FRAME_LEN: usize =
    ETH_FRAME_LEN + ETHER_VLAN_LEN + ETHER_CRC_LEN;

/// The room a receive buffer needs to hold any frame the kernel can
/// hand us: a VLAN tagged frame without its FCS.
pub const RX_MIN_BUF_ROOM: usize = ETHER_MAX_VLAN_FRAME_LEN - ETHER_CRC_LEN;

/// Static capabilities of a port, as reported to the framework.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DevInfo {
    pub if_index: u32,
    pub max_mac_addrs: u32,
    pub max_rx_pktlen: u32,
    pub max_rx_queues: u16,
    pub max_tx_queues: u16,
    pub min_rx_bufsize: u32,
}
