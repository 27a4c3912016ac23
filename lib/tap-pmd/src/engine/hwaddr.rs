// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Hardware address assignment.
//!
//! Each port carries two addresses. The host side of the TAP
//! interface is given one derived from "Tap-"; the application is
//! handed one derived from "dnet". Both embed the port id and NUMA
//! node, and both have the locally administered bit set.
use crate::Error;
use crate::Result;
use crate::provider::TapQueue;
use tap_api::MacAddr;

/// The address written to the kernel side of the interface.
///
/// Only the low byte of `port_id` fits in the address, so ports 256
/// apart share the same address.
pub fn host_mac(port_id: u16, numa_node: u8) -> MacAddr {
    MacAddr::from([b'T' | 0x02, b'a', b'p', b'-', port_id as u8, numa_node])
}

/// The address reported to the application.
///
/// Like [`host_mac()`], this keeps only the low byte of `port_id`.
pub fn app_mac(port_id: u16, numa_node: u8) -> MacAddr {
    MacAddr::from([b'd' | 0x02, b'n', b'e', b't', port_id as u8, numa_node])
}

/// Program the host side address of the interface behind `q` and
/// return the application side address.
pub fn assign_mac<Q: TapQueue>(
    q: &Q,
    port_id: u16,
    numa_node: u8,
) -> Result<MacAddr> {
    let _ = q.hw_addr().map_err(|e| {
        Error::DeviceUnavailable(format!("failed to read hardware address: {e}"))
    })?;

    q.set_hw_addr(host_mac(port_id, numa_node)).map_err(|e| {
        Error::DeviceUnavailable(format!(
            "failed to set hardware address: {e}"
        ))
    })?;

    Ok(app_mac(port_id, numa_node))
}
