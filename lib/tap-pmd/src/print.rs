// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print port state in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both tapadm and integration tests.

use crate::engine::port::PortInfo;
use std::io::Write;
use tabwriter::TabWriter;
use tap_api::DevInfo;
use tap_api::PortStats;

/// Print a [`PortInfo`].
pub fn print_port_info(info: &PortInfo) -> std::io::Result<()> {
    print_port_info_into(&mut std::io::stdout(), info)
}

/// Print a [`PortInfo`].
pub fn print_port_info_into(
    writer: &mut impl Write,
    info: &PortInfo,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Port {}", info.name)?;
    write_hrb(&mut t)?;
    writeln!(t, "INTERFACE\t{}", info.iface)?;
    writeln!(t, "PORT ID\t{}", info.port_id)?;
    writeln!(t, "NUMA NODE\t{}", info.numa_node)?;
    writeln!(t, "IF INDEX\t{}", info.if_index)?;
    writeln!(t, "MAC\t{}", info.mac)?;
    writeln!(t, "STATE\t{}", info.state)?;
    writeln!(t, "LINK\t{}", info.link)?;
    writeln!(t, "QUEUES\t{} ({} open)", info.nb_queues, info.open_queues)?;
    t.flush()
}

/// Print a [`DevInfo`].
pub fn print_dev_info(info: &DevInfo) -> std::io::Result<()> {
    print_dev_info_into(&mut std::io::stdout(), info)
}

/// Print a [`DevInfo`].
pub fn print_dev_info_into(
    writer: &mut impl Write,
    info: &DevInfo,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Device Info")?;
    write_hr(&mut t)?;
    writeln!(t, "MAX MAC ADDRS\t{}", info.max_mac_addrs)?;
    writeln!(t, "MAX RX PKTLEN\t{}", info.max_rx_pktlen)?;
    writeln!(t, "MAX RX QUEUES\t{}", info.max_rx_queues)?;
    writeln!(t, "MAX TX QUEUES\t{}", info.max_tx_queues)?;
    writeln!(t, "MIN RX BUFSIZE\t{}", info.min_rx_bufsize)?;
    t.flush()
}

/// Print a [`PortStats`].
pub fn print_stats(stats: &PortStats) -> std::io::Result<()> {
    print_stats_into(&mut std::io::stdout(), stats)
}

/// Print a [`PortStats`], one row per queue followed by the totals.
pub fn print_stats_into(
    writer: &mut impl Write,
    stats: &PortStats,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Statistics")?;
    write_hr(&mut t)?;
    writeln!(t, "QUEUE\tIPACKETS\tIBYTES\tOPACKETS\tOBYTES\tERRORS")?;
    for i in 0..stats.q_ipackets.len() {
        writeln!(
            t,
            "{i}\t{}\t{}\t{}\t{}\t{}",
            stats.q_ipackets[i],
            stats.q_ibytes[i],
            stats.q_opackets[i],
            stats.q_obytes[i],
            stats.q_errors[i],
        )?;
    }
    writeln!(
        t,
        "TOTAL\t{}\t{}\t{}\t{}\t{}",
        stats.ipackets, stats.ibytes, stats.opackets, stats.obytes, stats.oerrors,
    )?;
    t.flush()
}

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
