// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Providers let the port engine run against different kernel device
//! implementations. In production that is the Linux TUN/TAP driver
//! ([`crate::os::tun::LinuxTun`]); in tests it is an in-memory double
//! that lets every descriptor outcome be scripted.
use crate::Result;
use linux_sys_hdrs::TunFlags;
use std::io;
use tap_api::MacAddr;

/// One open queue descriptor of a TAP interface.
///
/// Every method must return immediately. A read or write that cannot
/// make progress returns `ErrorKind::WouldBlock`.
pub trait TapQueue: Send {
    /// Read a single frame into `buf`.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf` as a single frame.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Is there room to write a frame right now?
    fn poll_writable(&self) -> io::Result<bool>;

    fn hw_addr(&self) -> io::Result<MacAddr>;

    fn set_hw_addr(&self, mac: MacAddr) -> io::Result<()>;

    fn if_index(&self) -> io::Result<u32>;
}

/// A source of TAP queue descriptors.
pub trait TapProvider: Send + Sync {
    type Queue: TapQueue;

    /// The feature flags the kernel reports for TUN/TAP devices.
    fn features(&self) -> Result<TunFlags>;

    /// Open a new queue descriptor on the interface `requested_name`,
    /// creating the interface if it does not exist.
    ///
    /// The framing is negotiated for a port of `nb_queues` queues with
    /// [`crate::engine::alloc::negotiate_flags()`]. Return the queue
    /// along with the interface name the kernel settled on. Every
    /// failure is [`crate::Error::DeviceUnavailable`].
    fn open(
        &self,
        requested_name: Option<&str>,
        nb_queues: u16,
    ) -> Result<(Self::Queue, String)>;
}
