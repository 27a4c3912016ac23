// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Linux TUN/TAP and network interface definitions.
//!
//! These are the pieces of `<linux/if.h>`, `<linux/if_tun.h>` and
//! `<linux/sockios.h>` needed to drive a TAP device from userland.
//! They are defined here, close to verbatim, rather than pulled from
//! `libc` so that the layouts the driver hands to `ioctl(2)` are
//! pinned down in one place.
#![allow(non_camel_case_types)]
#![no_std]

use bitflags::bitflags;

pub use core::ffi::c_char;
pub use core::ffi::c_int;
pub use core::ffi::c_short;
pub use core::ffi::c_uint;
pub use core::ffi::c_ulong;

pub type sa_family_t = u16;

// ======================================================================
// include/uapi/asm-generic/ioctl.h
// ======================================================================
//
// Most architectures use the generic encoding. The few that do not
// (powerpc, mips, sparc) use three direction bits and a 13-bit size.

#[cfg(not(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc64"
)))]
mod ioc {
    pub const IOC_SIZEBITS: u32 = 14;
    pub const IOC_NONE: u32 = 0;
    pub const IOC_WRITE: u32 = 1;
    pub const IOC_READ: u32 = 2;
}

#[cfg(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc64"
))]
mod ioc {
    pub const IOC_SIZEBITS: u32 = 13;
    pub const IOC_NONE: u32 = 1;
    pub const IOC_WRITE: u32 = 4;
    pub const IOC_READ: u32 = 2;
}

pub use ioc::IOC_NONE;
pub use ioc::IOC_READ;
pub use ioc::IOC_WRITE;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + ioc::IOC_SIZEBITS;

/// Encode an ioctl request number, `_IOC()` in the C headers.
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> c_ulong {
    ((dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as c_ulong
}

// ======================================================================
// include/uapi/linux/if_tun.h
// ======================================================================
pub const TUNSETIFF: c_ulong =
    ioc(IOC_WRITE, b'T', 202, core::mem::size_of::<c_int>());
pub const TUNGETFEATURES: c_ulong =
    ioc(IOC_READ, b'T', 207, core::mem::size_of::<c_uint>());
pub const TUNGETIFF: c_ulong =
    ioc(IOC_READ, b'T', 210, core::mem::size_of::<c_uint>());
pub const TUNSETQUEUE: c_ulong =
    ioc(IOC_WRITE, b'T', 217, core::mem::size_of::<c_int>());

bitflags! {
    /// The `ifr_flags` understood by `TUNSETIFF`, and reported back
    /// by `TUNGETFEATURES`.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct TunFlags: u16 {
        const TUN = 0x0001;
        const TAP = 0x0002;
        const NAPI = 0x0010;
        const NAPI_FRAGS = 0x0020;
        const MULTI_QUEUE = 0x0100;
        const ATTACH_QUEUE = 0x0200;
        const DETACH_QUEUE = 0x0400;
        const PERSIST = 0x0800;
        const NO_PI = 0x1000;
        // Historical; the kernel ignores it but still reports it.
        const ONE_QUEUE = 0x2000;
        const VNET_HDR = 0x4000;
        const TUN_EXCL = 0x8000;
    }
}

impl TunFlags {
    /// Interpret the `unsigned int` written by `TUNGETFEATURES`.
    pub fn from_features(features: c_uint) -> Self {
        Self::from_bits_truncate(features as u16)
    }
}

// ======================================================================
// include/uapi/linux/sockios.h
// ======================================================================
pub const SIOCGIFFLAGS: c_ulong = 0x8913;
pub const SIOCSIFFLAGS: c_ulong = 0x8914;
pub const SIOCSIFHWADDR: c_ulong = 0x8924;
pub const SIOCGIFHWADDR: c_ulong = 0x8927;
pub const SIOCGIFINDEX: c_ulong = 0x8933;

// ======================================================================
// include/uapi/linux/if_arp.h
// ======================================================================
pub const ARPHRD_ETHER: sa_family_t = 1;

// ======================================================================
// include/uapi/linux/if.h
// ======================================================================
pub const IFNAMSIZ: usize = 16;

/// The generic socket address carried by `ifr_hwaddr`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct sockaddr {
    pub sa_family: sa_family_t,
    pub sa_data: [c_char; 14],
}

/// The anonymous union in `struct ifreq`.
///
/// Only the members the TAP driver touches are named. The padding
/// member covers `struct ifmap`, the largest member on LP64.
#[repr(C)]
#[derive(Clone, Copy)]
pub union ifreq_ifru {
    pub ifru_hwaddr: sockaddr,
    pub ifru_flags: c_short,
    pub ifru_ifindex: c_int,
    _pad: [u8; 24],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ifreq {
    pub ifr_name: [c_char; IFNAMSIZ],
    pub ifr_ifru: ifreq_ifru,
}

impl Default for ifreq {
    fn default() -> Self {
        Self { ifr_name: [0; IFNAMSIZ], ifr_ifru: ifreq_ifru { _pad: [0; 24] } }
    }
}

impl ifreq {
    /// Create a zeroed request naming `name`.
    ///
    /// Return `None` if `name` does not fit in `IFNAMSIZ` with its
    /// terminating NUL, or contains a NUL.
    pub fn with_name(name: &str) -> Option<Self> {
        let mut req = Self::default();
        if !req.set_name(name) {
            return None;
        }
        Some(req)
    }

    /// Set `ifr_name`, returning `false` if `name` will not fit.
    pub fn set_name(&mut self, name: &str) -> bool {
        let bytes = name.as_bytes();
        if bytes.len() >= IFNAMSIZ || bytes.contains(&0) {
            return false;
        }

        self.ifr_name = [0; IFNAMSIZ];
        for (dst, src) in self.ifr_name.iter_mut().zip(bytes) {
            *dst = *src as c_char;
        }
        true
    }

    /// The bytes of `ifr_name` up to, not including, the first NUL.
    pub fn name_bytes(&self) -> ([u8; IFNAMSIZ], usize) {
        let mut out = [0u8; IFNAMSIZ];
        let mut len = 0;
        for (dst, src) in out.iter_mut().zip(self.ifr_name.iter()) {
            if *src == 0 {
                break;
            }
            *dst = *src as u8;
            len += 1;
        }
        (out, len)
    }

    pub fn flags(&self) -> TunFlags {
        // Safety: every member of the union is plain old data, any
        // bit pattern is a valid `c_short`.
        TunFlags::from_bits_truncate(unsafe { self.ifr_ifru.ifru_flags } as u16)
    }

    pub fn set_flags(&mut self, flags: TunFlags) {
        self.ifr_ifru.ifru_flags = flags.bits() as c_short;
    }

    pub fn ifindex(&self) -> c_int {
        // Safety: see `flags()`.
        unsafe { self.ifr_ifru.ifru_ifindex }
    }

    /// The first six bytes of `ifr_hwaddr.sa_data`.
    pub fn hwaddr(&self) -> [u8; 6] {
        // Safety: see `flags()`.
        let data = unsafe { self.ifr_ifru.ifru_hwaddr.sa_data };
        let mut mac = [0u8; 6];
        for (dst, src) in mac.iter_mut().zip(data.iter()) {
            *dst = *src as u8;
        }
        mac
    }

    /// Fill `ifr_hwaddr` with an Ethernet address.
    pub fn set_hwaddr(&mut self, mac: [u8; 6]) {
        let mut sa_data = [0 as c_char; 14];
        for (dst, src) in sa_data.iter_mut().zip(mac.iter()) {
            *dst = *src as c_char;
        }
        self.ifr_ifru.ifru_hwaddr =
            sockaddr { sa_family: ARPHRD_ETHER, sa_data };
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tun_ioctl_numbers() {
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        {
            assert_eq!(TUNSETIFF, 0x400454ca);
            assert_eq!(TUNGETFEATURES, 0x800454cf);
            assert_eq!(TUNGETIFF, 0x800454d2);
            assert_eq!(TUNSETQUEUE, 0x400454d9);
        }
    }

    #[test]
    fn ifreq_layout() {
        assert_eq!(core::mem::size_of::<sockaddr>(), 16);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(core::mem::size_of::<ifreq>(), 40);
    }

    #[test]
    fn ifreq_name() {
        let req = ifreq::with_name("dtap0").unwrap();
        let (bytes, len) = req.name_bytes();
        assert_eq!(&bytes[..len], b"dtap0");

        assert!(ifreq::with_name("a-name-that-is-too-long").is_none());
        assert!(ifreq::with_name("exactly16chars!!").is_none());
        assert!(ifreq::with_name("fifteen-chars-x").is_some());
        assert!(ifreq::with_name("nul\0").is_none());
    }

    #[test]
    fn ifreq_hwaddr() {
        let mut req = ifreq::default();
        req.set_hwaddr([0x56, 0x61, 0x70, 0x2d, 0x01, 0x00]);
        assert_eq!(req.hwaddr(), [0x56, 0x61, 0x70, 0x2d, 0x01, 0x00]);
        assert_eq!(unsafe { req.ifr_ifru.ifru_hwaddr.sa_family }, ARPHRD_ETHER);
    }

    #[test]
    fn tun_flags() {
        let mut req = ifreq::default();
        req.set_flags(TunFlags::TAP | TunFlags::NO_PI | TunFlags::MULTI_QUEUE);
        assert_eq!(
            req.flags(),
            TunFlags::TAP | TunFlags::NO_PI | TunFlags::MULTI_QUEUE
        );

        let feats = TunFlags::from_features(0x7133);
        assert!(feats.contains(TunFlags::MULTI_QUEUE));
        assert!(feats.contains(TunFlags::ONE_QUEUE));
    }
}
