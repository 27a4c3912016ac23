// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The Linux TUN/TAP driver.
//!
//! Every open of the clone device, followed by `TUNSETIFF` naming
//! the same interface, attaches one more queue to that interface.
//! See `Documentation/networking/tuntap.rst` in the kernel tree.
use crate::Error;
use crate::Result;
use crate::engine::alloc::negotiate_flags;
use crate::provider::TapProvider;
use crate::provider::TapQueue;
use linux_sys_hdrs::IFNAMSIZ;
use linux_sys_hdrs::SIOCGIFHWADDR;
use linux_sys_hdrs::SIOCSIFHWADDR;
use linux_sys_hdrs::TUNGETFEATURES;
use linux_sys_hdrs::TUNSETIFF;
use linux_sys_hdrs::TunFlags;
use linux_sys_hdrs::c_uint;
use linux_sys_hdrs::ifreq;
use std::ffi::CString;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::fd::RawFd;
use std::path::Path;
use std::path::PathBuf;
use tap_api::MacAddr;

/// The TUN/TAP clone device.
pub const TUN_CTL: &str = "/dev/net/tun";

/// A provider of queues on real Linux TAP interfaces.
#[derive(Clone, Debug)]
pub struct LinuxTun {
    path: PathBuf,
}

impl Default for LinuxTun {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxTun {
    pub fn new() -> Self {
        Self::open_on(TUN_CTL)
    }

    /// Use a clone device at a path other than [`TUN_CTL`].
    pub fn open_on(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn open_ctl(&self) -> Result<File> {
        OpenOptions::new().read(true).write(true).open(&self.path).map_err(
            |e| {
                Error::DeviceUnavailable(format!(
                    "failed to open {}: {e}",
                    self.path.display()
                ))
            },
        )
    }
}

fn get_features(fd: RawFd) -> io::Result<TunFlags> {
    let mut features: c_uint = 0;
    // Safety: TUNGETFEATURES writes a single `unsigned int`.
    let ret = unsafe { libc::ioctl(fd, TUNGETFEATURES as _, &mut features) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(TunFlags::from_features(features))
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // Safety: F_GETFL/F_SETFL take and return plain integers.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn ifreq_name(req: &ifreq) -> String {
    let (bytes, len) = req.name_bytes();
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

impl TapProvider for LinuxTun {
    type Queue = TunQueue;

    fn features(&self) -> Result<TunFlags> {
        let ctl = self.open_ctl()?;
        get_features(ctl.as_raw_fd()).map_err(|e| {
            Error::DeviceUnavailable(format!("TUNGETFEATURES failed: {e}"))
        })
    }

    fn open(
        &self,
        requested_name: Option<&str>,
        nb_queues: u16,
    ) -> Result<(Self::Queue, String)> {
        let mut req = ifreq::default();
        if let Some(name) = requested_name {
            if !req.set_name(name) {
                return Err(Error::DeviceUnavailable(format!(
                    "interface name {name} must be under {IFNAMSIZ} bytes"
                )));
            }
        }

        // The control descriptor becomes the queue descriptor once
        // TUNSETIFF succeeds; on any failure it is closed on drop.
        let file = self.open_ctl()?;
        let fd = file.as_raw_fd();

        let features = get_features(fd).map_err(|e| {
            Error::DeviceUnavailable(format!("TUNGETFEATURES failed: {e}"))
        })?;
        req.set_flags(negotiate_flags(features, nb_queues)?);

        // Safety: `req` is a properly laid out `struct ifreq` that
        // outlives the call.
        let ret = unsafe { libc::ioctl(fd, TUNSETIFF as _, &mut req) };
        if ret == -1 {
            return Err(Error::DeviceUnavailable(format!(
                "TUNSETIFF {} failed: {}",
                requested_name.unwrap_or("<kernel>"),
                io::Error::last_os_error()
            )));
        }

        set_nonblocking(fd).map_err(|e| {
            Error::DeviceUnavailable(format!("failed to set O_NONBLOCK: {e}"))
        })?;

        let name = ifreq_name(&req);
        Ok((TunQueue { file, name: name.clone() }, name))
    }
}

/// One queue descriptor on a Linux TAP interface.
#[derive(Debug)]
pub struct TunQueue {
    file: File,
    name: String,
}

impl TunQueue {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn ifreq(&self) -> io::Result<ifreq> {
        ifreq::with_name(&self.name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "bad interface name")
        })
    }
}

impl TapQueue for TunQueue {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.file).write(buf)
    }

    fn poll_writable(&self) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLOUT,
            revents: 0,
        };

        // Safety: a single valid pollfd and a zero timeout.
        let ret = unsafe { libc::poll(&mut pfd, 1, 0) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
            return Err(io::Error::other(format!(
                "poll revents {:#x} on {}",
                pfd.revents, self.name
            )));
        }
        Ok(ret > 0 && pfd.revents & libc::POLLOUT != 0)
    }

    fn hw_addr(&self) -> io::Result<MacAddr> {
        let mut req = self.ifreq()?;
        // Safety: `req` is a valid `struct ifreq` for the call.
        let ret = unsafe {
            libc::ioctl(self.file.as_raw_fd(), SIOCGIFHWADDR as _, &mut req)
        };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(MacAddr::from(req.hwaddr()))
    }

    fn set_hw_addr(&self, mac: MacAddr) -> io::Result<()> {
        let mut req = self.ifreq()?;
        req.set_hwaddr(mac.bytes());
        // Safety: `req` is a valid `struct ifreq` for the call.
        let ret = unsafe {
            libc::ioctl(self.file.as_raw_fd(), SIOCSIFHWADDR as _, &mut req)
        };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn if_index(&self) -> io::Result<u32> {
        let name = CString::new(self.name.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // Safety: `name` is a valid NUL terminated string.
        let idx = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if idx == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(idx)
    }
}
