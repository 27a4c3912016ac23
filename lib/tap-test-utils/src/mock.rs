// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! An in-memory TAP provider.
//!
//! Every queue opened on a [`MockTap`] attaches to one interface. Each
//! attached queue has its own receive ring, numbered by attach order
//! the way the kernel numbers them: when a queue detaches, the last
//! one moves into its slot and the frames waiting on the detached
//! queue are dropped. Frames pushed with [`MockTap::push_rx()`] go to
//! the slot chosen by the steering function, slot 0 unless one is set.
//! Every frame written to any queue lands in one transmit log.
//!
//! The interface lives only while some queue is attached. Detaching
//! the last one destroys it; the next open creates it again with a
//! fresh index and a kernel chosen address.
use linux_sys_hdrs::IFNAMSIZ;
use linux_sys_hdrs::TunFlags;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tap_api::MacAddr;
use tap_pmd::Error;
use tap_pmd::Result;
use tap_pmd::engine::alloc::negotiate_flags;
use tap_pmd::os::sync::KMutex;
use tap_pmd::provider::TapProvider;
use tap_pmd::provider::TapQueue;

/// The index given to the first interface created.
pub const FIRST_IF_INDEX: u32 = 7;

type Steering = Box<dyn Fn(&[u8]) -> usize + Send>;

struct RxRing {
    queue: u32,
    frames: VecDeque<Vec<u8>>,
}

struct MockState {
    features: TunFlags,
    fail_open: bool,
    rename: Option<String>,
    iface: Option<String>,
    last_flags: Option<TunFlags>,
    opens: u32,
    rings: Vec<RxRing>,
    steering: Option<Steering>,
    rx_dropped: u64,
    tx: Vec<Vec<u8>>,
    writable: bool,
    write_budget: Option<usize>,
    fail_write: bool,
    fail_hwaddr: bool,
    hwaddr: MacAddr,
    if_index: u32,
    next_if_index: u32,
}

impl MockState {
    fn push_rx(&mut self, slot: usize, frame: Vec<u8>) {
        let n = self.rings.len();
        if n == 0 {
            self.rx_dropped += 1;
            return;
        }
        self.rings[slot % n].frames.push_back(frame);
    }

    fn ring_mut(&mut self, queue: u32) -> Option<&mut RxRing> {
        self.rings.iter_mut().find(|r| r.queue == queue)
    }
}

/// The address the kernel gives a new interface.
fn kernel_mac(if_index: u32) -> MacAddr {
    let b = if_index.to_be_bytes();
    MacAddr::from([0xA2, 0x08, b[0], b[1], b[2], b[3]])
}

#[derive(Clone)]
pub struct MockTap {
    state: Arc<KMutex<MockState>>,
}

impl Default for MockTap {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTap {
    /// A kernel that supports both single and multi-queue framing.
    pub fn new() -> Self {
        Self::with_features(
            TunFlags::TUN
                | TunFlags::TAP
                | TunFlags::NO_PI
                | TunFlags::ONE_QUEUE
                | TunFlags::MULTI_QUEUE
                | TunFlags::VNET_HDR,
        )
    }

    pub fn with_features(features: TunFlags) -> Self {
        Self {
            state: Arc::new(KMutex::new(MockState {
                features,
                fail_open: false,
                rename: None,
                iface: None,
                last_flags: None,
                opens: 0,
                rings: vec![],
                steering: None,
                rx_dropped: 0,
                tx: vec![],
                writable: true,
                write_budget: None,
                fail_write: false,
                fail_hwaddr: false,
                hwaddr: MacAddr::ZERO,
                if_index: 0,
                next_if_index: FIRST_IF_INDEX,
            })),
        }
    }

    /// Make every subsequent open fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Have the kernel pick `name` regardless of the name requested.
    pub fn set_rename(&self, name: &str) {
        self.state.lock().rename = Some(name.to_string());
    }

    /// Queue a frame for reception on the slot the steering function
    /// picks. With no queue attached the frame is dropped.
    pub fn push_rx(&self, frame: Vec<u8>) {
        let mut state = self.state.lock();
        let slot = state.steering.as_ref().map_or(0, |f| f(&frame));
        state.push_rx(slot, frame);
    }

    /// Queue a frame for reception on the queue attached at `slot`.
    pub fn push_rx_to(&self, slot: usize, frame: Vec<u8>) {
        self.state.lock().push_rx(slot, frame);
    }

    /// Pick the receive slot of each frame given to [`Self::push_rx()`].
    /// Slots past the number of attached queues wrap around.
    pub fn set_steering(
        &self,
        steering: impl Fn(&[u8]) -> usize + Send + 'static,
    ) {
        self.state.lock().steering = Some(Box::new(steering));
    }

    /// The number of frames not yet read, over every queue.
    pub fn rx_pending(&self) -> usize {
        self.state.lock().rings.iter().map(|r| r.frames.len()).sum()
    }

    /// The number of frames waiting on the queue attached at `slot`.
    pub fn rx_pending_on(&self, slot: usize) -> usize {
        self.state.lock().rings.get(slot).map_or(0, |r| r.frames.len())
    }

    /// Frames dropped because no queue was attached, or because the
    /// queue they waited on detached.
    pub fn rx_dropped(&self) -> u64 {
        self.state.lock().rx_dropped
    }

    /// Remove and return every frame written so far.
    pub fn take_tx(&self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.state.lock().tx)
    }

    pub fn set_writable(&self, writable: bool) {
        self.state.lock().writable = writable;
    }

    /// Accept only `budget` more writes before reporting not writable.
    pub fn set_write_budget(&self, budget: Option<usize>) {
        self.state.lock().write_budget = budget;
    }

    /// Report writable but fail every write.
    pub fn set_fail_write(&self, fail: bool) {
        self.state.lock().fail_write = fail;
    }

    pub fn set_fail_hwaddr(&self, fail: bool) {
        self.state.lock().fail_hwaddr = fail;
    }

    /// The address currently programmed on the host side.
    pub fn hw_addr(&self) -> MacAddr {
        self.state.lock().hwaddr
    }

    /// The index of the interface, or 0 when it does not exist.
    pub fn if_index(&self) -> u32 {
        self.state.lock().if_index
    }

    /// The number of successful opens so far.
    pub fn opens(&self) -> u32 {
        self.state.lock().opens
    }

    /// The number of queue descriptors currently open.
    pub fn live_queues(&self) -> u32 {
        self.state.lock().rings.len() as u32
    }

    /// The flags given to the most recent successful open.
    pub fn last_flags(&self) -> Option<TunFlags> {
        self.state.lock().last_flags
    }

    /// The interface the most recent successful open attached to.
    pub fn last_iface(&self) -> Option<String> {
        self.state.lock().iface.clone()
    }
}

impl TapProvider for MockTap {
    type Queue = MockQueue;

    fn features(&self) -> Result<TunFlags> {
        Ok(self.state.lock().features)
    }

    fn open(
        &self,
        requested_name: Option<&str>,
        nb_queues: u16,
    ) -> Result<(Self::Queue, String)> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(Error::DeviceUnavailable(
                "open of mock device failed".to_string(),
            ));
        }

        if let Some(name) = requested_name {
            if name.len() >= IFNAMSIZ {
                return Err(Error::DeviceUnavailable(format!(
                    "interface name {name} too long"
                )));
            }
        }

        let flags = negotiate_flags(state.features, nb_queues)?;

        // Attaching a second queue needs a multi-queue interface.
        if !state.rings.is_empty() && !flags.contains(TunFlags::MULTI_QUEUE) {
            return Err(Error::DeviceUnavailable("device busy".to_string()));
        }

        let name = state
            .rename
            .clone()
            .or_else(|| requested_name.map(str::to_string))
            .unwrap_or_else(|| "tap0".to_string());

        if state.rings.is_empty() {
            state.if_index = state.next_if_index;
            state.next_if_index += 1;
            state.hwaddr = kernel_mac(state.if_index);
        }

        state.opens += 1;
        let id = state.opens;
        state.rings.push(RxRing { queue: id, frames: VecDeque::new() });
        state.last_flags = Some(flags);
        state.iface = Some(name.clone());

        let queue = MockQueue { state: Arc::clone(&self.state), id };
        Ok((queue, name))
    }
}

/// A queue descriptor on a [`MockTap`].
pub struct MockQueue {
    state: Arc<KMutex<MockState>>,
    id: u32,
}

impl MockQueue {
    /// The sequence number of the open that produced this queue.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for MockQueue {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let Some(slot) = state.rings.iter().position(|r| r.queue == self.id)
        else {
            return;
        };

        let ring = state.rings.swap_remove(slot);
        state.rx_dropped += ring.frames.len() as u64;

        if state.rings.is_empty() {
            state.if_index = 0;
            state.hwaddr = MacAddr::ZERO;
        }
    }
}

impl TapQueue for MockQueue {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let Some(frame) =
            state.ring_mut(self.id).and_then(|r| r.frames.pop_front())
        else {
            return Err(io::ErrorKind::WouldBlock.into());
        };
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.fail_write {
            return Err(io::Error::other("mock write failure"));
        }

        match &mut state.write_budget {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(n) => *n -= 1,
            None => {}
        }

        state.tx.push(buf.to_vec());
        Ok(buf.len())
    }

    fn poll_writable(&self) -> io::Result<bool> {
        let state = self.state.lock();
        Ok(state.writable && state.write_budget != Some(0))
    }

    fn hw_addr(&self) -> io::Result<MacAddr> {
        let state = self.state.lock();
        if state.fail_hwaddr {
            return Err(io::ErrorKind::PermissionDenied.into());
        }
        Ok(state.hwaddr)
    }

    fn set_hw_addr(&self, mac: MacAddr) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_hwaddr {
            return Err(io::ErrorKind::PermissionDenied.into());
        }
        state.hwaddr = mac;
        Ok(())
    }

    fn if_index(&self) -> io::Result<u32> {
        Ok(self.state.lock().if_index)
    }
}
