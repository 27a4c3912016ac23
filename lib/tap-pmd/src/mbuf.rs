// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Packet buffers and the pools they are drawn from.
//!
//! An [`Mbuf`] holds its storage for as long as it lives; dropping it
//! hands the storage back to the [`MbufPool`] it came from.
use crate::os::sync::KMutex;
use core::fmt;
use std::sync::Arc;

/// Bytes reserved at the front of every buffer.
pub const PKTMBUF_HEADROOM: usize = 128;

/// A source of fixed size packet storage.
///
/// `data_room_size` is the size of each buffer, headroom included.
pub trait MbufPool: Send + Sync {
    fn name(&self) -> &str;

    fn data_room_size(&self) -> usize;

    /// Take one buffer's worth of storage, or `None` if the pool is
    /// exhausted.
    fn get(&self) -> Option<Vec<u8>>;

    /// Return storage previously taken with `get()`.
    fn put(&self, storage: Vec<u8>);

    /// The number of buffers currently available.
    fn avail_count(&self) -> usize;

    /// The room left for packet data once the headroom is taken.
    fn usable_room(&self) -> usize {
        self.data_room_size().saturating_sub(PKTMBUF_HEADROOM)
    }
}

/// A packet buffer.
pub struct Mbuf {
    buf: Vec<u8>,
    data_off: usize,
    data_len: usize,
    port: u16,
    pool: Arc<dyn MbufPool>,
}

impl Mbuf {
    /// Allocate a buffer from `pool`.
    pub fn alloc(pool: &Arc<dyn MbufPool>) -> Option<Self> {
        let buf = pool.get()?;
        let data_off = PKTMBUF_HEADROOM.min(buf.len());
        Some(Self { buf, data_off, data_len: 0, port: 0, pool: Arc::clone(pool) })
    }

    /// Allocate a buffer from `pool` and fill it with `bytes`.
    ///
    /// Return `None` if the pool is exhausted or `bytes` does not fit.
    pub fn from_bytes(pool: &Arc<dyn MbufPool>, bytes: &[u8]) -> Option<Self> {
        let mut m = Self::alloc(pool)?;
        if !m.append(bytes) {
            return None;
        }
        Some(m)
    }

    /// Copy `bytes` to the end of the data region.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        let tail = self.tailroom_mut();
        if bytes.len() > tail.len() {
            return false;
        }
        tail[..bytes.len()].copy_from_slice(bytes);
        self.data_len += bytes.len();
        true
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[self.data_off..self.data_off + self.data_len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.data_off..self.data_off + self.data_len]
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Set the length of the data region.
    ///
    /// The length is clamped to what the buffer can hold.
    pub fn set_data_len(&mut self, len: usize) {
        self.data_len = len.min(self.buf.len() - self.data_off);
    }

    pub fn headroom(&self) -> usize {
        self.data_off
    }

    pub fn tailroom(&self) -> usize {
        self.buf.len() - self.data_off - self.data_len
    }

    /// The unused bytes following the data region.
    pub fn tailroom_mut(&mut self) -> &mut [u8] {
        let start = self.data_off + self.data_len;
        &mut self.buf[start..]
    }

    /// The id of the port this buffer was received on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        self.pool.put(core::mem::take(&mut self.buf));
    }
}

impl fmt::Debug for Mbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mbuf")
            .field("pool", &self.pool.name())
            .field("port", &self.port)
            .field("data_off", &self.data_off)
            .field("data_len", &self.data_len)
            .field("tailroom", &self.tailroom())
            .finish()
    }
}

/// A fixed capacity pool of heap allocated buffers.
pub struct HeapPool {
    name: String,
    data_room_size: usize,
    capacity: usize,
    free: KMutex<Vec<Vec<u8>>>,
}

impl HeapPool {
    pub fn new(name: &str, capacity: usize, data_room_size: usize) -> Self {
        let free = (0..capacity).map(|_| vec![0u8; data_room_size]).collect();
        Self {
            name: name.to_string(),
            data_room_size,
            capacity,
            free: KMutex::new(free),
        }
    }

    /// Create a pool ready to hand to a port.
    pub fn new_shared(
        name: &str,
        capacity: usize,
        data_room_size: usize,
    ) -> Arc<dyn MbufPool> {
        Arc::new(Self::new(name, capacity, data_room_size))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use_count(&self) -> usize {
        self.capacity - self.avail_count()
    }
}

impl MbufPool for HeapPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_room_size(&self) -> usize {
        self.data_room_size
    }

    fn get(&self) -> Option<Vec<u8>> {
        self.free.lock().pop()
    }

    fn put(&self, mut storage: Vec<u8>) {
        // Storage from a foreign pool is not ours to keep.
        if storage.len() != self.data_room_size {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            storage.fill(0);
            free.push(storage);
        }
    }

    fn avail_count(&self) -> usize {
        self.free.lock().len()
    }
}
