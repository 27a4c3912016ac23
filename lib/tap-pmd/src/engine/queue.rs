// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Queue pairs.
//!
//! A TAP queue descriptor is bidirectional, so the RX and TX sides of
//! a given index share one descriptor slot. Setting up either side
//! opens it; releasing either side closes it for both.
use crate::mbuf::MbufPool;
use crate::stat::StatProvider;
use crate::stat::StatU64;
use std::sync::Arc;

/// Counters for one queue pair.
#[derive(Debug, StatProvider)]
pub struct QueueStats {
    pub ipackets: StatU64,
    pub opackets: StatU64,
    pub ibytes: StatU64,
    pub obytes: StatU64,
    pub errors: StatU64,
}

/// The descriptor slot of a queue pair.
#[derive(Debug)]
pub enum QueueFd<Q> {
    Unset,
    Open(Q),
}

impl<Q> Default for QueueFd<Q> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<Q> QueueFd<Q> {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn get(&self) -> Option<&Q> {
        match self {
            Self::Open(q) => Some(q),
            Self::Unset => None,
        }
    }

    /// Move the descriptor out, leaving the slot `Unset`.
    pub fn take(&mut self) -> Option<Q> {
        match core::mem::take(self) {
            Self::Open(q) => Some(q),
            Self::Unset => None,
        }
    }
}

pub struct QueuePair<Q> {
    idx: u16,
    fd: QueueFd<Q>,
    pool: Option<Arc<dyn MbufPool>>,
    port_id: u16,
    pub(crate) stats: QueueStats,
}

impl<Q> QueuePair<Q> {
    pub fn new(idx: u16, port_id: u16) -> Self {
        Self {
            idx,
            fd: QueueFd::Unset,
            pool: None,
            port_id,
            stats: QueueStats::new(),
        }
    }

    pub fn idx(&self) -> u16 {
        self.idx
    }

    pub fn fd(&self) -> &QueueFd<Q> {
        &self.fd
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_open()
    }

    /// Install a freshly opened descriptor.
    ///
    /// Any descriptor already in the slot is closed first.
    pub fn set_fd(&mut self, q: Q) {
        let _ = self.fd.take();
        self.fd = QueueFd::Open(q);
    }

    /// Close the descriptor, if any.
    ///
    /// Return `true` if a descriptor was closed.
    pub fn close(&mut self) -> bool {
        self.fd.take().is_some()
    }

    pub fn pool(&self) -> Option<&Arc<dyn MbufPool>> {
        self.pool.as_ref()
    }

    pub fn set_pool(&mut self, pool: Arc<dyn MbufPool>) {
        self.pool = Some(pool);
    }

    pub fn clear_pool(&mut self) {
        self.pool = None;
    }

    /// The port id stamped on every received buffer.
    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    pub fn stats(&self) -> QueueStatsSnap {
        self.stats.snapshot()
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    struct CountDrop(Arc<AtomicUsize>);

    impl Drop for CountDrop {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn descriptor_closed_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut qp = QueuePair::new(0, 3);
        assert!(!qp.is_open());
        assert!(!qp.close());

        qp.set_fd(CountDrop(Arc::clone(&drops)));
        assert!(qp.is_open());
        assert!(qp.close());
        assert!(!qp.close());
        assert!(matches!(qp.fd(), QueueFd::Unset));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replacing_descriptor_closes_old() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut qp = QueuePair::new(1, 0);
        qp.set_fd(CountDrop(Arc::clone(&drops)));
        qp.set_fd(CountDrop(Arc::clone(&drops)));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        drop(qp);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stats_reset() {
        let mut qp: QueuePair<()> = QueuePair::new(0, 0);
        qp.stats.ipackets += 3;
        qp.stats.ibytes += 448;
        qp.stats.errors += 1;
        assert_eq!(qp.stats().ipackets, 3);

        qp.reset_stats();
        assert_eq!(qp.stats(), QueueStatsSnap::default());
        assert_eq!(qp.port_id(), 0);
        assert_eq!(qp.idx(), 0);
    }
}
