// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod mock;

pub use mock::FIRST_IF_INDEX;
pub use mock::MockQueue;
pub use mock::MockTap;

// Let's make our lives easier and pub use a bunch of stuff.
pub use linux_sys_hdrs::TunFlags;
pub use tap_api::*;
pub use tap_pmd::Error;
pub use tap_pmd::config::TapArgs;
pub use tap_pmd::driver::TapDriver;
pub use tap_pmd::engine::port::Port;
pub use tap_pmd::engine::port::PortState;
pub use tap_pmd::ethdev::DevConf;
pub use tap_pmd::engine::hwaddr::app_mac;
pub use tap_pmd::engine::hwaddr::host_mac;
pub use tap_pmd::ethdev::EthDevOps;
pub use tap_pmd::mbuf::HeapPool;
pub use tap_pmd::mbuf::Mbuf;
pub use tap_pmd::mbuf::MbufPool;
pub use tap_pmd::mbuf::PKTMBUF_HEADROOM;

use slog::Logger;
use slog::o;
use std::sync::Arc;

/// The data room of a pool just big enough for any frame.
pub const DATA_ROOM: usize = PKTMBUF_HEADROOM + RX_MIN_BUF_ROOM;

/// A logger that goes nowhere.
pub fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Create a driver over a fresh [`MockTap`], returning both.
pub fn mock_driver() -> (TapDriver<MockTap>, MockTap) {
    let mock = MockTap::new();
    (TapDriver::new(mock.clone(), &test_logger()), mock)
}

pub fn pool(name: &str, capacity: usize) -> Arc<dyn MbufPool> {
    HeapPool::new_shared(name, capacity, DATA_ROOM)
}

/// A frame of `len` bytes, filled with a pattern derived from `tag`.
pub fn frame(tag: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| tag.wrapping_add(i as u8)).collect()
}

/// Drive a port to `Started` with every queue set up on `pool`.
pub fn start_port<P: tap_pmd::provider::TapProvider>(
    port: &Port<P>,
    pool: &Arc<dyn MbufPool>,
) {
    port.dev_configure(&DevConf::default()).unwrap();
    for qid in 0..port.nb_queues() {
        port.rx_queue_setup(qid, 512, Arc::clone(pool)).unwrap();
        port.tx_queue_setup(qid, 512).unwrap();
    }
    port.dev_start().unwrap();
}
