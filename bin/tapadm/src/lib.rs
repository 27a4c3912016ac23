// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! TAP port administration library

use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use tap_api::DevInfo;
use tap_api::LinkStatus;
use tap_api::PortStats;
use tap_pmd::Result;
use tap_pmd::engine::port::Port;
use tap_pmd::engine::port::PortInfo;
use tap_pmd::ethdev::DevConf;
use tap_pmd::ethdev::EthDevOps;
use tap_pmd::mbuf::HeapPool;
use tap_pmd::mbuf::MbufPool;
use tap_pmd::mbuf::PKTMBUF_HEADROOM;
use tap_pmd::provider::TapProvider;

/// Descriptor count handed to queue setup; the driver ignores it.
pub const NB_DESC: u16 = 1024;

/// The data room of a pool able to hold any frame the kernel sends.
pub const POOL_DATA_ROOM: usize = PKTMBUF_HEADROOM + tap_api::RX_MIN_BUF_ROOM;

/// Everything `tapadm run` reports about a port.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PortReport {
    pub info: PortInfo,
    pub link: LinkStatus,
    pub dev_info: DevInfo,
    pub stats: PortStats,
}

/// Configure a port, give every queue its own pool of `pool_size`
/// buffers, and start it.
pub fn bring_up<P: TapProvider>(
    port: &Port<P>,
    pool_size: usize,
) -> Result<Vec<Arc<dyn MbufPool>>> {
    let nb_queues = port.nb_queues();
    port.dev_configure(&DevConf {
        nb_rx_queues: nb_queues,
        nb_tx_queues: nb_queues,
    })?;

    let mut pools = Vec::with_capacity(usize::from(nb_queues));
    for qid in 0..nb_queues {
        let pool = HeapPool::new_shared(
            &format!("{}_rx{qid}", port.name()),
            pool_size,
            POOL_DATA_ROOM,
        );
        port.rx_queue_setup(qid, NB_DESC, Arc::clone(&pool))?;
        port.tx_queue_setup(qid, NB_DESC)?;
        pools.push(pool);
    }

    port.dev_start()?;
    Ok(pools)
}

/// Poll every queue of `port` once, returning the number of frames
/// received. When `reflect` is set the frames are sent back out the
/// queue they arrived on; whatever is not sent is dropped.
pub fn poll_once<P: TapProvider>(
    port: &Port<P>,
    burst: u16,
    reflect: bool,
) -> u64 {
    let mut bufs = Vec::with_capacity(usize::from(burst));
    let mut total = 0;

    for qid in 0..port.nb_queues() {
        let n = port.rx_burst(qid, &mut bufs, burst);
        total += u64::from(n);
        if reflect && n > 0 {
            port.tx_burst(qid, &mut bufs);
        }
        bufs.clear();
    }

    total
}

pub fn report<P: TapProvider>(port: &Port<P>) -> PortReport {
    PortReport {
        info: port.info(),
        link: port.link_update(false),
        dev_info: port.dev_infos_get(),
        stats: port.stats_get(),
    }
}
