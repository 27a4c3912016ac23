// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The operations a hosting framework drives a port through.
use crate::Result;
use crate::mbuf::Mbuf;
use crate::mbuf::MbufPool;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use tap_api::DevInfo;
use tap_api::LinkStatus;
use tap_api::PortStats;

/// The device configuration requested by the framework.
///
/// A TAP port accepts any configuration; the queue count is fixed when
/// the port is created.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DevConf {
    pub nb_rx_queues: u16,
    pub nb_tx_queues: u16,
}

/// The port operation table.
///
/// Control operations may be called from any thread. The burst
/// operations for a given queue are expected to be driven by a single
/// poller at a time; distinct queues may be driven concurrently.
pub trait EthDevOps {
    fn dev_configure(&self, conf: &DevConf) -> Result<()>;

    fn dev_start(&self) -> Result<()>;

    fn dev_stop(&self) -> Result<()>;

    fn dev_close(&self) -> Result<()>;

    fn dev_infos_get(&self) -> DevInfo;

    /// Set up receive queue `qid`, drawing buffers from `pool`.
    fn rx_queue_setup(
        &self,
        qid: u16,
        nb_desc: u16,
        pool: Arc<dyn MbufPool>,
    ) -> Result<()>;

    fn tx_queue_setup(&self, qid: u16, nb_desc: u16) -> Result<()>;

    fn rx_queue_release(&self, qid: u16);

    fn tx_queue_release(&self, qid: u16);

    /// Return the current link status.
    ///
    /// There is nothing to negotiate on a TAP device, so
    /// `wait_to_complete` has no effect.
    fn link_update(&self, wait_to_complete: bool) -> LinkStatus;

    fn stats_get(&self) -> PortStats;

    fn stats_reset(&self);

    fn rx_burst(&self, qid: u16, bufs: &mut Vec<Mbuf>, nb_pkts: u16) -> u16;

    fn tx_burst(&self, qid: u16, bufs: &mut Vec<Mbuf>) -> u16;
}
