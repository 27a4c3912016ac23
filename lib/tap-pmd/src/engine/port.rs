// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A TAP port.
//!
//! A port is a TAP interface plus up to [`tap_api::MAX_QUEUES`] queue pairs,
//! each backed by its own descriptor on the interface. Queue 0 is
//! opened when the port is created; the rest are opened as they are
//! set up.
//!
//! The interface is not persistent: the kernel destroys it when its
//! last descriptor closes, as happens on stop. The next queue setup
//! creates a new interface under the same name, with a new index and
//! a kernel chosen address, so the port reprograms its address and
//! looks the index up again.
use super::alloc::open_queue_device;
use super::burst;
use super::hwaddr::assign_mac;
use super::queue::QueuePair;
use super::queue::QueueStatsSnap;
use crate::Error;
use crate::Result;
use crate::config::TapArgs;
use crate::ethdev::DevConf;
use crate::ethdev::EthDevOps;
use crate::mbuf::Mbuf;
use crate::mbuf::MbufPool;
use crate::os::sync::KMutex;
use crate::provider::TapProvider;
use crate::provider::TapQueue;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;
use slog::warn;
use std::sync::Arc;
use tap_api::DevInfo;
use tap_api::ETHER_MAX_VLAN_FRAME_LEN;
use tap_api::LinkState;
use tap_api::LinkStatus;
use tap_api::MacAddr;
use tap_api::PortStats;
use tap_api::QUEUE_STAT_CNTRS;
use tap_api::RX_MIN_BUF_ROOM;

/// The lifecycle state of a port.
///
/// ```text
/// Created -- configure --> Configured
/// Configured -- configure --> Configured
/// Configured -- start --> Started
/// Started -- stop --> Stopped
/// Stopped -- configure --> Configured
/// Stopped -- start --> Started
/// * -- close --> Closed
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PortState {
    /// The port exists and queue 0 is open, but it has not yet been
    /// configured.
    Created,

    /// The port has been configured and may be started.
    Configured,

    /// The link is up.
    Started,

    /// The link is down and every queue descriptor is closed. Queues
    /// must be set up again before traffic can flow.
    Stopped,

    /// The port is gone for good. Only queries are accepted.
    Closed,
}

impl Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use PortState::*;

        let s = match self {
            Created => "created",
            Configured => "configured",
            Started => "started",
            Stopped => "stopped",
            Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PortState {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "configured" => Ok(Self::Configured),
            "started" => Ok(Self::Started),
            "stopped" => Ok(Self::Stopped),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Bad PortState string: {s}")),
        }
    }
}

/// A summary of a port, suitable for printing or serializing.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub iface: String,
    pub port_id: u16,
    pub numa_node: u8,
    pub nb_queues: u16,
    pub mac: MacAddr,
    pub if_index: u32,
    pub state: PortState,
    pub link: LinkStatus,
    pub open_queues: u16,
}

// Convert:
//
// ```
// check_state!(state, [Started, Stopped])?;
// ```
//
// to:
//
// ```
// if state != Started && state != Stopped {
//     Err(Error::BadState(state))
// } else {
//     Ok(())
// }
// ```
macro_rules! check_state {
    ( $sg:expr, [ $( $state:expr ),* ] ) => {
        if $( $sg != $state )&&* {
            Err(Error::BadState($sg))
        } else {
            Ok(())
        }
    };

    // Trailing comma in state list.
    ( $sg:expr, [ $( $state:expr ),+ ,] ) => {
        check_state!($sg, [$( $state ),*])
    };
}

struct PortData {
    state: PortState,
    link: LinkStatus,
    mac: MacAddr,
    if_index: u32,
}

pub struct Port<P: TapProvider> {
    name: String,
    iface: String,
    port_id: u16,
    numa_node: u8,
    nb_queues: u16,
    provider: Arc<P>,
    log: Logger,
    data: KMutex<PortData>,
    queues: Vec<KMutex<QueuePair<P::Queue>>>,
}

/// Program the host side address of the interface behind `q` and look
/// up its index, returning the application side address and the index.
fn identify<Q: TapQueue>(
    q: &Q,
    iface: &str,
    port_id: u16,
    numa_node: u8,
) -> Result<(MacAddr, u32)> {
    let mac = assign_mac(q, port_id, numa_node)?;
    let if_index = q.if_index().map_err(|e| {
        Error::DeviceUnavailable(format!(
            "failed to look up index of {iface}: {e}"
        ))
    })?;
    Ok((mac, if_index))
}

impl<P: TapProvider> Port<P> {
    /// Create a port named `name` on the TAP interface `iface`.
    ///
    /// Queue 0 is opened, the hardware address is assigned and the
    /// interface index is looked up. Any failure closes whatever was
    /// opened and is reported as [`Error::DeviceUnavailable`].
    pub fn create(
        provider: Arc<P>,
        name: &str,
        iface: &str,
        port_id: u16,
        args: &TapArgs,
        log: &Logger,
    ) -> Result<Self> {
        args.validate()?;
        let nb_queues = args.queues;
        let numa_node = args.numa_node;
        let log = log.new(o!("port" => name.to_string()));

        let (q0, iface) =
            open_queue_device(&*provider, Some(iface), nb_queues, &log)?;

        let (mac, if_index) = identify(&q0, &iface, port_id, numa_node)?;

        let mut queues: Vec<_> = (0..nb_queues)
            .map(|idx| KMutex::new(QueuePair::new(idx, port_id)))
            .collect();
        queues[0].get_mut().set_fd(q0);

        info!(log, "created port";
            "iface" => &iface,
            "port_id" => port_id,
            "queues" => nb_queues,
            "mac" => %mac,
            "if_index" => if_index);

        Ok(Self {
            name: name.to_string(),
            iface,
            port_id,
            numa_node,
            nb_queues,
            provider,
            log,
            data: KMutex::new(PortData {
                state: PortState::Created,
                link: LinkStatus::new(args.speed),
                mac,
                if_index,
            }),
            queues,
        })
    }

    /// The name the port was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the kernel interface, as chosen by the kernel.
    pub fn iface(&self) -> &str {
        &self.iface
    }

    pub fn port_id(&self) -> u16 {
        self.port_id
    }

    pub fn numa_node(&self) -> u8 {
        self.numa_node
    }

    pub fn nb_queues(&self) -> u16 {
        self.nb_queues
    }

    /// The application side hardware address.
    pub fn mac(&self) -> MacAddr {
        self.data.lock().mac
    }

    /// The index of the kernel interface currently backing the port.
    pub fn if_index(&self) -> u32 {
        self.data.lock().if_index
    }

    pub fn state(&self) -> PortState {
        self.data.lock().state
    }

    /// Is the descriptor for queue `qid` open?
    pub fn queue_is_open(&self, qid: u16) -> bool {
        self.queue(qid).is_some_and(|q| q.lock().is_open())
    }

    /// The number of open queue descriptors.
    pub fn open_queue_count(&self) -> u16 {
        self.queues.iter().filter(|q| q.lock().is_open()).count() as u16
    }

    /// Return a snapshot of the counters of queue `qid`.
    pub fn queue_stats(&self, qid: u16) -> Option<QueueStatsSnap> {
        self.queue(qid).map(|q| q.lock().stats())
    }

    pub fn info(&self) -> PortInfo {
        let (state, link, mac, if_index) = {
            let data = self.data.lock();
            (data.state, data.link, data.mac, data.if_index)
        };

        PortInfo {
            name: self.name.clone(),
            iface: self.iface.clone(),
            port_id: self.port_id,
            numa_node: self.numa_node,
            nb_queues: self.nb_queues,
            mac,
            if_index,
            state,
            link,
            open_queues: self.open_queue_count(),
        }
    }

    fn queue(&self, qid: u16) -> Option<&KMutex<QueuePair<P::Queue>>> {
        self.queues.get(usize::from(qid))
    }

    fn check_qid(&self, qid: u16) -> Result<()> {
        if qid >= self.nb_queues {
            return Err(Error::Config(format!(
                "queue {qid} out of range, port has {} queue(s)",
                self.nb_queues
            )));
        }
        Ok(())
    }

    /// Make sure queue `qid` has an open descriptor, opening a new one
    /// on the port's interface if needed.
    ///
    /// The caller holds the port data lock, which serializes every
    /// open and close of a queue descriptor.
    fn ensure_queue_fd(&self, data: &mut PortData, qid: u16) -> Result<()> {
        let Some(q) = self.queue(qid) else {
            return Err(Error::Config(format!("no queue {qid}")));
        };
        if q.lock().is_open() {
            return Ok(());
        }

        // With no descriptor left open the interface is gone; this open
        // creates it anew.
        let recreate = self.open_queue_count() == 0;

        info!(self.log, "adding queue to interface";
            "iface" => &self.iface, "qid" => qid, "recreate" => recreate);
        let (fd, iface) = open_queue_device(
            &*self.provider,
            Some(&self.iface),
            self.nb_queues,
            &self.log,
        )?;

        if iface != self.iface {
            warn!(self.log, "kernel opened queue on another interface";
                "expected" => &self.iface, "actual" => &iface);
        }

        if recreate {
            let (mac, if_index) =
                identify(&fd, &iface, self.port_id, self.numa_node)?;
            if if_index != data.if_index {
                info!(self.log, "interface recreated";
                    "old_if_index" => data.if_index, "if_index" => if_index);
            }
            data.mac = mac;
            data.if_index = if_index;
        }

        q.lock().set_fd(fd);
        Ok(())
    }

    /// Close every open queue descriptor.
    fn close_queues(&self) {
        for q in &self.queues {
            let mut qp = q.lock();
            if qp.close() {
                info!(self.log, "closed queue"; "qid" => qp.idx());
            }
        }
    }

    fn log_rejected(&self, op: &str, res: Result<()>) -> Result<()> {
        if let Err(e) = &res {
            debug!(self.log, "rejected operation"; "op" => op, "err" => %e);
        }
        res
    }

    /// Tear the port down, whatever its state.
    ///
    /// Return `false` if the port was already closed.
    pub(crate) fn shutdown(&self) -> bool {
        let mut data = self.data.lock();
        if data.state == PortState::Closed {
            return false;
        }
        self.close_queues();
        data.link.state = LinkState::Down;
        data.state = PortState::Closed;
        info!(self.log, "port closed");
        true
    }
}

impl<P: TapProvider> EthDevOps for Port<P> {
    /// Configure the port.
    ///
    /// # States
    ///
    /// This command is valid in [`PortState::Created`],
    /// [`PortState::Configured`] and [`PortState::Stopped`].
    fn dev_configure(&self, conf: &DevConf) -> Result<()> {
        let mut data = self.data.lock();
        let res = check_state!(
            data.state,
            [PortState::Created, PortState::Configured, PortState::Stopped]
        );
        self.log_rejected("configure", res)?;

        debug!(self.log, "configure";
            "nb_rx_queues" => conf.nb_rx_queues,
            "nb_tx_queues" => conf.nb_tx_queues);
        data.state = PortState::Configured;
        Ok(())
    }

    /// Bring the link up.
    ///
    /// No descriptors are opened here; that happens at queue setup.
    ///
    /// # States
    ///
    /// This command is valid in [`PortState::Configured`] and
    /// [`PortState::Stopped`]. If the port is already started this is
    /// a no op.
    fn dev_start(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.state == PortState::Started {
            return Ok(());
        }
        let res = check_state!(
            data.state,
            [PortState::Configured, PortState::Stopped]
        );
        self.log_rejected("start", res)?;

        data.link.state = LinkState::Up;
        data.state = PortState::Started;
        info!(self.log, "port started"; "link" => %data.link);
        Ok(())
    }

    /// Close every queue descriptor and bring the link down.
    ///
    /// # States
    ///
    /// This command is valid in [`PortState::Started`]. If the port is
    /// already stopped this is a no op.
    fn dev_stop(&self) -> Result<()> {
        let mut data = self.data.lock();
        if data.state == PortState::Stopped {
            return Ok(());
        }
        let res = check_state!(data.state, [PortState::Started]);
        self.log_rejected("stop", res)?;

        self.close_queues();
        data.link.state = LinkState::Down;
        data.state = PortState::Stopped;
        info!(self.log, "port stopped");
        Ok(())
    }

    /// Close every queue descriptor, leaving the port unusable.
    ///
    /// # States
    ///
    /// This command is valid in every state but [`PortState::Closed`].
    fn dev_close(&self) -> Result<()> {
        let mut data = self.data.lock();
        let res = check_state!(
            data.state,
            [
                PortState::Created,
                PortState::Configured,
                PortState::Started,
                PortState::Stopped
            ]
        );
        self.log_rejected("close", res)?;
        drop(data);

        self.shutdown();
        Ok(())
    }

    fn dev_infos_get(&self) -> DevInfo {
        DevInfo {
            if_index: self.data.lock().if_index,
            max_mac_addrs: 1,
            max_rx_pktlen: ETHER_MAX_VLAN_FRAME_LEN as u32,
            max_rx_queues: self.nb_queues,
            max_tx_queues: self.nb_queues,
            min_rx_bufsize: 0,
        }
    }

    /// Set up receive queue `qid`.
    ///
    /// The pool must leave room for a full VLAN tagged frame once the
    /// headroom is taken; otherwise [`Error::OutOfResources`] is
    /// returned and nothing changes.
    ///
    /// # States
    ///
    /// This command is valid in every state but [`PortState::Closed`].
    fn rx_queue_setup(
        &self,
        qid: u16,
        nb_desc: u16,
        pool: Arc<dyn MbufPool>,
    ) -> Result<()> {
        let mut data = self.data.lock();
        let res = check_state!(
            data.state,
            [
                PortState::Created,
                PortState::Configured,
                PortState::Started,
                PortState::Stopped
            ]
        );
        self.log_rejected("rx_queue_setup", res)?;
        self.check_qid(qid)?;

        let room = pool.usable_room();
        if room < RX_MIN_BUF_ROOM {
            warn!(self.log, "pool buffers too small";
                "pool" => pool.name(), "room" => room, "need" => RX_MIN_BUF_ROOM);
            return Err(Error::OutOfResources(format!(
                "{RX_MIN_BUF_ROOM} bytes will not fit in buffers of pool \
                 {} ({room} bytes)",
                pool.name()
            )));
        }

        self.ensure_queue_fd(&mut data, qid)?;
        if let Some(q) = self.queue(qid) {
            q.lock().set_pool(pool);
        }
        info!(self.log, "rx queue set up"; "qid" => qid, "nb_desc" => nb_desc);
        Ok(())
    }

    /// Set up transmit queue `qid`.
    ///
    /// # States
    ///
    /// This command is valid in every state but [`PortState::Closed`].
    fn tx_queue_setup(&self, qid: u16, nb_desc: u16) -> Result<()> {
        let mut data = self.data.lock();
        let res = check_state!(
            data.state,
            [
                PortState::Created,
                PortState::Configured,
                PortState::Started,
                PortState::Stopped
            ]
        );
        self.log_rejected("tx_queue_setup", res)?;
        self.check_qid(qid)?;

        self.ensure_queue_fd(&mut data, qid)?;
        info!(self.log, "tx queue set up"; "qid" => qid, "nb_desc" => nb_desc);
        Ok(())
    }

    /// Release receive queue `qid`.
    ///
    /// The descriptor is shared with transmit queue `qid`, which stops
    /// working as well.
    fn rx_queue_release(&self, qid: u16) {
        let Some(q) = self.queue(qid) else {
            return;
        };
        let _data = self.data.lock();
        let mut qp = q.lock();
        qp.clear_pool();
        if qp.close() {
            info!(self.log, "released rx queue"; "qid" => qid);
        }
    }

    /// Release transmit queue `qid`.
    ///
    /// The descriptor is shared with receive queue `qid`, which stops
    /// working as well.
    fn tx_queue_release(&self, qid: u16) {
        let Some(q) = self.queue(qid) else {
            return;
        };
        let _data = self.data.lock();
        if q.lock().close() {
            info!(self.log, "released tx queue"; "qid" => qid);
        }
    }

    fn link_update(&self, _wait_to_complete: bool) -> LinkStatus {
        self.data.lock().link
    }

    fn stats_get(&self) -> PortStats {
        let n = usize::from(self.nb_queues).min(QUEUE_STAT_CNTRS);
        let mut stats = PortStats::with_queues(n);
        for (idx, q) in self.queues.iter().take(n).enumerate() {
            let snap = q.lock().stats();
            stats.add_queue(
                idx,
                snap.ipackets,
                snap.ibytes,
                snap.opackets,
                snap.obytes,
                snap.errors,
            );
        }
        stats
    }

    fn stats_reset(&self) {
        for q in &self.queues {
            q.lock().reset_stats();
        }
    }

    fn rx_burst(&self, qid: u16, bufs: &mut Vec<Mbuf>, nb_pkts: u16) -> u16 {
        match self.queue(qid) {
            Some(q) => burst::rx_burst(&mut q.lock(), bufs, nb_pkts),
            None => 0,
        }
    }

    fn tx_burst(&self, qid: u16, bufs: &mut Vec<Mbuf>) -> u16 {
        match self.queue(qid) {
            Some(q) => burst::tx_burst(&mut q.lock(), bufs),
            None => 0,
        }
    }
}

impl<P: TapProvider> fmt::Debug for Port<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("iface", &self.iface)
            .field("port_id", &self.port_id)
            .field("nb_queues", &self.nb_queues)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn state_strings() {
        for s in [
            PortState::Created,
            PortState::Configured,
            PortState::Started,
            PortState::Stopped,
            PortState::Closed,
        ] {
            assert_eq!(s.to_string().parse::<PortState>().unwrap(), s);
        }
        assert!("running".parse::<PortState>().is_err());
    }

    #[test]
    fn check_state_macro() {
        let state = PortState::Stopped;
        let ok: Result<()> =
            check_state!(state, [PortState::Started, PortState::Stopped]);
        assert!(ok.is_ok());

        let bad: Result<()> = check_state!(state, [PortState::Started]);
        assert_eq!(bad, Err(Error::BadState(PortState::Stopped)));
    }
}
