// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Burst receive and transmit.
//!
//! Neither direction ever blocks. A burst ends at the first buffer
//! that cannot be filled or sent, and the counters are updated once
//! per burst.
use super::queue::QueuePair;
use crate::mbuf::Mbuf;
use crate::provider::TapQueue;

/// Receive up to `nb_pkts` frames, appending them to `bufs`.
///
/// Return the number of frames received. A queue without a descriptor
/// or a pool receives nothing.
pub fn rx_burst<Q: TapQueue>(
    qp: &mut QueuePair<Q>,
    bufs: &mut Vec<Mbuf>,
    nb_pkts: u16,
) -> u16 {
    let Some(pool) = qp.pool().cloned() else {
        return 0;
    };
    let port_id = qp.port_id();
    let Some(q) = qp.fd().get() else {
        return 0;
    };

    let mut num_rx = 0u16;
    let mut num_rx_bytes = 0u64;

    while num_rx < nb_pkts {
        let Some(mut m) = Mbuf::alloc(&pool) else {
            break;
        };

        // Dropping `m` on any of these paths returns it to the pool.
        let len = match q.read(m.tailroom_mut()) {
            Ok(len) if len > 0 => len,
            _ => break,
        };

        m.set_data_len(len);
        m.set_port(port_id);
        num_rx_bytes += len as u64;
        bufs.push(m);
        num_rx += 1;
    }

    qp.stats.ipackets += u64::from(num_rx);
    qp.stats.ibytes += num_rx_bytes;
    num_rx
}

/// Transmit the buffers in `bufs`, in order.
///
/// Every buffer sent is released and removed from the front of
/// `bufs`. Whatever could not be sent stays behind in `bufs`, in its
/// original order, and is counted as an error. Return the number of
/// buffers sent.
pub fn tx_burst<Q: TapQueue>(
    qp: &mut QueuePair<Q>,
    bufs: &mut Vec<Mbuf>,
) -> u16 {
    if bufs.is_empty() {
        return 0;
    }

    let nb_pkts = bufs.len().min(usize::from(u16::MAX));
    let mut num_tx = 0usize;
    let mut num_tx_bytes = 0u64;

    if let Some(q) = qp.fd().get() {
        for m in bufs.iter().take(nb_pkts) {
            match q.poll_writable() {
                Ok(true) => {}
                _ => break,
            }

            match q.write(m.data()) {
                Ok(len) if len > 0 => {}
                _ => break,
            }

            num_tx += 1;
            num_tx_bytes += m.data_len() as u64;
        }
    }

    bufs.drain(..num_tx);

    qp.stats.opackets += num_tx as u64;
    qp.stats.obytes += num_tx_bytes;
    qp.stats.errors += (nb_pkts - num_tx) as u64;
    num_tx as u16
}
