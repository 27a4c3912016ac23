// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Burst receive and transmit through a port.

use std::sync::Arc;
use std::thread;
use tap_test_utils::*;

fn started(nb_queues: u16, pool_size: usize) -> (MockTap, Arc<Port<MockTap>>, Arc<dyn MbufPool>) {
    let (drv, mock) = mock_driver();
    let port = drv.probe("net_tap0", TapArgs::default().with_queues(nb_queues)).unwrap();
    let pool = pool("burst", pool_size);
    start_port(&port, &pool);
    (mock, port, pool)
}

#[test]
fn rx_three_frames() {
    let (mock, port, _pool) = started(2, 4);
    for (tag, len) in [(1, 64), (2, 128), (3, 256)] {
        mock.push_rx(frame(tag, len));
    }

    let mut bufs = vec![];
    assert_eq!(port.rx_burst(0, &mut bufs, 32), 3);
    let lens: Vec<usize> = bufs.iter().map(|m| m.data_len()).collect();
    assert_eq!(lens, [64, 128, 256]);
    assert_eq!(bufs[1].data(), &frame(2, 128)[..]);
    assert!(bufs.iter().all(|m| m.port() == port.port_id()));

    let stats = port.stats_get();
    assert_eq!(stats.ipackets, 3);
    assert_eq!(stats.ibytes, 448);
    assert_eq!(stats.q_ipackets, [3, 0]);
}

#[test]
fn rx_never_exceeds_request() {
    let (mock, port, _pool) = started(1, 64);
    for i in 0..10 {
        mock.push_rx(frame(i, 60));
    }

    let mut bufs = vec![];
    assert_eq!(port.rx_burst(0, &mut bufs, 4), 4);
    assert_eq!(bufs.len(), 4);
    assert_eq!(mock.rx_pending(), 6);

    // Fewer ready than asked for: exactly what is ready.
    let mut more = vec![];
    assert_eq!(port.rx_burst(0, &mut more, 32), 6);
    assert_eq!(port.rx_burst(0, &mut more, 32), 0);
    assert_eq!(more[0].data(), &frame(4, 60)[..]);
}

#[test]
fn rx_counts_accumulate() {
    let (mock, port, _pool) = started(1, 8);
    let mut expect_bytes = 0u64;
    let mut expect_pkts = 0u64;

    for round in 1..=5usize {
        for i in 0..round {
            let len = 60 + 10 * i;
            mock.push_rx(frame(round as u8, len));
            expect_bytes += len as u64;
            expect_pkts += 1;
        }
        let mut bufs = vec![];
        assert_eq!(usize::from(port.rx_burst(0, &mut bufs, 8)), round);
    }

    let snap = port.queue_stats(0).unwrap();
    assert_eq!(snap.ipackets, expect_pkts);
    assert_eq!(snap.ibytes, expect_bytes);
}

#[test]
fn rx_stops_on_pool_exhaustion() {
    let (mock, port, pool) = started(1, 2);
    for i in 0..4 {
        mock.push_rx(frame(i, 60));
    }

    let mut bufs = vec![];
    assert_eq!(port.rx_burst(0, &mut bufs, 8), 2);
    assert_eq!(pool.avail_count(), 0);
    assert_eq!(mock.rx_pending(), 2);

    // Handing the buffers back makes room for the rest.
    bufs.clear();
    assert_eq!(port.rx_burst(0, &mut bufs, 8), 2);
}

#[test]
fn tx_not_writable() {
    let (mock, port, pool) = started(1, 8);
    mock.set_writable(false);

    let mut bufs: Vec<Mbuf> = (0..3)
        .map(|i| Mbuf::from_bytes(&pool, &frame(i, 100)).unwrap())
        .collect();
    let avail = pool.avail_count();

    assert_eq!(port.tx_burst(0, &mut bufs), 0);
    assert_eq!(bufs.len(), 3);
    assert_eq!(pool.avail_count(), avail);
    assert!(mock.take_tx().is_empty());

    let stats = port.stats_get();
    assert_eq!(stats.oerrors, 3);
    assert_eq!(stats.opackets, 0);
}

#[test]
fn tx_sends_prefix_keeps_suffix() {
    let (mock, port, pool) = started(1, 8);
    mock.set_write_budget(Some(2));

    let mut bufs: Vec<Mbuf> = (0..5)
        .map(|i| Mbuf::from_bytes(&pool, &frame(i, 60 + usize::from(i))).unwrap())
        .collect();

    assert_eq!(port.tx_burst(0, &mut bufs), 2);
    assert_eq!(mock.take_tx(), [frame(0, 60), frame(1, 61)]);

    let left: Vec<usize> = bufs.iter().map(|m| m.data_len()).collect();
    assert_eq!(left, [62, 63, 64]);
    assert_eq!(pool.avail_count(), 8 - 3);

    let snap = port.queue_stats(0).unwrap();
    assert_eq!(snap.opackets, 2);
    assert_eq!(snap.obytes, 121);
    assert_eq!(snap.errors, 3);

    // Retry what is left once there is room again.
    mock.set_write_budget(None);
    assert_eq!(port.tx_burst(0, &mut bufs), 3);
    assert!(bufs.is_empty());
    assert_eq!(pool.avail_count(), 8);
}

#[test]
fn tx_write_error_stops_burst() {
    let (mock, port, pool) = started(1, 4);
    mock.set_fail_write(true);

    let mut bufs = vec![
        Mbuf::from_bytes(&pool, &frame(0, 60)).unwrap(),
        Mbuf::from_bytes(&pool, &frame(1, 60)).unwrap(),
    ];
    assert_eq!(port.tx_burst(0, &mut bufs), 0);
    assert_eq!(bufs.len(), 2);
    assert_eq!(port.queue_stats(0).unwrap().errors, 2);
}

#[test]
fn tx_empty_burst() {
    let (_mock, port, _pool) = started(1, 4);
    let mut bufs = vec![];
    assert_eq!(port.tx_burst(0, &mut bufs), 0);
    assert!(port.stats_get().is_zero());
}

#[test]
fn stats_reset() {
    let (mock, port, pool) = started(2, 8);
    mock.push_rx_to(1, frame(0, 64));
    let mut bufs = vec![];
    assert_eq!(port.rx_burst(1, &mut bufs, 8), 1);
    bufs.push(Mbuf::from_bytes(&pool, &frame(1, 64)).unwrap());
    port.tx_burst(0, &mut bufs);
    assert!(!port.stats_get().is_zero());

    port.stats_reset();
    let stats = port.stats_get();
    assert!(stats.is_zero());
    assert_eq!(stats.q_ipackets, [0, 0]);
    assert_eq!(stats.q_errors, [0, 0]);
}

#[test]
fn unknown_queue() {
    let (mock, port, pool) = started(1, 4);
    mock.push_rx(frame(0, 64));

    let mut bufs = vec![];
    assert_eq!(port.rx_burst(5, &mut bufs, 8), 0);
    bufs.push(Mbuf::from_bytes(&pool, &frame(0, 64)).unwrap());
    assert_eq!(port.tx_burst(5, &mut bufs), 0);
    assert_eq!(bufs.len(), 1);
    assert_eq!(mock.rx_pending(), 1);
}

#[test]
fn queues_polled_concurrently() {
    const FRAMES: u64 = 200;
    let (mock, port, _pool) = started(2, 64);
    mock.set_steering(|f| usize::from(f[0] % 2));
    for i in 0..FRAMES {
        mock.push_rx(frame(i as u8, 60));
    }
    assert_eq!(mock.rx_pending_on(0), 100);
    assert_eq!(mock.rx_pending_on(1), 100);

    let pollers: Vec<_> = (0..2u16)
        .map(|qid| {
            let port = Arc::clone(&port);
            let mock = mock.clone();
            thread::spawn(move || {
                let mut bufs = vec![];
                while mock.rx_pending_on(usize::from(qid)) > 0 {
                    port.rx_burst(qid, &mut bufs, 16);
                    bufs.clear();
                }
            })
        })
        .collect();

    for p in pollers {
        p.join().unwrap();
    }

    let stats = port.stats_get();
    assert_eq!(stats.ipackets, FRAMES);
    assert_eq!(stats.q_ipackets, [100, 100]);
}

#[test]
fn frames_stay_on_their_queue() {
    let (mock, port, _pool) = started(2, 8);
    mock.push_rx_to(1, frame(9, 80));

    let mut bufs = vec![];
    assert_eq!(port.rx_burst(0, &mut bufs, 8), 0);
    assert_eq!(port.rx_burst(1, &mut bufs, 8), 1);
    assert_eq!(bufs[0].data(), &frame(9, 80)[..]);
    assert_eq!(port.stats_get().q_ipackets, [0, 1]);
}

#[test]
fn released_queue_stops_receiving() {
    let (mock, port, _pool) = started(2, 8);
    mock.push_rx_to(1, frame(1, 64));
    port.rx_queue_release(1);

    // Whatever waited on the released queue is gone with it.
    let mut bufs = vec![];
    assert_eq!(port.rx_burst(1, &mut bufs, 8), 0);
    assert_eq!(mock.rx_dropped(), 1);
    assert_eq!(mock.live_queues(), 1);

    // Traffic for the departed slot lands on the remaining queue.
    mock.push_rx_to(1, frame(2, 64));
    assert_eq!(port.rx_burst(1, &mut bufs, 8), 0);
    assert_eq!(port.rx_burst(0, &mut bufs, 8), 1);
    assert_eq!(bufs[0].data(), &frame(2, 64)[..]);
}
