// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Port lifecycle and queue setup.

use std::sync::Arc;
use tap_test_utils::*;

fn port_with(nb_queues: u16) -> (TapDriver<MockTap>, MockTap, Arc<Port<MockTap>>) {
    let (drv, mock) = mock_driver();
    let port = drv.probe("net_tap0", TapArgs::default().with_queues(nb_queues)).unwrap();
    (drv, mock, port)
}

#[test]
fn lifecycle() {
    let (_drv, mock, port) = port_with(2);
    let conf = DevConf { nb_rx_queues: 2, nb_tx_queues: 2 };

    assert_eq!(port.dev_start(), Err(Error::BadState(PortState::Created)));
    assert_eq!(port.dev_stop(), Err(Error::BadState(PortState::Created)));

    port.dev_configure(&conf).unwrap();
    port.dev_configure(&conf).unwrap();
    assert_eq!(port.state(), PortState::Configured);
    assert_eq!(port.dev_stop(), Err(Error::BadState(PortState::Configured)));

    port.dev_start().unwrap();
    assert_eq!(port.state(), PortState::Started);
    assert!(port.link_update(false).is_up());

    // Starting again is a no op.
    port.dev_start().unwrap();
    assert_eq!(port.dev_configure(&conf), Err(Error::BadState(PortState::Started)));

    port.dev_stop().unwrap();
    assert_eq!(port.state(), PortState::Stopped);
    assert!(!port.link_update(false).is_up());
    assert_eq!(mock.live_queues(), 0);

    // Stopping again is a no op.
    port.dev_stop().unwrap();

    port.dev_start().unwrap();
    port.dev_stop().unwrap();
    port.dev_configure(&conf).unwrap();

    port.dev_close().unwrap();
    assert_eq!(port.state(), PortState::Closed);
    assert_eq!(port.dev_close(), Err(Error::BadState(PortState::Closed)));
    assert_eq!(port.dev_start(), Err(Error::BadState(PortState::Closed)));
    assert_eq!(port.dev_configure(&conf), Err(Error::BadState(PortState::Closed)));
}

#[test]
fn start_opens_nothing() {
    let (_drv, mock, port) = port_with(4);
    port.dev_configure(&DevConf::default()).unwrap();
    port.dev_start().unwrap();
    assert_eq!(mock.opens(), 1);
    assert_eq!(port.open_queue_count(), 1);
}

#[test]
fn close_from_created() {
    let (_drv, mock, port) = port_with(1);
    port.dev_close().unwrap();
    assert_eq!(mock.live_queues(), 0);
    assert!(!port.link_update(false).is_up());
}

#[test]
fn queues_closed_after_stop_need_setup_again() {
    let (_drv, mock, port) = port_with(2);
    let pool = pool("restart", 8);
    start_port(&port, &pool);
    port.dev_stop().unwrap();
    port.dev_start().unwrap();

    // No queue is attached, so the interface is gone and so is the
    // frame.
    mock.push_rx(frame(1, 64));
    assert_eq!(mock.rx_dropped(), 1);
    let mut bufs = vec![];
    assert_eq!(port.rx_burst(0, &mut bufs, 8), 0);

    port.rx_queue_setup(0, 512, Arc::clone(&pool)).unwrap();
    mock.push_rx(frame(2, 64));
    assert_eq!(port.rx_burst(0, &mut bufs, 8), 1);
    assert_eq!(bufs[0].data(), &frame(2, 64)[..]);
}

#[test]
fn interface_recreated_after_stop() {
    let (_drv, mock, port) = port_with(2);
    let pool = pool("recreate", 8);
    start_port(&port, &pool);
    assert_eq!(mock.if_index(), FIRST_IF_INDEX);
    assert_eq!(port.if_index(), FIRST_IF_INDEX);

    // The last queue closing takes the interface with it.
    port.dev_stop().unwrap();
    assert_eq!(mock.if_index(), 0);
    assert_eq!(mock.hw_addr(), MacAddr::ZERO);

    port.rx_queue_setup(0, 512, Arc::clone(&pool)).unwrap();
    assert_eq!(mock.if_index(), FIRST_IF_INDEX + 1);
    assert_eq!(port.if_index(), mock.if_index());
    assert_eq!(port.dev_infos_get().if_index, mock.if_index());
    assert_eq!(port.info().if_index, mock.if_index());
    assert_eq!(mock.hw_addr(), host_mac(port.port_id(), port.numa_node()));
    assert_eq!(port.mac(), app_mac(port.port_id(), port.numa_node()));

    // A queue joining the live interface leaves it as it is.
    port.tx_queue_setup(1, 512).unwrap();
    assert_eq!(mock.opens(), 4);
    assert_eq!(port.dev_infos_get().if_index, FIRST_IF_INDEX + 1);
}

#[test]
fn release_of_last_queue_recreates_interface() {
    let (_drv, mock, port) = port_with(1);
    port.rx_queue_release(0);
    assert_eq!(mock.if_index(), 0);

    port.tx_queue_setup(0, 512).unwrap();
    assert_eq!(port.if_index(), FIRST_IF_INDEX + 1);
    assert_eq!(mock.hw_addr(), host_mac(port.port_id(), 0));
}

#[test]
fn recreate_failure_leaves_queue_closed() {
    let (_drv, mock, port) = port_with(2);
    let pool = pool("recreate", 8);
    start_port(&port, &pool);
    port.dev_stop().unwrap();

    mock.set_fail_hwaddr(true);
    let res = port.tx_queue_setup(0, 512);
    assert!(matches!(res, Err(Error::DeviceUnavailable(_))));
    assert!(!port.queue_is_open(0));
    assert_eq!(mock.live_queues(), 0);
    assert_eq!(port.if_index(), FIRST_IF_INDEX);

    mock.set_fail_hwaddr(false);
    port.tx_queue_setup(0, 512).unwrap();
    assert_eq!(port.if_index(), mock.if_index());
}

#[test]
fn rx_setup_rejects_small_buffers() {
    let (_drv, mock, port) = port_with(2);

    let small = HeapPool::new_shared("small", 4, PKTMBUF_HEADROOM + 1514);
    let res = port.rx_queue_setup(1, 512, small);
    assert!(matches!(res, Err(Error::OutOfResources(_))));
    assert!(!port.queue_is_open(1));
    assert_eq!(mock.opens(), 1);

    // Exactly one VLAN tagged frame without FCS is enough.
    let exact = HeapPool::new_shared("exact", 4, PKTMBUF_HEADROOM + 1518);
    port.rx_queue_setup(1, 512, exact).unwrap();
    assert!(port.queue_is_open(1));
}

#[test]
fn setup_rejects_bad_queue_id() {
    let (_drv, mock, port) = port_with(2);
    let pool = pool("qid", 4);

    let res = port.rx_queue_setup(2, 512, pool);
    assert!(matches!(res, Err(Error::Config(_))));
    let res = port.tx_queue_setup(16, 512);
    assert!(matches!(res, Err(Error::Config(_))));
    assert_eq!(mock.opens(), 1);
}

#[test]
fn setup_open_failure() {
    let (_drv, mock, port) = port_with(2);
    mock.set_fail_open(true);
    let res = port.tx_queue_setup(1, 512);
    assert!(matches!(res, Err(Error::DeviceUnavailable(_))));
    assert!(!port.queue_is_open(1));
}

#[test]
fn setup_after_close() {
    let (_drv, _mock, port) = port_with(2);
    port.dev_close().unwrap();
    let res = port.tx_queue_setup(0, 512);
    assert_eq!(res, Err(Error::BadState(PortState::Closed)));
    let res = port.rx_queue_setup(0, 512, pool("closed", 1));
    assert_eq!(res, Err(Error::BadState(PortState::Closed)));
}

#[test]
fn rx_and_tx_share_one_descriptor() {
    let (_drv, mock, port) = port_with(2);
    let pool = pool("shared", 8);

    port.rx_queue_setup(1, 512, Arc::clone(&pool)).unwrap();
    assert_eq!(mock.opens(), 2);
    port.tx_queue_setup(1, 512).unwrap();
    assert_eq!(mock.opens(), 2);

    // Queue 0 was opened at creation and is reused.
    port.tx_queue_setup(0, 512).unwrap();
    port.rx_queue_setup(0, 512, Arc::clone(&pool)).unwrap();
    assert_eq!(mock.opens(), 2);
    assert_eq!(mock.live_queues(), 2);

    // Releasing the RX side stops the TX side too.
    port.rx_queue_release(1);
    assert!(!port.queue_is_open(1));
    assert_eq!(mock.live_queues(), 1);

    let mut bufs = vec![Mbuf::from_bytes(&pool, &frame(0, 60)).unwrap()];
    assert_eq!(port.tx_burst(1, &mut bufs), 0);
    assert_eq!(bufs.len(), 1);
    assert!(mock.take_tx().is_empty());
    assert_eq!(port.queue_stats(1).unwrap().errors, 1);
}

#[test]
fn release_is_idempotent() {
    let (_drv, mock, port) = port_with(2);
    port.tx_queue_setup(1, 512).unwrap();

    port.tx_queue_release(1);
    port.tx_queue_release(1);
    port.rx_queue_release(1);
    port.rx_queue_release(15);
    assert_eq!(mock.live_queues(), 1);

    port.tx_queue_setup(1, 512).unwrap();
    assert_eq!(mock.live_queues(), 2);
}

#[test]
fn dev_info() {
    let (_drv, mock, port) = port_with(3);
    let info = port.dev_infos_get();
    assert_eq!(info.if_index, mock.if_index());
    assert_eq!(info.max_mac_addrs, 1);
    assert_eq!(info.max_rx_pktlen, 1522);
    assert_eq!(info.max_rx_queues, 3);
    assert_eq!(info.max_tx_queues, 3);
    assert_eq!(info.min_rx_bufsize, 0);
}

#[test]
fn port_info_json() {
    let (_drv, _mock, port) = port_with(2);
    let info = port.info();
    assert_eq!(info.iface, "dtap0");
    assert_eq!(info.open_queues, 1);

    let s = serde_json::to_string(&info).unwrap();
    let back: tap_pmd::engine::port::PortInfo = serde_json::from_str(&s).unwrap();
    assert_eq!(back, info);
}
