// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// The number of queues for which per-queue counters are reported.
pub const QUEUE_STAT_CNTRS: usize = 16;

/// Aggregate and per-queue counters for a port.
///
/// The `q_` vectors are indexed by queue and hold one entry for each
/// of the first `min(nb_queues, QUEUE_STAT_CNTRS)` queues. The totals
/// cover the same set of queues.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PortStats {
    pub ipackets: u64,
    pub opackets: u64,
    pub ibytes: u64,
    pub obytes: u64,
    pub oerrors: u64,
    pub q_ipackets: Vec<u64>,
    pub q_opackets: Vec<u64>,
    pub q_ibytes: Vec<u64>,
    pub q_obytes: Vec<u64>,
    pub q_errors: Vec<u64>,
}

impl PortStats {
    pub fn with_queues(nb_queues: usize) -> Self {
        let n = nb_queues.min(QUEUE_STAT_CNTRS);
        Self {
            q_ipackets: vec![0; n],
            q_opackets: vec![0; n],
            q_ibytes: vec![0; n],
            q_obytes: vec![0; n],
            q_errors: vec![0; n],
            ..Default::default()
        }
    }

    /// Record the counters of queue `idx` and fold them into the
    /// totals.
    pub fn add_queue(
        &mut self,
        idx: usize,
        ipackets: u64,
        ibytes: u64,
        opackets: u64,
        obytes: u64,
        errors: u64,
    ) {
        if idx >= self.q_ipackets.len() {
            return;
        }

        self.q_ipackets[idx] = ipackets;
        self.q_ibytes[idx] = ibytes;
        self.q_opackets[idx] = opackets;
        self.q_obytes[idx] = obytes;
        self.q_errors[idx] = errors;

        self.ipackets += ipackets;
        self.ibytes += ibytes;
        self.opackets += opackets;
        self.obytes += obytes;
        self.oerrors += errors;
    }

    pub fn is_zero(&self) -> bool {
        self.ipackets == 0
            && self.opackets == 0
            && self.ibytes == 0
            && self.obytes == 0
            && self.oerrors == 0
            && self.q_errors.iter().all(|v| *v == 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn queue_counters_are_capped() {
        let mut stats = PortStats::with_queues(QUEUE_STAT_CNTRS + 4);
        assert_eq!(stats.q_ipackets.len(), QUEUE_STAT_CNTRS);

        stats.add_queue(0, 3, 448, 1, 60, 2);
        stats.add_queue(QUEUE_STAT_CNTRS, 10, 10, 10, 10, 10);
        assert_eq!(stats.ipackets, 3);
        assert_eq!(stats.ibytes, 448);
        assert_eq!(stats.oerrors, 2);
        assert!(!stats.is_zero());
    }

    #[test]
    fn serde_json() {
        let mut stats = PortStats::with_queues(1);
        stats.add_queue(0, 1, 64, 0, 0, 0);
        let s = serde_json::to_string(&stats).unwrap();
        let back: PortStats = serde_json::from_str(&s).unwrap();
        assert_eq!(stats, back);
    }
}
