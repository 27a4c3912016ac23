// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Queue descriptor allocation.
use crate::Error;
use crate::Result;
use crate::provider::TapProvider;
use linux_sys_hdrs::TunFlags;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::warn;

/// Pick the `TUNSETIFF` flags for a port of `nb_queues` queues given
/// the kernel's `features`.
///
/// A port asking for more than one queue must get real multi-queue
/// support; it is never quietly given a single queue.
pub fn negotiate_flags(features: TunFlags, nb_queues: u16) -> Result<TunFlags> {
    let base = TunFlags::TAP | TunFlags::NO_PI;
    let multi = features.contains(TunFlags::MULTI_QUEUE);
    let single = features.contains(TunFlags::ONE_QUEUE);

    match nb_queues {
        0 => Err(Error::DeviceUnavailable("zero queues requested".to_string())),
        1 if single => Ok(base | TunFlags::ONE_QUEUE),
        1 if multi => Ok(base | TunFlags::MULTI_QUEUE),
        n if n > 1 && multi => Ok(base | TunFlags::MULTI_QUEUE),
        n => Err(Error::DeviceUnavailable(format!(
            "{n} queue(s) requested but kernel reports features {features:?}"
        ))),
    }
}

/// Open one queue descriptor on `requested_name`.
///
/// The interface name the kernel settled on is returned alongside the
/// queue and must be used for every later open.
pub fn open_queue_device<P: TapProvider>(
    provider: &P,
    requested_name: Option<&str>,
    nb_queues: u16,
    log: &Logger,
) -> Result<(P::Queue, String)> {
    debug!(log, "opening queue device";
        "requested" => requested_name.unwrap_or("<kernel>"),
        "nb_queues" => nb_queues);

    match provider.open(requested_name, nb_queues) {
        Ok((queue, name)) => {
            info!(log, "opened queue device"; "iface" => &name);
            Ok((queue, name))
        }

        Err(e) => {
            warn!(log, "failed to open queue device"; "err" => %e);
            Err(e)
        }
    }
}
