// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The TAP driver: creates and removes ports.
use crate::Error;
use crate::Result;
use crate::config::TapArgs;
use crate::engine::port::Port;
use crate::os::sync::KMutex;
use crate::provider::TapProvider;
use slog::Logger;
use slog::info;
use slog::o;
use slog::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The prefix of generated interface names.
pub const DEFAULT_TAP_NAME: &str = "dtap";

struct DriverState<P: TapProvider> {
    // The unit number of the next generated interface name.
    tap_unit: u32,
    ports: BTreeMap<String, Arc<Port<P>>>,
}

impl<P: TapProvider> DriverState<P> {
    fn lowest_free_port_id(&self) -> Option<u16> {
        let mut used: Vec<u16> = self.ports.values().map(|p| p.port_id()).collect();
        used.sort_unstable();
        let mut id = 0u16;
        for u in used {
            if u != id {
                break;
            }
            id = id.checked_add(1)?;
        }
        Some(id)
    }
}

pub struct TapDriver<P: TapProvider> {
    provider: Arc<P>,
    log: Logger,
    state: KMutex<DriverState<P>>,
}

impl<P: TapProvider> TapDriver<P> {
    pub fn new(provider: P, log: &Logger) -> Self {
        Self {
            provider: Arc::new(provider),
            log: log.new(o!("driver" => "tap")),
            state: KMutex::new(DriverState {
                tap_unit: 0,
                ports: BTreeMap::new(),
            }),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Create a port named `name`.
    ///
    /// The interface is named by `args.iface`, or else `dtap<N>` for
    /// the next unit number. If creation fails the unit number is not
    /// consumed and nothing is registered.
    pub fn probe(&self, name: &str, args: TapArgs) -> Result<Arc<Port<P>>> {
        args.validate()?;

        let mut state = self.state.lock();
        if state.ports.contains_key(name) {
            return Err(Error::Config(format!("port {name} already exists")));
        }

        let Some(port_id) = state.lowest_free_port_id() else {
            return Err(Error::Config("no free port id".to_string()));
        };

        let saved_unit = state.tap_unit;
        let iface = match &args.iface {
            Some(iface) => iface.clone(),
            None => {
                let iface = format!("{DEFAULT_TAP_NAME}{}", state.tap_unit);
                state.tap_unit += 1;
                iface
            }
        };

        info!(self.log, "initializing port";
            "name" => name, "iface" => &iface, "args" => %args);

        let port = match Port::create(
            Arc::clone(&self.provider),
            name,
            &iface,
            port_id,
            &args,
            &self.log,
        ) {
            Ok(port) => Arc::new(port),
            Err(e) => {
                state.tap_unit = saved_unit;
                warn!(self.log, "failed to create port";
                    "name" => name, "iface" => &iface, "err" => %e);
                return Err(e);
            }
        };

        state.ports.insert(name.to_string(), Arc::clone(&port));
        Ok(port)
    }

    /// Parse `params` as a device argument string and create a port.
    pub fn probe_str(&self, name: &str, params: &str) -> Result<Arc<Port<P>>> {
        self.probe(name, params.parse()?)
    }

    /// Close any queues still open on port `name` and forget it.
    ///
    /// Removing a port that does not exist is not an error.
    pub fn remove(&self, name: &str) -> Result<()> {
        let Some(port) = self.state.lock().ports.remove(name) else {
            return Ok(());
        };

        port.shutdown();
        info!(self.log, "removed port"; "name" => name, "iface" => port.iface());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Port<P>>> {
        self.state.lock().ports.get(name).cloned()
    }

    /// Return every live port, ordered by name.
    pub fn ports(&self) -> Vec<Arc<Port<P>>> {
        self.state.lock().ports.values().cloned().collect()
    }
}
