// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Port creation arguments.
use crate::Error;
use crate::Result;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use linux_sys_hdrs::IFNAMSIZ;
use serde::Deserialize;
use serde::Serialize;
use tap_api::DEFAULT_SPEED;
use tap_api::MAX_QUEUES;

pub const ETH_TAP_IFACE_ARG: &str = "iface";
pub const ETH_TAP_INTERFACE_ARG: &str = "interface";
pub const ETH_TAP_SPEED_ARG: &str = "speed";

/// The arguments a port is created with.
///
/// From a device argument string only `iface` (or `interface`) and
/// `speed` may be set, e.g. `iface=tap7,speed=25000`. The queue count
/// and NUMA node come from the hosting framework.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TapArgs {
    /// The interface name to request. When absent one is generated.
    pub iface: Option<String>,

    /// The advertised link speed in Mb/s.
    pub speed: u32,

    /// The number of queue pairs.
    pub queues: u16,

    pub numa_node: u8,
}

impl Default for TapArgs {
    fn default() -> Self {
        Self {
            iface: None,
            speed: DEFAULT_SPEED,
            queues: MAX_QUEUES,
            numa_node: 0,
        }
    }
}

impl TapArgs {
    pub fn with_iface(mut self, iface: &str) -> Self {
        self.iface = Some(iface.to_string());
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_queues(mut self, queues: u16) -> Self {
        self.queues = queues;
        self
    }

    pub fn with_numa_node(mut self, numa_node: u8) -> Self {
        self.numa_node = numa_node;
        self
    }

    /// Check the arguments without touching any device.
    pub fn validate(&self) -> Result<()> {
        if let Some(iface) = &self.iface {
            validate_iface(iface)?;
        }

        if self.queues == 0 || self.queues > MAX_QUEUES {
            return Err(Error::Config(format!(
                "queue count {} out of range 1-{MAX_QUEUES}",
                self.queues
            )));
        }

        Ok(())
    }
}

fn validate_iface(iface: &str) -> Result<()> {
    if iface.is_empty() {
        return Err(Error::Config("empty interface name".to_string()));
    }

    if iface.len() >= IFNAMSIZ {
        return Err(Error::Config(format!(
            "interface name {iface} too long, must be under {IFNAMSIZ} bytes"
        )));
    }

    if iface.bytes().any(|b| b == 0 || b == b'/' || b.is_ascii_whitespace()) {
        return Err(Error::Config(format!("bad interface name: {iface:?}")));
    }

    Ok(())
}

impl FromStr for TapArgs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut args = TapArgs::default();
        let mut seen_iface = false;
        let mut seen_speed = false;

        if s.is_empty() {
            return Ok(args);
        }

        for kv in s.split(',') {
            let Some((key, val)) = kv.split_once('=') else {
                return Err(Error::Config(format!("expected key=value: {kv}")));
            };

            match key {
                ETH_TAP_IFACE_ARG | ETH_TAP_INTERFACE_ARG => {
                    if seen_iface {
                        return Err(Error::Config(format!(
                            "repeated key: {key}"
                        )));
                    }
                    seen_iface = true;
                    validate_iface(val)?;
                    args.iface = Some(val.to_string());
                }

                ETH_TAP_SPEED_ARG => {
                    if seen_speed {
                        return Err(Error::Config(format!(
                            "repeated key: {key}"
                        )));
                    }
                    seen_speed = true;
                    args.speed = val.parse().map_err(|_| {
                        Error::Config(format!("bad speed: {val}"))
                    })?;
                }

                _ => {
                    return Err(Error::Config(format!("unknown key: {key}")));
                }
            }
        }

        Ok(args)
    }
}

impl Display for TapArgs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(iface) = &self.iface {
            write!(f, "{ETH_TAP_IFACE_ARG}={iface},")?;
        }
        write!(f, "{ETH_TAP_SPEED_ARG}={}", self.speed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let args: TapArgs = "".parse().unwrap();
        assert_eq!(args, TapArgs::default());
        assert_eq!(args.speed, 10_000);
        assert_eq!(args.queues, MAX_QUEUES);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn parse_keys() {
        let args: TapArgs = "iface=tap7,speed=25000".parse().unwrap();
        assert_eq!(args.iface.as_deref(), Some("tap7"));
        assert_eq!(args.speed, 25_000);

        let args: TapArgs = "interface=foo".parse().unwrap();
        assert_eq!(args.iface.as_deref(), Some("foo"));

        let args: TapArgs = args.to_string().parse().unwrap();
        assert_eq!(args.iface.as_deref(), Some("foo"));
    }

    #[test]
    fn reject_bad_input() {
        for bad in [
            "speed",
            "speed=fast",
            "speed=-1",
            "mtu=9000",
            "iface=",
            "iface=a-name-that-is-too-long",
            "iface=a,interface=b",
            "speed=1,speed=2",
            "iface=tap0,",
        ] {
            let res = bad.parse::<TapArgs>();
            assert!(matches!(res, Err(Error::Config(_))), "accepted {bad}");
        }
    }

    #[test]
    fn queue_range() {
        assert!(TapArgs::default().with_queues(0).validate().is_err());
        assert!(TapArgs::default().with_queues(17).validate().is_err());
        assert!(TapArgs::default().with_queues(1).validate().is_ok());
    }

    #[test]
    fn deserialize() {
        let args: TapArgs =
            serde_json::from_str(r#"{"iface": "tap3", "queues": 2}"#).unwrap();
        assert_eq!(args.iface.as_deref(), Some("tap3"));
        assert_eq!(args.queues, 2);
        assert_eq!(args.speed, DEFAULT_SPEED);

        let res = serde_json::from_str::<TapArgs>(r#"{"mtu": 9000}"#);
        assert!(res.is_err());
    }
}
