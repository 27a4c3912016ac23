// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use serde::Deserialize;
use serde::Serialize;

use crate::ETHER_ADDR_LEN;

/// An Ethernet hardware address.
#[derive(
    Clone, Copy, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct MacAddr([u8; ETHER_ADDR_LEN]);

impl MacAddr {
    pub const ZERO: Self = Self([0; ETHER_ADDR_LEN]);

    pub fn bytes(&self) -> [u8; ETHER_ADDR_LEN] {
        self.0
    }

    /// Is the locally administered (U/L) bit set?
    pub fn is_local_admin(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Is this an individual (not group) address?
    pub fn is_unicast(&self) -> bool {
        self.0[0] & 0x01 == 0
    }
}

impl From<[u8; ETHER_ADDR_LEN]> for MacAddr {
    fn from(bytes: [u8; ETHER_ADDR_LEN]) -> Self {
        Self(bytes)
    }
}

// Lower case, colon separated, as `ip link` prints it.
impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn display() {
        let mac = MacAddr::from([0x56, 0x61, 0x70, 0x2d, 0x03, 0x01]);
        assert_eq!(mac.to_string(), "56:61:70:2d:03:01");
        assert_eq!(format!("{mac:?}"), "MacAddr(56:61:70:2d:03:01)");
    }

    #[test]
    fn address_bits() {
        let laa = MacAddr::from([0x66, b'n', b'e', b't', 0, 0]);
        assert!(laa.is_local_admin());
        assert!(laa.is_unicast());
        assert!(!MacAddr::from([0xff; 6]).is_unicast());
        assert!(!MacAddr::ZERO.is_local_admin());
    }
}
