//! Hardware addresses and the tracked peer record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 6-byte link-layer hardware address. Discovery advertises it in colon-hex
/// string form; `FromStr` parses that form back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// All-zero placeholder held before a peer is known.
    pub const UNSET: MacAddr = MacAddr([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Whether the address has been populated. Bytes 1..6 are compared
    /// against byte 0, so an address whose bytes all coincide with byte 0
    /// also reads as unset.
    pub fn is_set(&self) -> bool {
        let mut n = 5;
        while n > 0 && self.0[n] == self.0[0] {
            n -= 1;
        }
        n != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = AddrParseError;

    /// Parse `AA:BB:CC:DD:EE:FF` (hex, case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for slot in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| AddrParseError(s.to_string()))?;
            *slot =
                u8::from_str_radix(part, 16).map_err(|_| AddrParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(AddrParseError(s.to_string()));
        }
        Ok(MacAddr(octets))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid hardware address `{0}`")]
pub struct AddrParseError(String);

/// Host network interface an association is bound to. Only meaningful on
/// the node hosting the rendezvous network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interface {
    #[default]
    Station,
    AccessPoint,
}

/// The single remote node this link tracks. Zeroed at construction and
/// whenever a fresh discovery cycle begins; the transport gets a read-only
/// copy when the association is (re)registered.
#[derive(Debug, Clone, Default)]
pub struct PeerRecord {
    pub addr: MacAddr,
    pub channel: u8,
    /// The protocol runs unencrypted; this stays false.
    pub encrypt: bool,
    pub interface: Interface,
}

impl PeerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-zero before a fresh discovery cycle.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        let addr = MacAddr([0x3C, 0x71, 0xBF, 0x10, 0x2A, 0xF0]);
        assert_eq!(addr.to_string(), "3C:71:BF:10:2A:F0");
        assert_eq!("3C:71:BF:10:2A:F0".parse::<MacAddr>().unwrap(), addr);
        assert_eq!("3c:71:bf:10:2a:f0".parse::<MacAddr>().unwrap(), addr);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!("3C:71:BF:10:2A".parse::<MacAddr>().is_err());
        assert!("3C:71:BF:10:2A:F0:99".parse::<MacAddr>().is_err());
        assert!("3C:71:ZZ:10:2A:F0".parse::<MacAddr>().is_err());
        assert!("".parse::<MacAddr>().is_err());
    }

    #[test]
    fn zero_address_is_unset() {
        assert!(!MacAddr::UNSET.is_set());
    }

    #[test]
    fn distinct_bytes_are_set() {
        let addr = MacAddr([0x3C, 0x71, 0xBF, 0x10, 0x2A, 0xF0]);
        assert!(addr.is_set());
        // One differing byte is enough.
        assert!(MacAddr([0, 0, 0, 0, 0, 1]).is_set());
    }

    #[test]
    fn uniform_address_reads_as_unset() {
        // A real address whose bytes all equal byte 0 is indistinguishable
        // from the unset placeholder.
        assert!(!MacAddr([0xAA; 6]).is_set());
        assert!(!MacAddr([0x02; 6]).is_set());
    }

    #[test]
    fn clear_rezeroes_record() {
        let mut peer = PeerRecord {
            addr: MacAddr([1, 2, 3, 4, 5, 6]),
            channel: 1,
            encrypt: false,
            interface: Interface::AccessPoint,
        };
        peer.clear();
        assert_eq!(peer.addr, MacAddr::UNSET);
        assert_eq!(peer.channel, 0);
        assert_eq!(peer.interface, Interface::Station);
    }
}
