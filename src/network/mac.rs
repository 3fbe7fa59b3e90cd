//! Ethernet hardware addresses.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create from raw octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

/// Parses `aa:bb:cc:dd:ee:ff` (hyphens also accepted).
impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(|c: char| c == ':' || c == '-');

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(|| Error::InvalidMac(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| Error::InvalidMac(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(Error::InvalidMac(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mac() {
        let mac: MacAddress = "7e:b8:7e:87:4a:ea".parse().unwrap();
        assert_eq!(mac.octets(), [0x7e, 0xb8, 0x7e, 0x87, 0x4a, 0xea]);
        assert_eq!(mac.to_string(), "7e:b8:7e:87:4a:ea");

        let upper: MacAddress = "7E-B8-7E-87-4A-EA".parse().unwrap();
        assert_eq!(upper, mac);
    }

    #[test]
    fn test_parse_invalid_mac() {
        for bad in [
            "",
            "7e:b8:7e:87:4a",
            "7e:b8:7e:87:4a:ea:01",
            "7e:b8:7e:87:4a:zz",
            "7eb8:7e:87:4a:ea",
            "7:b8:7e:87:4a:ea",
            "+e:b8:7e:87:4a:ea",
        ] {
            assert!(
                matches!(bad.parse::<MacAddress>(), Err(Error::InvalidMac(_))),
                "expected '{}' to be rejected",
                bad
            );
        }
    }
}
