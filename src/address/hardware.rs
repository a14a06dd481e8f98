use std::fmt;
use std::str::FromStr;

use super::AddressParseError;

/// A 6-byte link-layer (MAC) address.
///
/// Values compare by their raw bytes. Within a single decoder the
/// [`AddressRegistry`](super::AddressRegistry) hands out one shared instance
/// per distinct value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const BROADCAST: HardwareAddress = HardwareAddress([0xff; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group bit of the first octet.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for HardwareAddress {
    type Err = AddressParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = text.split([':', '-']);

        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| AddressParseError::Hardware(text.to_string()))?;
            if part.len() != 2 {
                return Err(AddressParseError::Hardware(text.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::Hardware(text.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(AddressParseError::Hardware(text.to_string()));
        }

        Ok(Self(octets))
    }
}

impl From<[u8; 6]> for HardwareAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

#[cfg(test)]
mod tests {
    use super::HardwareAddress;

    #[test]
    fn display_and_parse_agree() {
        let mac = HardwareAddress::new([0x00, 0x1b, 0x21, 0xaa, 0xbb, 0x0c]);
        let text = mac.to_string();
        assert_eq!(text, "00:1b:21:aa:bb:0c");
        assert_eq!(text.parse::<HardwareAddress>().expect("mac should parse"), mac);
        assert_eq!(
            "00-1B-21-AA-BB-0C"
                .parse::<HardwareAddress>()
                .expect("dash form should parse"),
            mac
        );
    }

    #[test]
    fn rejects_short_and_non_hex_text() {
        assert!("00:11:22:33:44".parse::<HardwareAddress>().is_err());
        assert!("00:11:22:33:44:zz".parse::<HardwareAddress>().is_err());
        assert!("00:11:22:33:44:55:66".parse::<HardwareAddress>().is_err());
    }

    #[test]
    fn classifies_group_addresses() {
        assert!(HardwareAddress::BROADCAST.is_broadcast());
        assert!(HardwareAddress::new([0x01, 0x00, 0x5e, 0, 0, 1]).is_multicast());
        assert!(!HardwareAddress::new([0x00, 0x00, 0x5e, 0, 0, 1]).is_multicast());
        assert!(HardwareAddress::from_slice(&[1, 2, 3]).is_none());
    }
}
