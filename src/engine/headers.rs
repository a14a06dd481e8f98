use std::net::Ipv4Addr;

use super::constants::{ETHERNET_HEADER_LEN, IPV4_MIN_HEADER_LEN};
use super::cursor::Cursor;
use super::error::{DecodeError, Result};

const MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Untagged Ethernet II only; an 802.1Q tag shows up as its own EtherType.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let truncated = DecodeError::Truncated {
            layer: "ethernet",
            needed: ETHERNET_HEADER_LEN,
            available: raw.len(),
        };

        let mut cursor = Cursor::new(raw);
        let destination = cursor.read_array::<6>().ok_or(truncated.clone())?;
        let source = cursor.read_array::<6>().ok_or(truncated.clone())?;
        let ethertype = cursor.read_u16_be().ok_or(truncated)?;

        Ok(Self {
            destination,
            source,
            ethertype,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub header_len: usize,
    pub total_length: usize,
    pub identification: u16,
    pub more_fragments: bool,
    /// Byte offset of this fragment within the original datagram.
    pub fragment_offset: usize,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// Version of the network header, if there is at least one byte of it.
    pub fn version(data: &[u8]) -> Option<u8> {
        data.first().map(|first| first >> 4)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return Err(DecodeError::Truncated {
                layer: "ipv4",
                needed: IPV4_MIN_HEADER_LEN,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let malformed = DecodeError::MalformedHeader("ipv4");
        let version_ihl = cursor.read_u8().ok_or(malformed.clone())?;
        if version_ihl >> 4 != 4 {
            return Err(malformed);
        }

        let header_len = usize::from(version_ihl & 0x0f) * 4;
        if header_len < IPV4_MIN_HEADER_LEN {
            return Err(malformed);
        }
        if header_len > data.len() {
            return Err(DecodeError::Truncated {
                layer: "ipv4",
                needed: header_len,
                available: data.len(),
            });
        }

        cursor.advance(1);
        // Segmentation offload captures leave the length field at zero.
        let total_length = match usize::from(cursor.read_u16_be().ok_or(malformed.clone())?) {
            0 => data.len(),
            length if length < header_len => return Err(malformed),
            length => length,
        };
        let identification = cursor.read_u16_be().ok_or(malformed.clone())?;
        let fragment_word = cursor.read_u16_be().ok_or(malformed.clone())?;
        let ttl = cursor.read_u8().ok_or(malformed.clone())?;
        let protocol = cursor.read_u8().ok_or(malformed.clone())?;
        cursor.advance(2);
        let source = cursor.read_array::<4>().ok_or(malformed.clone())?;
        let destination = cursor.read_array::<4>().ok_or(malformed)?;

        Ok(Self {
            header_len,
            total_length,
            identification,
            more_fragments: fragment_word & MORE_FRAGMENTS != 0,
            fragment_offset: usize::from(fragment_word & FRAGMENT_OFFSET_MASK) * 8,
            ttl,
            protocol,
            source: Ipv4Addr::from(source),
            destination: Ipv4Addr::from(destination),
        })
    }

    pub fn is_fragment(&self) -> bool {
        self.more_fragments || self.fragment_offset != 0
    }

    /// End of the datagram within `data`, clamped to what was captured.
    pub fn datagram_end(&self, data: &[u8]) -> usize {
        self.total_length.min(data.len())
    }
}
