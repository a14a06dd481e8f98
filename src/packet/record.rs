use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;

use crate::address::LogicalAddressMapping;
use crate::engine::cursor::Cursor;
use crate::engine::error::DecodeError;

use super::metadata::{ImportSource, PacketMetadata, Progress};

pub const UDP_HEADER_LEN: usize = 8;
pub const ICMP_HEADER_LEN: usize = 8;
pub const TCP_MIN_HEADER_LEN: usize = 20;

/// Header fields and buffer offsets common to every record of one frame.
///
/// `buffer` is the whole frame (or the reassembled datagram) and is shared,
/// never copied, by the records built over it.
#[derive(Debug, Clone)]
pub struct PacketCore {
    pub metadata: PacketMetadata,
    pub ethertype: u16,
    pub protocol: u8,
    pub ttl: u8,
    buffer: Bytes,
    network_offset: usize,
    payload_offset: usize,
    payload_end: usize,
}

impl PacketCore {
    /// Offsets must satisfy `network_offset <= payload_offset <= payload_end <= buffer.len()`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metadata: PacketMetadata,
        buffer: Bytes,
        ethertype: u16,
        protocol: u8,
        ttl: u8,
        network_offset: usize,
        payload_offset: usize,
        payload_end: usize,
    ) -> Result<Self, DecodeError> {
        if network_offset > payload_offset
            || payload_offset > payload_end
            || payload_end > buffer.len()
        {
            return Err(DecodeError::MalformedHeader("ipv4"));
        }

        Ok(Self {
            metadata,
            ethertype,
            protocol,
            ttl,
            buffer,
            network_offset,
            payload_offset,
            payload_end,
        })
    }

    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn network_offset(&self) -> usize {
        self.network_offset
    }

    /// Range of the IP payload (the transport segment) within the buffer.
    pub fn payload_range(&self) -> Range<usize> {
        self.payload_offset..self.payload_end
    }

    fn payload_slice(&self) -> &[u8] {
        &self.buffer[self.payload_range()]
    }
}

/// An IPv4 packet with no further transport decoding.
#[derive(Debug, Clone)]
pub struct IpPacket {
    pub core: PacketCore,
    pub source: Arc<LogicalAddressMapping>,
    pub destination: Arc<LogicalAddressMapping>,
}

#[derive(Debug, Clone)]
pub struct TcpPacket {
    pub core: PacketCore,
    pub source: Arc<LogicalAddressMapping>,
    pub destination: Arc<LogicalAddressMapping>,
    source_port: u16,
    destination_port: u16,
    sequence: u32,
    acknowledgement: u32,
    flags: u8,
    header_len: usize,
}

impl TcpPacket {
    pub fn parse(
        core: &PacketCore,
        source: Arc<LogicalAddressMapping>,
        destination: Arc<LogicalAddressMapping>,
    ) -> Result<Self, DecodeError> {
        let segment = core.payload_slice();
        if segment.len() < TCP_MIN_HEADER_LEN {
            return Err(DecodeError::Truncated {
                layer: "tcp",
                needed: TCP_MIN_HEADER_LEN,
                available: segment.len(),
            });
        }

        let mut cursor = Cursor::new(segment);
        let source_port = cursor.read_u16_be().ok_or(DecodeError::MalformedHeader("tcp"))?;
        let destination_port = cursor.read_u16_be().ok_or(DecodeError::MalformedHeader("tcp"))?;
        let sequence = cursor.read_u32_be().ok_or(DecodeError::MalformedHeader("tcp"))?;
        let acknowledgement = cursor.read_u32_be().ok_or(DecodeError::MalformedHeader("tcp"))?;
        let offset_byte = cursor.read_u8().ok_or(DecodeError::MalformedHeader("tcp"))?;
        let flags = cursor.read_u8().ok_or(DecodeError::MalformedHeader("tcp"))?;

        // Data offset nibble in 32-bit words, masked to at most 60 bytes.
        let header_len = usize::from((offset_byte >> 2) & 0x3c);
        if header_len < TCP_MIN_HEADER_LEN {
            return Err(DecodeError::MalformedHeader("tcp"));
        }
        if header_len > segment.len() {
            return Err(DecodeError::Truncated {
                layer: "tcp",
                needed: header_len,
                available: segment.len(),
            });
        }

        Ok(Self {
            core: core.clone(),
            source,
            destination,
            source_port,
            destination_port,
            sequence,
            acknowledgement,
            flags,
            header_len,
        })
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn acknowledgement(&self) -> u32 {
        self.acknowledgement
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }
}

#[derive(Debug, Clone)]
pub struct UdpPacket {
    pub core: PacketCore,
    pub source: Arc<LogicalAddressMapping>,
    pub destination: Arc<LogicalAddressMapping>,
    source_port: u16,
    destination_port: u16,
    length: u16,
}

impl UdpPacket {
    pub fn parse(
        core: &PacketCore,
        source: Arc<LogicalAddressMapping>,
        destination: Arc<LogicalAddressMapping>,
    ) -> Result<Self, DecodeError> {
        let segment = core.payload_slice();
        let mut cursor = Cursor::new(segment);
        let header = cursor
            .read_exact(UDP_HEADER_LEN)
            .ok_or(DecodeError::Truncated {
                layer: "udp",
                needed: UDP_HEADER_LEN,
                available: segment.len(),
            })?;

        let length = u16::from_be_bytes([header[4], header[5]]);
        if usize::from(length) < UDP_HEADER_LEN {
            return Err(DecodeError::MalformedHeader("udp"));
        }

        Ok(Self {
            core: core.clone(),
            source,
            destination,
            source_port: u16::from_be_bytes([header[0], header[1]]),
            destination_port: u16::from_be_bytes([header[2], header[3]]),
            length,
        })
    }

    /// Length field from the header, including the header itself.
    pub fn length(&self) -> u16 {
        self.length
    }
}

#[derive(Debug, Clone)]
pub struct IcmpPacket {
    pub core: PacketCore,
    pub source: Arc<LogicalAddressMapping>,
    pub destination: Arc<LogicalAddressMapping>,
    icmp_type: u8,
    icmp_code: u8,
}

impl IcmpPacket {
    pub fn parse(
        core: &PacketCore,
        source: Arc<LogicalAddressMapping>,
        destination: Arc<LogicalAddressMapping>,
    ) -> Result<Self, DecodeError> {
        let segment = core.payload_slice();
        if segment.len() < ICMP_HEADER_LEN {
            return Err(DecodeError::Truncated {
                layer: "icmp",
                needed: ICMP_HEADER_LEN,
                available: segment.len(),
            });
        }

        Ok(Self {
            core: core.clone(),
            source,
            destination,
            icmp_type: segment[0],
            icmp_code: segment[1],
        })
    }
}

pub trait HasPort {
    fn source_port(&self) -> u16;
    fn destination_port(&self) -> u16;
}

pub trait HasIcmpFields {
    fn icmp_type(&self) -> u8;
    fn icmp_code(&self) -> u8;
}

impl HasPort for TcpPacket {
    fn source_port(&self) -> u16 {
        self.source_port
    }

    fn destination_port(&self) -> u16 {
        self.destination_port
    }
}

impl HasPort for UdpPacket {
    fn source_port(&self) -> u16 {
        self.source_port
    }

    fn destination_port(&self) -> u16 {
        self.destination_port
    }
}

impl HasIcmpFields for IcmpPacket {
    fn icmp_type(&self) -> u8 {
        self.icmp_type
    }

    fn icmp_code(&self) -> u8 {
        self.icmp_code
    }
}

/// One decoded packet.
///
/// Every variant views the same shared buffer through offsets; cloning a
/// record or taking its payload never copies packet bytes.
#[derive(Debug, Clone)]
pub enum PacketRecord {
    Ethernet(IpPacket),
    Tcp(TcpPacket),
    Udp(UdpPacket),
    Icmp(IcmpPacket),
}

impl PacketRecord {
    pub fn core(&self) -> &PacketCore {
        match self {
            PacketRecord::Ethernet(packet) => &packet.core,
            PacketRecord::Tcp(packet) => &packet.core,
            PacketRecord::Udp(packet) => &packet.core,
            PacketRecord::Icmp(packet) => &packet.core,
        }
    }

    pub fn metadata(&self) -> &PacketMetadata {
        &self.core().metadata
    }

    pub fn source(&self) -> &Arc<LogicalAddressMapping> {
        match self {
            PacketRecord::Ethernet(packet) => &packet.source,
            PacketRecord::Tcp(packet) => &packet.source,
            PacketRecord::Udp(packet) => &packet.source,
            PacketRecord::Icmp(packet) => &packet.source,
        }
    }

    pub fn destination(&self) -> &Arc<LogicalAddressMapping> {
        match self {
            PacketRecord::Ethernet(packet) => &packet.destination,
            PacketRecord::Tcp(packet) => &packet.destination,
            PacketRecord::Udp(packet) => &packet.destination,
            PacketRecord::Icmp(packet) => &packet.destination,
        }
    }

    pub fn protocol(&self) -> u8 {
        self.core().protocol
    }

    pub fn ttl(&self) -> u8 {
        self.core().ttl
    }

    pub fn ethertype(&self) -> u16 {
        self.core().ethertype
    }

    pub fn size(&self) -> usize {
        self.core().size()
    }

    /// Range of this record's payload within the shared buffer: past the
    /// transport header for TCP/UDP/ICMP, past the IP header otherwise.
    pub fn payload_range(&self) -> Range<usize> {
        let range = self.core().payload_range();
        let (skip, end) = match self {
            PacketRecord::Ethernet(_) => (0, range.end),
            PacketRecord::Tcp(packet) => (packet.header_len, range.end),
            // The length field bounds the datagram; anything after it is padding.
            PacketRecord::Udp(packet) => (
                UDP_HEADER_LEN,
                (range.start + usize::from(packet.length)).min(range.end),
            ),
            PacketRecord::Icmp(_) => (ICMP_HEADER_LEN, range.end),
        };

        (range.start + skip).min(end)..end
    }

    pub fn payload(&self) -> Bytes {
        self.core().buffer().slice(self.payload_range())
    }

    pub fn ports(&self) -> Option<(u16, u16)> {
        match self {
            PacketRecord::Tcp(packet) => Some((packet.source_port(), packet.destination_port())),
            PacketRecord::Udp(packet) => Some((packet.source_port(), packet.destination_port())),
            _ => None,
        }
    }

    pub fn as_icmp(&self) -> Option<&IcmpPacket> {
        match self {
            PacketRecord::Icmp(packet) => Some(packet),
            _ => None,
        }
    }

    pub fn is_icmp(&self) -> bool {
        matches!(self, PacketRecord::Icmp(_))
    }
}

impl Progress for PacketRecord {
    fn import_source(&self) -> Option<&Arc<dyn ImportSource>> {
        self.metadata().import_source.as_ref()
    }

    fn progress_amount(&self) -> i64 {
        i64::try_from(self.size()).unwrap_or(i64::MAX)
    }
}
