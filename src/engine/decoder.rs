use std::net::Ipv4Addr;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use super::constants::{ETHERNET_HEADER_LEN, ethertype, ethertype_name, ip_proto, ip_protocol_name};
use super::context::DecodeConfig;
use super::error::{DecodeError, Result};
use super::headers::{EthernetHeader, Ipv4Header};
use crate::address::{
    AddressRegistry, EPHEMERAL_PORT_FLOOR, HardwareAddress, LogicalAddress, LogicalAddressMapping,
    Transport,
};
use crate::packet::{
    IcmpPacket, ImportSource, IpPacket, PacketCore, PacketMetadata, PacketRecord, TcpPacket,
    UdpPacket,
};
use crate::pipeline::{ConfigError, Item, ItemSink};
use crate::state::{Fragment, FragmentTable};

/// Stateful decoder for the frames of one capture source.
///
/// Owns the fragment table and the address registry for that source, so two
/// captures never share canonical instances. Everything it produces, records
/// and first-seen addresses alike, goes to `sink` in discovery order.
#[derive(Debug)]
pub struct PacketDecoder<S> {
    config: DecodeConfig,
    import_source: Option<Arc<dyn ImportSource>>,
    registry: AddressRegistry,
    fragments: FragmentTable,
    sink: S,
}

struct Endpoints {
    source: HardwareAddress,
    destination: HardwareAddress,
}

impl<S: ItemSink> PacketDecoder<S> {
    pub fn new(
        config: DecodeConfig,
        import_source: Option<Arc<dyn ImportSource>>,
        sink: S,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let fragments = FragmentTable::new(config.max_pending_fragments);
        Ok(Self {
            config,
            import_source,
            registry: AddressRegistry::new(),
            fragments,
            sink,
        })
    }

    /// Decodes one link-layer frame.
    ///
    /// Returns the number of bytes to credit against the import: the frame
    /// size when a record was emitted, zero when the frame was dropped or is a
    /// fragment still waiting for the rest of its datagram.
    pub fn decode(
        &mut self,
        frame: impl Into<Bytes>,
        captured_ms: i64,
        frame_index: Option<u64>,
    ) -> Result<u64> {
        let frame = frame.into();
        let mut ethernet = EthernetHeader::parse(&frame)?;

        let mut endpoints = self.endpoints(&ethernet);
        self.registry
            .record_link(endpoints.source, endpoints.destination, &mut self.sink);

        if ethernet.ethertype != ethertype::IPV4 {
            trace!(
                ethertype = ethernet.ethertype,
                name = ethertype_name(ethernet.ethertype),
                "dropping non-ipv4 frame"
            );
            return Ok(0);
        }

        let network = &frame[ETHERNET_HEADER_LEN..];
        match Ipv4Header::version(network) {
            Some(4) => {}
            Some(version) => {
                trace!(version, "dropping non-ipv4 network header");
                return Ok(0);
            }
            None => {
                return Err(DecodeError::Truncated {
                    layer: "ipv4",
                    needed: 1,
                    available: 0,
                });
            }
        }
        let mut ip = Ipv4Header::parse(network)?;

        let (buffer, payload_end) = if ip.is_fragment() {
            let Some(buffer) = self.reassemble(&frame, &ip) else {
                return Ok(0);
            };
            // The datagram now carries the final fragment's headers.
            ethernet = EthernetHeader::parse(&buffer)?;
            ip = Ipv4Header::parse(&buffer[ETHERNET_HEADER_LEN..])?;
            endpoints = self.endpoints(&ethernet);
            let end = buffer.len();
            (buffer, end)
        } else {
            let end = ETHERNET_HEADER_LEN + ip.datagram_end(network);
            (frame, end)
        };

        let metadata = PacketMetadata {
            import_source: self.import_source.clone(),
            frame: frame_index,
            captured_ms,
        };
        let core = PacketCore::new(
            metadata,
            buffer,
            ethernet.ethertype,
            ip.protocol,
            ip.ttl,
            ETHERNET_HEADER_LEN,
            ETHERNET_HEADER_LEN + ip.header_len,
            payload_end,
        )?;
        let size = core.size();

        let record = match ip.protocol {
            ip_proto::TCP => self.ported_record(core, &ip, &endpoints, Transport::Tcp),
            ip_proto::UDP => self.ported_record(core, &ip, &endpoints, Transport::Udp),
            ip_proto::ICMP => self.icmp_record(core, &ip, &endpoints),
            protocol => {
                trace!(protocol, name = ip_protocol_name(protocol), "ip-level record");
                self.ip_record(core, &ip, &endpoints)
            }
        };

        self.sink.deliver(Item::new(record));
        Ok(u64::try_from(size).unwrap_or(u64::MAX))
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    pub fn pending_fragments(&self) -> usize {
        self.fragments.pending()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn endpoints(&mut self, ethernet: &EthernetHeader) -> Endpoints {
        let source = self.registry.canonicalize_mac(ethernet.source, &mut self.sink);
        let destination = self
            .registry
            .canonicalize_mac(ethernet.destination, &mut self.sink);
        Endpoints {
            source: *source,
            destination: *destination,
        }
    }

    /// Feeds a fragment to the table. On completion the result is the final
    /// fragment's Ethernet and IP headers followed by the whole payload,
    /// whichever fragment arrived last.
    fn reassemble(&mut self, frame: &Bytes, ip: &Ipv4Header) -> Option<Bytes> {
        let headers_end = ETHERNET_HEADER_LEN + ip.header_len;
        let payload_end = ETHERNET_HEADER_LEN + ip.datagram_end(&frame[ETHERNET_HEADER_LEN..]);
        let fragment = Fragment {
            offset: ip.fragment_offset,
            declared_len: ip.total_length - ip.header_len,
            more_fragments: ip.more_fragments,
            headers: &frame[..headers_end],
            payload: &frame[headers_end..payload_end],
        };

        let datagram = self.fragments.insert(ip.identification, fragment)?;
        debug!(
            identification = ip.identification,
            payload_len = datagram.payload.len(),
            "ipv4 fragments complete"
        );

        let mut assembled =
            BytesMut::with_capacity(datagram.headers.len() + datagram.payload.len());
        assembled.put_slice(&datagram.headers);
        assembled.put_slice(&datagram.payload);
        Some(assembled.freeze())
    }

    fn ip_mappings(
        &mut self,
        ip: &Ipv4Header,
        endpoints: &Endpoints,
    ) -> (Arc<LogicalAddressMapping>, Arc<LogicalAddressMapping>) {
        let source = self.registry.canonicalize_mapping(
            LogicalAddressMapping::new(endpoints.source, LogicalAddress::Ipv4(ip.source)),
            &mut self.sink,
        );
        let destination = self.registry.canonicalize_mapping(
            LogicalAddressMapping::new(endpoints.destination, LogicalAddress::Ipv4(ip.destination)),
            &mut self.sink,
        );
        (source, destination)
    }

    fn ip_record(&mut self, core: PacketCore, ip: &Ipv4Header, endpoints: &Endpoints) -> PacketRecord {
        let (source, destination) = self.ip_mappings(ip, endpoints);
        PacketRecord::Ethernet(IpPacket {
            core,
            source,
            destination,
        })
    }

    fn icmp_record(&mut self, core: PacketCore, ip: &Ipv4Header, endpoints: &Endpoints) -> PacketRecord {
        let (source, destination) = self.ip_mappings(ip, endpoints);
        match IcmpPacket::parse(&core, Arc::clone(&source), Arc::clone(&destination)) {
            Ok(packet) => PacketRecord::Icmp(packet),
            Err(err) => {
                warn!(error = %err, "icmp header unusable, keeping ip-level record");
                PacketRecord::Ethernet(IpPacket {
                    core,
                    source,
                    destination,
                })
            }
        }
    }

    /// TCP or UDP. Port-qualified mappings are only canonicalized once the
    /// transport header has parsed; the mappings handed to the parser are
    /// replaced afterwards.
    fn ported_record(
        &mut self,
        core: PacketCore,
        ip: &Ipv4Header,
        endpoints: &Endpoints,
        transport: Transport,
    ) -> PacketRecord {
        let provisional_source = Arc::new(LogicalAddressMapping::new(
            endpoints.source,
            LogicalAddress::Ipv4(ip.source),
        ));
        let provisional_destination = Arc::new(LogicalAddressMapping::new(
            endpoints.destination,
            LogicalAddress::Ipv4(ip.destination),
        ));

        let parsed = match transport {
            Transport::Tcp => {
                TcpPacket::parse(&core, provisional_source, provisional_destination)
                    .map(PacketRecord::Tcp)
            }
            Transport::Udp => {
                UdpPacket::parse(&core, provisional_source, provisional_destination)
                    .map(PacketRecord::Udp)
            }
        };

        let mut record = match parsed {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    protocol = ip_protocol_name(ip.protocol),
                    error = %err,
                    "transport header unusable, keeping ip-level record"
                );
                return self.ip_record(core, ip, endpoints);
            }
        };

        let Some((source_port, destination_port)) = record.ports() else {
            return record;
        };
        let source = self.port_mapping(endpoints.source, ip.source, transport, source_port);
        let destination =
            self.port_mapping(endpoints.destination, ip.destination, transport, destination_port);

        match &mut record {
            PacketRecord::Tcp(packet) => {
                packet.source = source;
                packet.destination = destination;
            }
            PacketRecord::Udp(packet) => {
                packet.source = source;
                packet.destination = destination;
            }
            PacketRecord::Ethernet(_) | PacketRecord::Icmp(_) => {}
        }
        record
    }

    fn port_mapping(
        &mut self,
        hardware: HardwareAddress,
        address: Ipv4Addr,
        transport: Transport,
        port: u16,
    ) -> Arc<LogicalAddressMapping> {
        let mut logical = LogicalAddress::with_port(address, transport, port);
        if !self.config.enumerate_ephemeral_ports && port >= EPHEMERAL_PORT_FLOOR {
            logical = logical.tag_ephemeral();
        }
        self.registry
            .canonicalize_mapping(LogicalAddressMapping::new(hardware, logical), &mut self.sink)
    }
}
