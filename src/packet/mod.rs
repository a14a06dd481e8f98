pub mod metadata;
pub mod record;

pub use metadata::{ImportSource, PacketMetadata, Progress, ProgressCredit};
pub use record::{
    HasIcmpFields, HasPort, IcmpPacket, IpPacket, PacketCore, PacketRecord, TcpPacket, UdpPacket,
};
