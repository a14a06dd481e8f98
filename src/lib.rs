//! Passive network topology reconstruction from captured Ethernet frames.
//!
//! [`PacketDecoder`] turns frames into typed records and first-seen address
//! events; [`pipeline`] stages consume them to build a property graph behind
//! a [`GraphSink`].

pub mod address;
pub mod engine;
pub mod graph;
pub mod packet;
pub mod pipeline;
pub mod stages;
pub mod state;

pub use address::{
    Address, AddressPair, AddressParseError, AddressRegistry, HardwareAddress, LogicalAddress,
    LogicalAddressMapping, Transport,
};
pub use engine::{DecodeConfig, DecodeError, PacketDecoder};
pub use graph::{GraphSink, MemoryGraph, PropertyTarget, PropertyUpdate};
pub use packet::{ImportSource, PacketMetadata, PacketRecord, Progress, ProgressCredit};
pub use pipeline::{Item, ItemSink, Pipeline, Stage, StageError, StageHandle};
