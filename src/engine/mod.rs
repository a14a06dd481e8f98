pub mod constants;
pub mod context;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod headers;

pub use context::DecodeConfig;
pub use decoder::PacketDecoder;
pub use error::DecodeError;
pub use headers::{EthernetHeader, Ipv4Header};
