//! Address value types and the per-decoder canonicalization registry.

pub mod hardware;
pub mod logical;
pub mod mapping;
pub mod registry;

use std::fmt;

use thiserror::Error;

pub use hardware::HardwareAddress;
pub use logical::{EPHEMERAL_PORT_FLOOR, LogicalAddress, Transport};
pub use mapping::LogicalAddressMapping;
pub use registry::AddressRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("invalid hardware address: {0}")]
    Hardware(String),

    #[error("invalid logical address: {0}")]
    Logical(String),
}

/// Either endpoint kind a link or graph edge can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    Hardware(HardwareAddress),
    Mapping(LogicalAddressMapping),
}

impl Address {
    pub fn hardware(&self) -> HardwareAddress {
        match self {
            Address::Hardware(hardware) => *hardware,
            Address::Mapping(mapping) => mapping.hardware,
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Address::Hardware(_))
    }
}

impl From<HardwareAddress> for Address {
    fn from(address: HardwareAddress) -> Self {
        Address::Hardware(address)
    }
}

impl From<LogicalAddressMapping> for Address {
    fn from(mapping: LogicalAddressMapping) -> Self {
        Address::Mapping(mapping)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Hardware(hardware) => hardware.fmt(f),
            Address::Mapping(mapping) => mapping.fmt(f),
        }
    }
}

/// Ordered (source, destination) pair used as a link key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressPair {
    pub source: Address,
    pub destination: Address,
}

impl AddressPair {
    pub fn new(source: impl Into<Address>, destination: impl Into<Address>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn reverse(&self) -> Self {
        Self {
            source: self.destination,
            destination: self.source,
        }
    }

    /// Direction-independent form: the smaller endpoint first.
    pub fn normalized(&self) -> Self {
        if self.source <= self.destination {
            *self
        } else {
            self.reverse()
        }
    }

    /// True when both endpoints are bare hardware addresses.
    pub fn is_hardware(&self) -> bool {
        self.source.is_hardware() && self.destination.is_hardware()
    }
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressPair, HardwareAddress};

    #[test]
    fn normalized_pair_ignores_direction() {
        let a = HardwareAddress::new([0, 0, 0, 0, 0, 1]);
        let b = HardwareAddress::new([0, 0, 0, 0, 0, 2]);
        let forward = AddressPair::new(a, b);
        let backward = AddressPair::new(b, a);

        assert_ne!(forward, backward);
        assert_eq!(forward.normalized(), backward.normalized());
        assert!(forward.is_hardware());
    }
}
