use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::pipeline::{Item, ItemSink};

use super::{Address, AddressPair, HardwareAddress, LogicalAddressMapping};

/// Canonicalization maps owned by one decoder.
///
/// Each distinct value gets exactly one shared instance, and that instance is
/// delivered to the sink the first time it is seen. Repeat lookups return the
/// stored `Arc` and deliver nothing.
#[derive(Debug, Default)]
pub struct AddressRegistry {
    hardware: HashMap<HardwareAddress, Arc<HardwareAddress>>,
    mappings: HashMap<LogicalAddressMapping, Arc<LogicalAddressMapping>>,
    links: HashSet<AddressPair>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canonicalize_mac<S: ItemSink + ?Sized>(
        &mut self,
        octets: [u8; 6],
        sink: &mut S,
    ) -> Arc<HardwareAddress> {
        let address = HardwareAddress::new(octets);
        if let Some(existing) = self.hardware.get(&address) {
            return Arc::clone(existing);
        }

        let canonical = Arc::new(address);
        self.hardware.insert(address, Arc::clone(&canonical));
        sink.deliver(Item::from_arc(Arc::clone(&canonical)));
        canonical
    }

    pub fn canonicalize_mapping<S: ItemSink + ?Sized>(
        &mut self,
        mapping: LogicalAddressMapping,
        sink: &mut S,
    ) -> Arc<LogicalAddressMapping> {
        if let Some(existing) = self.mappings.get(&mapping) {
            return Arc::clone(existing);
        }

        let canonical = Arc::new(mapping);
        self.mappings.insert(mapping, Arc::clone(&canonical));
        sink.deliver(Item::from_arc(Arc::clone(&canonical)));
        canonical
    }

    /// Returns true, and delivers the pair, only on first observation of
    /// `(source, destination)`.
    pub fn record_link<S: ItemSink + ?Sized>(
        &mut self,
        source: impl Into<Address>,
        destination: impl Into<Address>,
        sink: &mut S,
    ) -> bool {
        let pair = AddressPair::new(source, destination);
        if !self.links.insert(pair) {
            return false;
        }

        sink.deliver(Item::new(pair));
        true
    }

    pub fn hardware_count(&self) -> usize {
        self.hardware.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}
