//! The property graph the pipeline builds, seen through [`GraphSink`].

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{AddressPair, HardwareAddress, LogicalAddressMapping};

pub use memory::MemoryGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeRef(pub u64);

/// One observed value of a named property.
///
/// `confidence` runs from 0 (asserted by the user) to 5 (never directly
/// observed); lower wins when sources disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Property {
    pub value: String,
    pub confidence: u8,
}

impl Property {
    pub fn new(value: impl Into<String>, confidence: u8) -> Self {
        Self {
            value: value.into(),
            confidence,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.confidence)
    }
}

/// Property name to the values reported for it.
pub type PropertyMap = BTreeMap<String, Vec<Property>>;

/// Merges `incoming` into `existing`, skipping values already present.
pub fn merge_properties(existing: &mut PropertyMap, incoming: &PropertyMap) {
    for (name, values) in incoming {
        let slot = existing.entry(name.clone()).or_default();
        for value in values {
            if !slot.contains(value) {
                slot.push(value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    /// The source's earlier properties on the element are discarded.
    Replace,
    Append,
}

/// Graph element a property update is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyTarget {
    HardwareVertex(HardwareAddress),
    LogicalVertex(LogicalAddressMapping),
    /// Edge between two logical address mappings.
    LogicalConnection(AddressPair),
    /// Edge between two hardware addresses.
    PhysicalConnection(AddressPair),
}

/// Properties reported by one source about one graph element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyUpdate {
    pub source: String,
    pub target: PropertyTarget,
    pub properties: PropertyMap,
}

impl PropertyUpdate {
    pub fn new(source: impl Into<String>, target: PropertyTarget) -> Self {
        Self {
            source: source.into(),
            target,
            properties: PropertyMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.entry(name.into()).or_default().push(property);
        self
    }
}

/// Storage the graph-building stages mutate.
///
/// Shared by every stage of a pipeline, so implementations synchronize
/// internally. Edges are undirected: `(a, b)` and `(b, a)` name the same edge.
pub trait GraphSink: Send + Sync {
    fn hardware_vertex_for(&self, address: &HardwareAddress) -> VertexRef;

    /// Also ensures the vertex of the mapping's hardware address.
    fn logical_vertex_for(&self, mapping: &LogicalAddressMapping) -> VertexRef;

    fn create_edge_between(&self, pair: &AddressPair) -> EdgeRef;

    fn existing_edge_between(&self, pair: &AddressPair) -> Option<EdgeRef>;

    fn existing_hardware_vertex(&self, address: &HardwareAddress) -> Option<VertexRef>;

    fn existing_logical_vertex(&self, mapping: &LogicalAddressMapping) -> Option<VertexRef>;

    fn apply_vertex_properties(
        &self,
        vertex: VertexRef,
        source: &str,
        properties: &PropertyMap,
        mode: PropertyMode,
    );

    fn apply_edge_properties(
        &self,
        edge: EdgeRef,
        source: &str,
        properties: &PropertyMap,
        mode: PropertyMode,
    );
}

#[cfg(test)]
mod tests {
    use super::{Property, PropertyMap, merge_properties};

    #[test]
    fn merge_skips_duplicates() {
        let mut existing = PropertyMap::new();
        existing.insert("vendor".to_string(), vec![Property::new("acme", 3)]);

        let mut incoming = PropertyMap::new();
        incoming.insert(
            "vendor".to_string(),
            vec![Property::new("acme", 3), Property::new("acme", 1)],
        );
        incoming.insert("role".to_string(), vec![Property::new("gateway", 2)]);

        merge_properties(&mut existing, &incoming);
        assert_eq!(existing["vendor"].len(), 2);
        assert_eq!(existing["role"], vec![Property::new("gateway", 2)]);
    }
}
