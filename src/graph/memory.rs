use std::collections::HashMap;

use parking_lot::RwLock;

use super::{
    EdgeRef, GraphSink, PropertyMap, PropertyMode, VertexRef, merge_properties,
};
use crate::address::{AddressPair, HardwareAddress, LogicalAddressMapping};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    hardware: HashMap<HardwareAddress, VertexRef>,
    logical: HashMap<LogicalAddressMapping, VertexRef>,
    edges: HashMap<AddressPair, EdgeRef>,
    vertex_properties: HashMap<VertexRef, HashMap<String, PropertyMap>>,
    edge_properties: HashMap<EdgeRef, HashMap<String, PropertyMap>>,
}

impl Inner {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn hardware_vertex(&mut self, address: &HardwareAddress) -> VertexRef {
        if let Some(vertex) = self.hardware.get(address) {
            return *vertex;
        }
        let vertex = VertexRef(self.allocate());
        self.hardware.insert(*address, vertex);
        vertex
    }
}

fn apply(
    slot: &mut HashMap<String, PropertyMap>,
    source: &str,
    properties: &PropertyMap,
    mode: PropertyMode,
) {
    match mode {
        PropertyMode::Replace => {
            slot.insert(source.to_string(), properties.clone());
        }
        PropertyMode::Append => {
            merge_properties(slot.entry(source.to_string()).or_default(), properties);
        }
    }
}

/// In-process [`GraphSink`] backed by hash maps under one lock.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hardware_vertex_count(&self) -> usize {
        self.inner.read().hardware.len()
    }

    pub fn logical_vertex_count(&self) -> usize {
        self.inner.read().logical.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    pub fn edges(&self) -> Vec<AddressPair> {
        let mut edges: Vec<_> = self.inner.read().edges.keys().copied().collect();
        edges.sort();
        edges
    }

    pub fn vertex_properties(&self, vertex: VertexRef, source: &str) -> Option<PropertyMap> {
        self.inner
            .read()
            .vertex_properties
            .get(&vertex)
            .and_then(|sources| sources.get(source))
            .cloned()
    }

    pub fn edge_properties(&self, edge: EdgeRef, source: &str) -> Option<PropertyMap> {
        self.inner
            .read()
            .edge_properties
            .get(&edge)
            .and_then(|sources| sources.get(source))
            .cloned()
    }
}

impl GraphSink for MemoryGraph {
    fn hardware_vertex_for(&self, address: &HardwareAddress) -> VertexRef {
        self.inner.write().hardware_vertex(address)
    }

    fn logical_vertex_for(&self, mapping: &LogicalAddressMapping) -> VertexRef {
        let mut inner = self.inner.write();
        inner.hardware_vertex(&mapping.hardware);
        if let Some(vertex) = inner.logical.get(mapping) {
            return *vertex;
        }
        let vertex = VertexRef(inner.allocate());
        inner.logical.insert(*mapping, vertex);
        vertex
    }

    fn create_edge_between(&self, pair: &AddressPair) -> EdgeRef {
        let key = pair.normalized();
        let mut inner = self.inner.write();
        if let Some(edge) = inner.edges.get(&key) {
            return *edge;
        }
        let edge = EdgeRef(inner.allocate());
        inner.edges.insert(key, edge);
        edge
    }

    fn existing_edge_between(&self, pair: &AddressPair) -> Option<EdgeRef> {
        self.inner.read().edges.get(&pair.normalized()).copied()
    }

    fn existing_hardware_vertex(&self, address: &HardwareAddress) -> Option<VertexRef> {
        self.inner.read().hardware.get(address).copied()
    }

    fn existing_logical_vertex(&self, mapping: &LogicalAddressMapping) -> Option<VertexRef> {
        self.inner.read().logical.get(mapping).copied()
    }

    fn apply_vertex_properties(
        &self,
        vertex: VertexRef,
        source: &str,
        properties: &PropertyMap,
        mode: PropertyMode,
    ) {
        let mut inner = self.inner.write();
        apply(
            inner.vertex_properties.entry(vertex).or_default(),
            source,
            properties,
            mode,
        );
    }

    fn apply_edge_properties(
        &self,
        edge: EdgeRef,
        source: &str,
        properties: &PropertyMap,
        mode: PropertyMode,
    ) {
        let mut inner = self.inner.write();
        apply(
            inner.edge_properties.entry(edge).or_default(),
            source,
            properties,
            mode,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::MemoryGraph;
    use crate::address::{AddressPair, HardwareAddress, LogicalAddress, LogicalAddressMapping};
    use crate::graph::{GraphSink, Property, PropertyMap, PropertyMode};

    fn mapping(last: u8) -> LogicalAddressMapping {
        LogicalAddressMapping::new(
            HardwareAddress::new([2, 0, 0, 0, 0, last]),
            LogicalAddress::Ipv4(Ipv4Addr::new(10, 0, 0, last)),
        )
    }

    #[test]
    fn vertices_are_created_once() {
        let graph = MemoryGraph::new();
        let first = graph.logical_vertex_for(&mapping(1));
        let again = graph.logical_vertex_for(&mapping(1));

        assert_eq!(first, again);
        assert_eq!(graph.logical_vertex_count(), 1);
        assert_eq!(graph.hardware_vertex_count(), 1);
        assert!(graph.existing_hardware_vertex(&mapping(1).hardware).is_some());
        assert!(graph.existing_logical_vertex(&mapping(2)).is_none());
    }

    #[test]
    fn edges_ignore_direction() {
        let graph = MemoryGraph::new();
        let forward = AddressPair::new(mapping(1), mapping(2));
        let edge = graph.create_edge_between(&forward);

        assert_eq!(graph.create_edge_between(&forward.reverse()), edge);
        assert_eq!(graph.existing_edge_between(&forward.reverse()), Some(edge));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn replace_and_append_modes() {
        let graph = MemoryGraph::new();
        let vertex = graph.hardware_vertex_for(&HardwareAddress::new([2, 0, 0, 0, 0, 9]));

        let mut first = PropertyMap::new();
        first.insert("vendor".to_string(), vec![Property::new("acme", 4)]);
        let mut second = PropertyMap::new();
        second.insert("role".to_string(), vec![Property::new("switch", 3)]);

        graph.apply_vertex_properties(vertex, "oui", &first, PropertyMode::Append);
        graph.apply_vertex_properties(vertex, "oui", &second, PropertyMode::Append);
        let merged = graph.vertex_properties(vertex, "oui").expect("properties exist");
        assert_eq!(merged.len(), 2);

        graph.apply_vertex_properties(vertex, "oui", &second, PropertyMode::Replace);
        assert_eq!(graph.vertex_properties(vertex, "oui"), Some(second));
        assert!(graph.vertex_properties(vertex, "other").is_none());
    }
}
