use std::sync::Arc;

use tracing::warn;

use crate::graph::{EdgeRef, GraphSink, PropertyMode, PropertyTarget, PropertyUpdate, VertexRef};
use crate::pipeline::{Item, Outputs, Stage, TypeMatcher};

enum Resolved {
    Vertex(VertexRef),
    Edge(EdgeRef),
}

fn resolve(graph: &dyn GraphSink, target: &PropertyTarget) -> Option<Resolved> {
    match target {
        PropertyTarget::HardwareVertex(address) => {
            graph.existing_hardware_vertex(address).map(Resolved::Vertex)
        }
        PropertyTarget::LogicalVertex(mapping) => {
            graph.existing_logical_vertex(mapping).map(Resolved::Vertex)
        }
        PropertyTarget::LogicalConnection(pair) | PropertyTarget::PhysicalConnection(pair) => {
            graph.existing_edge_between(pair).map(Resolved::Edge)
        }
    }
}

/// Applies one update to an element that must already exist. Edge
/// properties always accumulate, whatever `vertex_mode` says.
fn apply(graph: &dyn GraphSink, update: &PropertyUpdate, vertex_mode: PropertyMode) {
    match resolve(graph, &update.target) {
        Some(Resolved::Vertex(vertex)) => {
            graph.apply_vertex_properties(vertex, &update.source, &update.properties, vertex_mode);
        }
        Some(Resolved::Edge(edge)) => {
            graph.apply_edge_properties(
                edge,
                &update.source,
                &update.properties,
                PropertyMode::Append,
            );
        }
        None => {
            warn!(
                source = %update.source,
                target = ?update.target,
                "property target not in graph, skipping"
            );
        }
    }
}

/// Replaces a source's properties on existing graph elements.
pub struct SetProperties {
    graph: Arc<dyn GraphSink>,
}

impl SetProperties {
    pub fn new(graph: Arc<dyn GraphSink>) -> Self {
        Self { graph }
    }
}

impl Stage for SetProperties {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![TypeMatcher::of::<PropertyUpdate>()]
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        let update = item.downcast_ref::<PropertyUpdate>()?;
        apply(self.graph.as_ref(), update, PropertyMode::Replace);
        None
    }
}

/// Merges a source's properties into existing graph elements.
pub struct AddProperties {
    graph: Arc<dyn GraphSink>,
}

impl AddProperties {
    pub fn new(graph: Arc<dyn GraphSink>) -> Self {
        Self { graph }
    }
}

impl Stage for AddProperties {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![TypeMatcher::of::<PropertyUpdate>()]
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        let update = item.downcast_ref::<PropertyUpdate>()?;
        apply(self.graph.as_ref(), update, PropertyMode::Append);
        None
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use super::{AddProperties, SetProperties};
    use crate::address::{AddressPair, HardwareAddress, LogicalAddress, LogicalAddressMapping};
    use crate::graph::{GraphSink, MemoryGraph, Property, PropertyTarget, PropertyUpdate};
    use crate::pipeline::{Item, Outputs, Stage};

    fn hardware(last: u8) -> HardwareAddress {
        HardwareAddress::new([2, 0, 0, 0, 0, last])
    }

    fn feed(stage: &mut impl Stage, update: PropertyUpdate) {
        let outputs = Outputs::standalone("properties", &*stage);
        assert!(stage.process(Item::new(update), &outputs).is_none());
    }

    #[test]
    fn set_replaces_and_add_merges_vertex_properties() {
        let graph = Arc::new(MemoryGraph::new());
        let vertex = graph.hardware_vertex_for(&hardware(1));
        let target = PropertyTarget::HardwareVertex(hardware(1));
        let mut add = AddProperties::new(graph.clone());
        let mut set = SetProperties::new(graph.clone());

        feed(
            &mut add,
            PropertyUpdate::new("oui", target).with("vendor", Property::new("acme", 4)),
        );
        feed(
            &mut add,
            PropertyUpdate::new("oui", target).with("model", Property::new("x1", 4)),
        );
        assert_eq!(
            graph.vertex_properties(vertex, "oui").map(|props| props.len()),
            Some(2)
        );

        feed(
            &mut set,
            PropertyUpdate::new("oui", target).with("vendor", Property::new("other", 2)),
        );
        let props = graph.vertex_properties(vertex, "oui").expect("properties exist");
        assert_eq!(props.len(), 1);
        assert_eq!(props["vendor"], vec![Property::new("other", 2)]);
    }

    #[test]
    fn set_on_edges_still_appends() {
        let graph = Arc::new(MemoryGraph::new());
        let pair = AddressPair::new(hardware(1), hardware(2));
        let edge = graph.create_edge_between(&pair);
        let mut set = SetProperties::new(graph.clone());
        let target = PropertyTarget::PhysicalConnection(pair.reverse());

        feed(
            &mut set,
            PropertyUpdate::new("lldp", target).with("port", Property::new("ge-0/0/1", 3)),
        );
        feed(
            &mut set,
            PropertyUpdate::new("lldp", target).with("speed", Property::new("1g", 3)),
        );

        let props = graph.edge_properties(edge, "lldp").expect("properties exist");
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn missing_targets_are_skipped() {
        let graph = Arc::new(MemoryGraph::new());
        let mut add = AddProperties::new(graph.clone());
        let mapping = LogicalAddressMapping::new(
            hardware(5),
            LogicalAddress::Ipv4(Ipv4Addr::new(10, 0, 0, 5)),
        );

        feed(
            &mut add,
            PropertyUpdate::new("dns", PropertyTarget::LogicalVertex(mapping))
                .with("name", Property::new("host.example", 3)),
        );
        assert_eq!(graph.logical_vertex_count(), 0);
        assert_eq!(graph.hardware_vertex_count(), 0);
    }
}
