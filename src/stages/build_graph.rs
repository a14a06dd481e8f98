use std::sync::Arc;

use tracing::{debug, trace};

use crate::address::{AddressPair, HardwareAddress, LogicalAddressMapping};
use crate::engine::constants::icmp_type;
use crate::graph::GraphSink;
use crate::packet::{HasIcmpFields, IcmpPacket, PacketRecord};
use crate::pipeline::{
    DEFAULT_OUTPUT, Item, OutputTable, Outputs, Stage, TypeFilter, TypeMatcher,
};

pub const HARDWARE_ADDRESSES: &str = "hardware addresses";
pub const ADDRESS_MAPPINGS: &str = "address mappings";
pub const RECORDABLE_PACKETS: &str = "recordable packets";
pub const QUESTIONABLE_PACKETS: &str = "questionable packets";

pub const BUILD_GRAPH_QUEUE_CAPACITY: usize = 10_000;

/// Creates the vertices and edges implied by decoder output.
///
/// Everything the decoder emits for a frame goes through this one queue, so
/// vertices exist before the packets that reference them are handled.
pub struct BuildGraph {
    graph: Arc<dyn GraphSink>,
}

impl BuildGraph {
    pub fn new(graph: Arc<dyn GraphSink>) -> Self {
        Self { graph }
    }

    fn packet(&self, record: &PacketRecord, item: Item, outputs: &Outputs) -> Option<Item> {
        if let Some(icmp) = record.as_icmp()
            && icmp.icmp_type() != icmp_type::ECHO_REPLY
        {
            annotate(icmp);
            outputs.emit(QUESTIONABLE_PACKETS, item);
            return None;
        }

        let pair = AddressPair::new(**record.source(), **record.destination());
        self.graph.create_edge_between(&pair);
        Some(item)
    }
}

/// ICMP messages that describe the network rather than a conversation.
fn annotate(icmp: &IcmpPacket) {
    let annotation = match icmp.icmp_type() {
        icmp_type::DESTINATION_UNREACHABLE => "unreachable",
        icmp_type::REDIRECT => "redirected",
        icmp_type::ROUTER_ADVERTISEMENT => "gateway",
        _ => return,
    };
    debug!(
        annotation,
        source = %icmp.source,
        destination = %icmp.destination,
        "icmp annotation"
    );
}

impl Stage for BuildGraph {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![
            TypeMatcher::of::<PacketRecord>(),
            TypeMatcher::of::<HardwareAddress>(),
            TypeMatcher::of::<LogicalAddressMapping>(),
            TypeMatcher::of::<AddressPair>(),
        ]
    }

    fn queue_capacity(&self) -> usize {
        BUILD_GRAPH_QUEUE_CAPACITY
    }

    fn define_outputs(&self, outputs: &mut OutputTable) {
        outputs.define(
            HARDWARE_ADDRESSES,
            TypeFilter::only([TypeMatcher::of::<HardwareAddress>()]),
        );
        outputs.define(
            ADDRESS_MAPPINGS,
            TypeFilter::only([TypeMatcher::of::<LogicalAddressMapping>()]),
        );
        outputs.define(
            RECORDABLE_PACKETS,
            TypeFilter::only([TypeMatcher::of::<PacketRecord>()]),
        );
        outputs.define_side_output(
            QUESTIONABLE_PACKETS,
            TypeFilter::only([TypeMatcher::of::<PacketRecord>()]),
        );
        outputs.disallow(
            DEFAULT_OUTPUT,
            [
                TypeMatcher::of::<HardwareAddress>(),
                TypeMatcher::of::<LogicalAddressMapping>(),
            ],
        );
    }

    fn process(&mut self, item: Item, outputs: &Outputs) -> Option<Item> {
        if let Some(record) = item.downcast_ref::<PacketRecord>() {
            return self.packet(record, item.clone(), outputs);
        }

        if let Some(pair) = item.downcast_ref::<AddressPair>() {
            self.graph.create_edge_between(pair);
        } else if let Some(mapping) = item.downcast_ref::<LogicalAddressMapping>() {
            self.graph.logical_vertex_for(mapping);
        } else if let Some(address) = item.downcast_ref::<HardwareAddress>() {
            self.graph.hardware_vertex_for(address);
        } else {
            trace!(item = item.type_name(), "passing through");
        }
        Some(item)
    }
}
