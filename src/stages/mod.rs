//! Concrete stages that turn decoder output into the topology graph.

pub mod broadcast;
pub mod build_graph;
pub mod properties;
pub mod pulse;
pub mod record_completion;

pub use broadcast::{Batch, Broadcast, BroadcastConfig, BroadcastMemory, PULSE_OUTPUT, Remembered};
pub use build_graph::{
    ADDRESS_MAPPINGS, BUILD_GRAPH_QUEUE_CAPACITY, BuildGraph, HARDWARE_ADDRESSES,
    QUESTIONABLE_PACKETS, RECORDABLE_PACKETS,
};
pub use properties::{AddProperties, SetProperties};
pub use pulse::{Pulse, PulseConfig, Tick};
pub use record_completion::RecordCompletion;
