use tracing::trace;

use crate::packet::{PacketRecord, Progress, ProgressCredit};
use crate::pipeline::{Item, Outputs, Stage, TypeMatcher};

/// Credits import progress once a record has made it through the graph
/// stages.
#[derive(Debug, Default)]
pub struct RecordCompletion;

impl RecordCompletion {
    pub fn new() -> Self {
        Self
    }
}

fn progress_of(item: &Item) -> Option<&dyn Progress> {
    if let Some(record) = item.downcast_ref::<PacketRecord>() {
        return Some(record as &dyn Progress);
    }
    item.downcast_ref::<ProgressCredit>()
        .map(|credit| credit as &dyn Progress)
}

impl Stage for RecordCompletion {
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![
            TypeMatcher::of::<PacketRecord>(),
            TypeMatcher::of::<ProgressCredit>(),
        ]
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        if let Some(progress) = progress_of(&item) {
            let amount = progress.progress_amount();
            match (progress.import_source(), u64::try_from(amount)) {
                (Some(source), Ok(amount)) if amount > 0 => source.record_progress(amount),
                _ => trace!(amount, "no progress to credit"),
            }
        }
        Some(item)
    }
}
