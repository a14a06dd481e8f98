use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::pulse::Tick;
use crate::pipeline::{
    DEFAULT_OUTPUT, Item, OutputTable, Outputs, Stage, TypeFilter, TypeMatcher,
};

pub const PULSE_OUTPUT: &str = "pulse";

/// Items remembered between ticks, deduplicated by identity.
pub type BroadcastMemory = Arc<Mutex<Remembered>>;

/// Insertion-ordered set of items keyed on [`Item::identity`].
#[derive(Debug, Default)]
pub struct Remembered {
    seen: HashSet<usize>,
    items: Vec<Item>,
}

impl Remembered {
    /// Returns false when this exact item is already held.
    pub fn insert(&mut self, item: Item) -> bool {
        if !self.seen.insert(item.identity()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    fn take(&mut self) -> Vec<Item> {
        self.seen.clear();
        std::mem::take(&mut self.items)
    }
}

/// Snapshot of a Broadcast stage's memory taken on one tick.
#[derive(Debug, Clone)]
pub struct Batch {
    pub tick: Tick,
    pub items: Vec<Item>,
}

/// Clones share one memory, so several Broadcast stages built from the same
/// configuration accumulate into and drain one set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub forget_after_broadcast: bool,
    #[serde(skip)]
    pub memory: BroadcastMemory,
}

impl BroadcastConfig {
    pub fn new(forget_after_broadcast: bool) -> Self {
        Self {
            forget_after_broadcast,
            memory: BroadcastMemory::default(),
        }
    }
}

/// Accumulates items and re-emits them as a [`Batch`] on every [`Tick`].
#[derive(Debug)]
pub struct Broadcast {
    config: BroadcastConfig,
}

impl Broadcast {
    pub fn new(config: BroadcastConfig) -> Self {
        Self { config }
    }

    fn remember(&self, item: Item) {
        self.config.memory.lock().insert(item);
    }

    fn snapshot(&self) -> Vec<Item> {
        let mut memory = self.config.memory.lock();
        if self.config.forget_after_broadcast {
            memory.take()
        } else {
            memory.items().to_vec()
        }
    }
}

impl Stage for Broadcast {
    fn define_outputs(&self, outputs: &mut OutputTable) {
        outputs.disallow(DEFAULT_OUTPUT, [TypeMatcher::of::<Tick>()]);
        outputs.define(PULSE_OUTPUT, TypeFilter::only([TypeMatcher::of::<Tick>()]));
    }

    fn process(&mut self, item: Item, outputs: &Outputs) -> Option<Item> {
        let Some(tick) = item.downcast_ref::<Tick>() else {
            self.remember(item);
            return None;
        };

        let items = self.snapshot();
        debug!(tick = tick.0, items = items.len(), "broadcasting");
        outputs.emit(DEFAULT_OUTPUT, Item::new(Batch { tick: *tick, items }));
        Some(item)
    }
}
