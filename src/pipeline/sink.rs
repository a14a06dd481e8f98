use crossbeam_channel::Sender;
use tracing::trace;

use super::item::Item;

/// Destination for items produced outside a stage worker, such as the
/// packet decoder.
pub trait ItemSink {
    fn deliver(&mut self, item: Item);
}

impl ItemSink for Vec<Item> {
    fn deliver(&mut self, item: Item) {
        self.push(item);
    }
}

/// Blocks while the channel is full.
impl ItemSink for Sender<Item> {
    fn deliver(&mut self, item: Item) {
        if let Err(err) = self.send(item) {
            trace!(item = err.0.type_name(), "receiver gone, dropping item");
        }
    }
}

impl<S: ItemSink + ?Sized> ItemSink for &mut S {
    fn deliver(&mut self, item: Item) {
        (**self).deliver(item);
    }
}
