use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, trace};

use super::error::{ConfigError, Result, StageError};
use super::item::{Item, TypeMatcher};
use super::output::{OutputTable, Outputs};
use super::sink::ItemSink;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A unit of pipeline work, run on its own worker thread.
pub trait Stage: Send + 'static {
    /// Item types taken from the input queue. Anything else offered to the
    /// stage passes straight through to its outputs. An empty list means the
    /// stage has no pull phase.
    fn accepts(&self) -> Vec<TypeMatcher> {
        vec![TypeMatcher::any()]
    }

    fn queue_capacity(&self) -> usize {
        DEFAULT_QUEUE_CAPACITY
    }

    fn define_outputs(&self, _outputs: &mut OutputTable) {}

    /// A passive stage routes every accepted item to its outputs as soon as
    /// it is queued, so `process` only returns what it adds.
    fn passive(&self) -> bool {
        false
    }

    /// Handles one accepted item. A returned item is routed to every output
    /// that admits it, and a bundle from [`Item::many`] is routed element by
    /// element; `None` means the item was fully consumed.
    fn process(&mut self, item: Item, outputs: &Outputs) -> Option<Item>;

    /// Period of `on_timer` calls, if the stage is timer-driven.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    fn on_timer(&mut self, _outputs: &Outputs) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Created,
    Running,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Overrides the stage's own queue capacity.
    pub queue_capacity: Option<usize>,
}

impl StageOptions {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self.queue_capacity {
            Some(0) => Err(ConfigError::NotPositive {
                field: "queue_capacity",
                value: 0,
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct StageStats {
    accepted: AtomicU64,
    processed: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStatsSnapshot {
    pub accepted: u64,
    pub processed: u64,
    pub delivered: u64,
    pub dropped: u64,
}

impl StageStats {
    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StageStatsSnapshot {
        StageStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct Pending {
    stage: Box<dyn Stage>,
    input: Receiver<Item>,
}

struct Shared {
    name: String,
    accepts: Vec<TypeMatcher>,
    passive: bool,
    input: Sender<Item>,
    outputs: Arc<Outputs>,
    stats: Arc<StageStats>,
    state: Mutex<StageState>,
    pending: Mutex<Option<Pending>>,
    shutdown: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to a stage and its input queue.
///
/// The queue exists from construction, so a stage that has not started yet
/// already exerts backpressure on its producers.
#[derive(Clone)]
pub struct StageHandle {
    shared: Arc<Shared>,
}

impl StageHandle {
    pub fn new(name: impl Into<String>, stage: impl Stage) -> Self {
        Self::build(name.into(), Box::new(stage), None)
    }

    pub fn with_options(
        name: impl Into<String>,
        stage: impl Stage,
        options: &StageOptions,
    ) -> std::result::Result<Self, ConfigError> {
        options.validate()?;
        Ok(Self::build(name.into(), Box::new(stage), options.queue_capacity))
    }

    fn build(name: String, stage: Box<dyn Stage>, capacity: Option<usize>) -> Self {
        let capacity = capacity.unwrap_or_else(|| stage.queue_capacity()).max(1);
        let (input_tx, input_rx) = bounded(capacity);
        let (shutdown_tx, shutdown_rx) = bounded(0);
        let stats = Arc::new(StageStats::default());

        let mut table = OutputTable::default();
        stage.define_outputs(&mut table);
        let outputs = Arc::new(Outputs::new(
            name.clone(),
            table,
            Arc::clone(&stats),
            shutdown_rx,
        ));

        Self {
            shared: Arc::new(Shared {
                name,
                accepts: stage.accepts(),
                passive: stage.passive(),
                input: input_tx,
                outputs,
                stats,
                state: Mutex::new(StageState::Created),
                pending: Mutex::new(Some(Pending {
                    stage,
                    input: input_rx,
                })),
                shutdown: Mutex::new(Some(shutdown_tx)),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> StageState {
        *self.shared.state.lock()
    }

    pub fn stats(&self) -> StageStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn outputs(&self) -> &Outputs {
        &self.shared.outputs
    }

    /// Spawns the worker thread. Starting a running stage does nothing.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        match *state {
            StageState::Running => return Ok(()),
            StageState::Closed => return Err(StageError::Closed(self.shared.name.clone())),
            StageState::Created => {}
        }

        let Some(pending) = self.shared.pending.lock().take() else {
            return Err(StageError::Closed(self.shared.name.clone()));
        };
        let worker = Worker {
            name: self.shared.name.clone(),
            stage: pending.stage,
            input: pending.input,
            shutdown: self.shared.outputs.shutdown_signal(),
            outputs: Arc::clone(&self.shared.outputs),
            stats: Arc::clone(&self.shared.stats),
        };
        let handle = thread::Builder::new()
            .name(format!("stage-{}", self.shared.name))
            .spawn(move || worker.run())
            .map_err(|err| StageError::Spawn {
                stage: self.shared.name.clone(),
                reason: err.to_string(),
            })?;

        *self.shared.worker.lock() = Some(handle);
        *state = StageState::Running;
        debug!(stage = %self.shared.name, "stage started");
        Ok(())
    }

    /// Offers an item to the stage. Accepted types are queued, blocking while
    /// the queue is full; anything else goes straight to the outputs. Passive
    /// stages also route accepted items once they are queued.
    pub fn accept(&self, item: Item) -> bool {
        if self.state() == StageState::Closed {
            trace!(stage = %self.shared.name, item = item.type_name(), "stage closed, dropping");
            return false;
        }

        if !self.shared.accepts.iter().any(|matcher| matcher.matches(&item)) {
            return self.shared.outputs.route(item);
        }

        self.shared.stats.record_accepted();
        let forwarded = self.shared.passive.then(|| item.clone());
        if self.shared.input.send(item).is_err() {
            return false;
        }
        if let Some(item) = forwarded {
            self.shared.outputs.route(item);
        }
        true
    }

    pub fn connect_output(&self, output: &str, target: &StageHandle) -> Result<()> {
        self.shared
            .outputs
            .connect(output, target.name(), target.shared.input.clone())
    }

    /// Connects an output to an arbitrary channel, such as a test tap.
    pub fn connect_sender(
        &self,
        output: &str,
        label: impl Into<String>,
        sender: Sender<Item>,
    ) -> Result<()> {
        self.shared.outputs.connect(output, label, sender)
    }

    /// Stops the worker, abandons queued items and drops all output
    /// connections. Safe to call more than once.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state == StageState::Closed {
                return;
            }
            *state = StageState::Closed;
        }

        self.shared.outputs.close();
        self.shared.shutdown.lock().take();
        self.shared.pending.lock().take();

        let worker = self.shared.worker.lock().take();
        if let Some(worker) = worker
            && worker.thread().id() != thread::current().id()
            && worker.join().is_err()
        {
            debug!(stage = %self.shared.name, "worker panicked before close");
        }
        debug!(stage = %self.shared.name, "stage closed");
    }
}

impl fmt::Debug for StageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ItemSink for StageHandle {
    fn deliver(&mut self, item: Item) {
        self.accept(item);
    }
}

struct Worker {
    name: String,
    stage: Box<dyn Stage>,
    input: Receiver<Item>,
    shutdown: Receiver<()>,
    outputs: Arc<Outputs>,
    stats: Arc<StageStats>,
}

impl Worker {
    fn run(mut self) {
        let span = debug_span!("stage", name = %self.name);
        let _guard = span.enter();

        let ticks = match self.stage.tick_interval() {
            Some(interval) => crossbeam_channel::tick(interval),
            None => crossbeam_channel::never(),
        };
        let shutdown = self.shutdown.clone();
        let input = if self.stage.accepts().is_empty() {
            crossbeam_channel::never()
        } else {
            self.input.clone()
        };

        loop {
            if self.outputs.is_closed() {
                break;
            }

            select! {
                recv(shutdown) -> _ => break,
                recv(ticks) -> _ => {
                    if !self.outputs.is_closed() {
                        self.stage.on_timer(&self.outputs);
                    }
                },
                recv(input) -> message => match message {
                    Ok(item) => self.handle(item),
                    Err(_) => break,
                },
            }
        }

        let abandoned = self.input.len();
        if abandoned > 0 {
            debug!(abandoned, "dropping queued items on close");
        }
    }

    fn handle(&mut self, item: Item) {
        if self.outputs.is_closed() {
            return;
        }

        self.stats.record_processed();
        if let Some(out) = self.stage.process(item, &self.outputs) {
            self.outputs.route(out);
        }
    }
}

#[cfg(test)]
mod tests;
