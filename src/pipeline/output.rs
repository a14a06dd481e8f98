use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::RwLock;
use tracing::{trace, warn};

use super::error::{Result, StageError};
use super::item::{Item, TypeFilter, TypeMatcher};
use super::stage::{Stage, StageStats};

pub const DEFAULT_OUTPUT: &str = "default";

#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub name: &'static str,
    pub filter: TypeFilter,
    /// Side outputs only receive explicit `emit` calls.
    pub side: bool,
}

/// Output declarations for one stage. Always holds exactly one default output.
#[derive(Debug, Clone)]
pub struct OutputTable {
    specs: Vec<OutputSpec>,
}

impl Default for OutputTable {
    fn default() -> Self {
        Self {
            specs: vec![OutputSpec {
                name: DEFAULT_OUTPUT,
                filter: TypeFilter::allow_all(),
                side: false,
            }],
        }
    }
}

impl OutputTable {
    /// Declares a routed output, replacing any earlier one of the same name.
    pub fn define(&mut self, name: &'static str, filter: TypeFilter) {
        self.insert(OutputSpec {
            name,
            filter,
            side: false,
        });
    }

    pub fn define_side_output(&mut self, name: &'static str, filter: TypeFilter) {
        self.insert(OutputSpec {
            name,
            filter,
            side: true,
        });
    }

    /// Adds deny matchers to an existing output.
    pub fn disallow(&mut self, name: &str, matchers: impl IntoIterator<Item = TypeMatcher>) {
        if let Some(spec) = self.specs.iter_mut().find(|spec| spec.name == name) {
            spec.filter.deny(matchers);
        }
    }

    pub fn get(&self, name: &str) -> Option<&OutputSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|spec| spec.name)
    }

    fn insert(&mut self, spec: OutputSpec) {
        match self.specs.iter_mut().find(|existing| existing.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }
}

#[derive(Debug, Clone)]
struct Connection {
    target: String,
    sender: Sender<Item>,
}

#[derive(Debug)]
struct Route {
    spec: OutputSpec,
    consumers: Vec<Connection>,
}

/// Live routing state for one stage: its declared outputs and whatever is
/// connected to them.
#[derive(Debug)]
pub struct Outputs {
    stage: String,
    routes: RwLock<Vec<Route>>,
    stats: Arc<StageStats>,
    shutdown: Receiver<()>,
    closed: AtomicBool,
}

impl Outputs {
    pub(crate) fn new(
        stage: String,
        table: OutputTable,
        stats: Arc<StageStats>,
        shutdown: Receiver<()>,
    ) -> Self {
        let routes = table
            .specs
            .into_iter()
            .map(|spec| Route {
                spec,
                consumers: Vec::new(),
            })
            .collect();

        Self {
            stage,
            routes: RwLock::new(routes),
            stats,
            shutdown,
            closed: AtomicBool::new(false),
        }
    }

    /// Routing state for driving a stage by hand, without a worker thread.
    pub fn standalone<S: Stage + ?Sized>(name: impl Into<String>, stage: &S) -> Self {
        let mut table = OutputTable::default();
        stage.define_outputs(&mut table);
        Self::new(
            name.into(),
            table,
            Arc::new(StageStats::default()),
            crossbeam_channel::never(),
        )
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn stats(&self) -> &StageStats {
        &self.stats
    }

    pub fn connect(
        &self,
        output: &str,
        target: impl Into<String>,
        sender: Sender<Item>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(StageError::Closed(self.stage.clone()));
        }

        let mut routes = self.routes.write();
        let route = routes
            .iter_mut()
            .find(|route| route.spec.name == output)
            .ok_or_else(|| StageError::UnknownOutput {
                stage: self.stage.clone(),
                output: output.to_string(),
            })?;
        route.consumers.push(Connection {
            target: target.into(),
            sender,
        });
        Ok(())
    }

    /// Pushes `item` to one named output. Items its filter rejects are
    /// dropped. Returns whether at least one consumer took the item.
    pub fn emit(&self, output: &str, item: Item) -> bool {
        let consumers = {
            let routes = self.routes.read();
            let Some(route) = routes.iter().find(|route| route.spec.name == output) else {
                warn!(stage = %self.stage, output, "emit to undeclared output");
                return false;
            };
            if !route.spec.filter.admits(&item) {
                trace!(stage = %self.stage, output, item = item.type_name(), "filtered out");
                self.stats.record_dropped();
                return false;
            }
            route.consumers.clone()
        };

        self.send_all(output, &consumers, item)
    }

    /// Offers `item` to every non-side output whose filter admits it. A bundle
    /// built with [`Item::many`] is routed element by element.
    pub fn route(&self, item: Item) -> bool {
        if let Some(elements) = item.downcast_ref::<Vec<Item>>() {
            let mut delivered = false;
            for element in elements {
                delivered |= self.route(element.clone());
            }
            return delivered;
        }

        let targets: Vec<(&'static str, Vec<Connection>)> = {
            let routes = self.routes.read();
            routes
                .iter()
                .filter(|route| !route.spec.side && route.spec.filter.admits(&item))
                .map(|route| (route.spec.name, route.consumers.clone()))
                .collect()
        };

        if targets.is_empty() {
            trace!(stage = %self.stage, item = item.type_name(), "no output admits item");
            self.stats.record_dropped();
            return false;
        }

        let mut delivered = false;
        for (output, consumers) in targets {
            delivered |= self.send_all(output, &consumers, item.clone());
        }
        delivered
    }

    pub fn consumer_count(&self, output: &str) -> usize {
        self.routes
            .read()
            .iter()
            .find(|route| route.spec.name == output)
            .map_or(0, |route| route.consumers.len())
    }

    pub(crate) fn shutdown_signal(&self) -> Receiver<()> {
        self.shutdown.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drops every connection. Connected queues lose this stage as a
    /// producer, which also breaks cycles in the wiring.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for route in self.routes.write().iter_mut() {
            route.consumers.clear();
        }
    }

    fn send_all(&self, output: &str, consumers: &[Connection], item: Item) -> bool {
        let mut delivered = false;
        for connection in consumers {
            if self.is_closed() {
                break;
            }
            if self.send(connection, item.clone()) {
                self.stats.record_delivered();
                delivered = true;
            } else {
                trace!(
                    stage = %self.stage,
                    output,
                    target = %connection.target,
                    "consumer unavailable"
                );
                self.stats.record_dropped();
            }
        }
        delivered
    }

    /// Blocks while the consumer's queue is full, unless this stage closes.
    fn send(&self, connection: &Connection, item: Item) -> bool {
        select! {
            send(connection.sender, item) -> sent => sent.is_ok(),
            recv(self.shutdown) -> _ => false,
        }
    }
}
