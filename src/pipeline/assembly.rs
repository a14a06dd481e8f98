use std::collections::HashMap;

use tracing::debug;

use super::error::{Result, StageError};
use super::stage::StageHandle;

/// Named stages and the wiring between them, started and closed as a unit.
///
/// Wiring may form cycles; closing the pipeline closes every stage, which
/// drops every connection.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<StageHandle>,
    by_name: HashMap<String, usize>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stage: StageHandle) -> Result<StageHandle> {
        if self.by_name.contains_key(stage.name()) {
            return Err(StageError::DuplicateStage(stage.name().to_string()));
        }

        self.by_name.insert(stage.name().to_string(), self.stages.len());
        self.stages.push(stage.clone());
        Ok(stage)
    }

    pub fn stage(&self, name: &str) -> Result<&StageHandle> {
        self.by_name
            .get(name)
            .and_then(|index| self.stages.get(*index))
            .ok_or_else(|| StageError::UnknownStage(name.to_string()))
    }

    /// Connects output `output` of stage `from` to the input of stage `to`.
    pub fn connect(&self, from: &str, output: &str, to: &str) -> Result<()> {
        let source = self.stage(from)?;
        let target = self.stage(to)?;
        source.connect_output(output, target)?;
        debug!(from, output, to, "connected stages");
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        for stage in &self.stages {
            stage.start()?;
        }
        Ok(())
    }

    pub fn close(&self) {
        for stage in &self.stages {
            stage.close();
        }
    }

    pub fn stages(&self) -> impl Iterator<Item = &StageHandle> {
        self.stages.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::Pipeline;
    use crate::pipeline::error::StageError;
    use crate::pipeline::item::Item;
    use crate::pipeline::output::{DEFAULT_OUTPUT, Outputs};
    use crate::pipeline::stage::{Stage, StageHandle, StageState};

    struct Forward;

    impl Stage for Forward {
        fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
            Some(item)
        }
    }

    #[test]
    fn connects_stages_by_name() {
        let mut pipeline = Pipeline::new();
        let first = pipeline
            .add(StageHandle::new("first", Forward))
            .expect("first is unique");
        let second = pipeline
            .add(StageHandle::new("second", Forward))
            .expect("second is unique");
        pipeline
            .connect("first", DEFAULT_OUTPUT, "second")
            .expect("both stages exist");

        let (tx, rx) = unbounded();
        second
            .connect_sender(DEFAULT_OUTPUT, "tap", tx)
            .expect("default output exists");
        pipeline.start().expect("pipeline should start");

        first.accept(Item::new(5u8));
        let item = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("item should cross both stages");
        assert_eq!(item.downcast_ref::<u8>(), Some(&5));

        pipeline.close();
        assert!(pipeline.stages().all(|stage| stage.state() == StageState::Closed));
    }

    #[test]
    fn assembly_errors_are_reported() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add(StageHandle::new("only", Forward))
            .expect("first add succeeds");

        assert_eq!(
            pipeline.add(StageHandle::new("only", Forward)).map(|_| ()),
            Err(StageError::DuplicateStage("only".to_string()))
        );
        assert_eq!(
            pipeline.connect("only", DEFAULT_OUTPUT, "missing"),
            Err(StageError::UnknownStage("missing".to_string()))
        );
        assert!(matches!(
            pipeline.connect("only", "nowhere", "only"),
            Err(StageError::UnknownOutput { .. })
        ));
        pipeline.close();
    }

    #[test]
    fn cyclic_wiring_closes_cleanly() {
        let mut pipeline = Pipeline::new();
        pipeline.add(StageHandle::new("a", Forward)).expect("a is unique");
        pipeline.add(StageHandle::new("b", Forward)).expect("b is unique");
        pipeline.connect("a", DEFAULT_OUTPUT, "b").expect("a -> b");
        pipeline.connect("b", DEFAULT_OUTPUT, "a").expect("b -> a");
        pipeline.start().expect("pipeline should start");

        pipeline.close();
        for stage in pipeline.stages() {
            assert_eq!(stage.outputs().consumer_count(DEFAULT_OUTPUT), 0);
        }
    }
}
