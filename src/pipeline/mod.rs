//! Queued, type-routed processing stages.

pub mod assembly;
pub mod error;
pub mod item;
pub mod output;
pub mod sink;
pub mod stage;

pub use assembly::Pipeline;
pub use error::{ConfigError, StageError};
pub use item::{Item, TypeFilter, TypeMatcher};
pub use output::{DEFAULT_OUTPUT, OutputSpec, OutputTable, Outputs};
pub use sink::ItemSink;
pub use stage::{
    DEFAULT_QUEUE_CAPACITY, Stage, StageHandle, StageOptions, StageState, StageStats,
    StageStatsSnapshot,
};
