use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("stage `{stage}` has no output named `{output}`")]
    UnknownOutput { stage: String, output: String },

    #[error("no stage named `{0}`")]
    UnknownStage(String),

    #[error("a stage named `{0}` is already registered")]
    DuplicateStage(String),

    #[error("stage `{0}` is closed")]
    Closed(String),

    #[error("failed to spawn worker for stage `{stage}`: {reason}")]
    Spawn { stage: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive integer, got {value}")]
    NotPositive { field: &'static str, value: u64 },
}

pub type Result<T> = std::result::Result<T, StageError>;
