use serde::{Deserialize, Serialize};

use crate::pipeline::ConfigError;

/// Decoder options, fixed for the lifetime of one decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Keep every port distinct instead of tagging ports >= 1024 as ephemeral.
    pub enumerate_ephemeral_ports: bool,
    /// Upper bound on incomplete datagrams held for reassembly. `None` keeps
    /// them until they complete.
    pub max_pending_fragments: Option<usize>,
}

impl DecodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_pending_fragments {
            Some(0) => Err(ConfigError::NotPositive {
                field: "max_pending_fragments",
                value: 0,
            }),
            _ => Ok(()),
        }
    }
}
