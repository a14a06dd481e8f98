use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The capture or import a frame came from.
///
/// Implemented by the file-replay and live-capture front ends; the core only
/// reads the path for diagnostics and credits progress as records complete.
pub trait ImportSource: Send + Sync + fmt::Debug {
    fn path(&self) -> &Path;

    fn record_progress(&self, amount: u64);
}

/// Per-frame capture context shared by every record decoded from it.
#[derive(Debug, Clone, Default)]
pub struct PacketMetadata {
    /// `None` for live captures with no file-backed origin.
    pub import_source: Option<Arc<dyn ImportSource>>,
    pub frame: Option<u64>,
    /// Milliseconds since the Unix epoch.
    pub captured_ms: i64,
}

impl PacketMetadata {
    pub fn source_path(&self) -> Option<&Path> {
        self.import_source.as_deref().map(|source| source.path())
    }
}

/// Records that carry import progress.
pub trait Progress {
    fn import_source(&self) -> Option<&Arc<dyn ImportSource>>;

    /// Bytes to credit; non-positive amounts are ignored.
    fn progress_amount(&self) -> i64;
}

/// Progress to credit for input that produced no packet record.
#[derive(Debug, Clone)]
pub struct ProgressCredit {
    pub source: Option<Arc<dyn ImportSource>>,
    pub amount: i64,
}

impl Progress for ProgressCredit {
    fn import_source(&self) -> Option<&Arc<dyn ImportSource>> {
        self.source.as_ref()
    }

    fn progress_amount(&self) -> i64 {
        self.amount
    }
}
