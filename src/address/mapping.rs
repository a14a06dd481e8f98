use std::fmt;

use super::{HardwareAddress, LogicalAddress};

/// A hardware address and a logical address observed together in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalAddressMapping {
    pub hardware: HardwareAddress,
    pub logical: LogicalAddress,
}

impl LogicalAddressMapping {
    pub fn new(hardware: HardwareAddress, logical: LogicalAddress) -> Self {
        Self { hardware, logical }
    }

    /// Same hardware binding with a different logical address.
    pub fn with_logical(&self, logical: LogicalAddress) -> Self {
        Self {
            hardware: self.hardware,
            logical,
        }
    }
}

impl fmt::Display for LogicalAddressMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.logical, self.hardware)
    }
}
