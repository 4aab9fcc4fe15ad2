use thiserror::Error;

use crate::core::address::DeviceAddress;

/// Reasons a run ends other than an operator shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The fixed target disconnected and no further attempt is allowed.
    #[error("disconnected from {address}, not retrying")]
    TargetLost { address: DeviceAddress },
    /// Every event sender was dropped.
    #[error("transport event channels closed")]
    TransportClosed,
}
