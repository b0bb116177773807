//! Device error taxonomy.

use thiserror::Error;

use crate::domain::capability::Capability;
use crate::infrastructure::bluetooth::adapter::AdapterError;

/// Errors surfaced by a connection attempt or a stream operation.
///
/// Connection and discovery failures are terminal for that attempt and are
/// reported exactly once, through the result of `SensorDevice::connect`.
/// The core never retries on its own; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The adapter has no connected peripheral behind it.
    #[error("no connected peripheral")]
    InvalidPeripheral,

    /// Discovery did not complete before the deadline.
    #[error("discovery timed out")]
    TimedOut,

    /// Service discovery returned an empty result.
    #[error("no services discovered")]
    NoServices,

    /// A service returned no characteristics, or a stream was requested
    /// for a capability whose characteristics never resolved.
    #[error("no characteristics discovered")]
    NoCharacteristics,

    /// The adapter reported an error of its own.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// The peripheral disconnected while the operation was pending.
    #[error("peripheral disconnected")]
    Disconnected,

    /// A stream for this capability is already active.
    #[error("a {0:?} stream is already active")]
    AlreadyStreaming(Capability),
}
