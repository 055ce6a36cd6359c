use std::io;

use thiserror::Error;

/// Errors surfaced by device construction and the write path.
///
/// Anything else that goes wrong during a guarded operation is logged and
/// swallowed by the connection guard; see
/// [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Invalid user supplied configuration.
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),
    /// The reconnect-and-retry budget was spent without a successful write.
    #[error("write failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: io::Error,
    },
    /// Transport failure on a device whose retry policy is disabled.
    #[error(transparent)]
    Io(#[from] io::Error),
}
