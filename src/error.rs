//! Error types for the init process.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for init operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bringing up the init process.
///
/// Everything that can go wrong after startup (wait syscall errors,
/// per-pid signal delivery failures, pump teardown timeouts) is
/// absorbed and logged where it happens; only startup failures are
/// surfaced to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Spawning a service binary failed.
    #[error("Failed to spawn service {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registering a kernel signal handler failed.
    #[error("Failed to subscribe to signal {signal}: {source}")]
    SignalSubscribe {
        signal: i32,
        #[source]
        source: std::io::Error,
    },
}
