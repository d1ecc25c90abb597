//! Service descriptions and launch records.

use std::fmt;
use std::path::PathBuf;

/// Description of a service to launch: the path to the binary and
/// the arguments to pass to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Full path to the service binary.
    pub program: PathBuf,
    /// Command line arguments for the binary.
    pub args: Vec<String>,
}

impl ServiceSpec {
    /// Create a new service spec.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A service that has been spawned, together with the pid the OS
/// assigned to it. Immutable once created; dropped when the pid is
/// reaped or when shutdown winds down residual entries.
#[derive(Debug, Clone)]
pub struct LaunchedService {
    /// The spec this service was launched from.
    pub spec: ServiceSpec,
    /// Pid assigned at spawn time.
    pub pid: i32,
}

impl fmt::Display for LaunchedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.spec, self.pid)
    }
}
