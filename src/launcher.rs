//! Launching the initial set of services.

use crate::error::{Error, Result};
use crate::repo::ServiceRepository;
use crate::service::{LaunchedService, ServiceSpec};
use std::process::Command;
use tracing::info;

/// Spawns the initial batch of services and registers each pid in
/// the repository.
pub struct ServiceLauncher {
    repo: ServiceRepository,
}

impl ServiceLauncher {
    /// Create a launcher that registers spawned pids in `repo`.
    pub fn new(repo: ServiceRepository) -> Self {
        Self { repo }
    }

    /// Spawn each spec in order.
    ///
    /// A failed spawn aborts the batch without rolling back earlier
    /// spawns; the supervisor's shutdown sequence cleans those up.
    pub async fn launch(&self, specs: &[ServiceSpec]) -> Result<()> {
        for spec in specs {
            self.launch_one(spec).await?;
        }
        Ok(())
    }

    async fn launch_one(&self, spec: &ServiceSpec) -> Result<()> {
        // std Command, not tokio: the runtime must never install its
        // own child reaping, which would race the waitpid(-1) loop.
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let pid = child.id() as i32;
        // The handle is dropped without waiting; the reaper owns
        // collection of the exit status.
        drop(child);

        info!(service = %spec, pid = pid, "Launched service");
        self.repo
            .add(LaunchedService {
                spec: spec.clone(),
                pid,
            })
            .await;
        Ok(())
    }
}
