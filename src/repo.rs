//! Repository of launched services, keyed by pid.

use crate::service::LaunchedService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Thread-safe mapping from pid to the service launched under it.
///
/// Entries are added by the launcher during startup and removed by
/// the supervisor once the pid has been reaped (or once, in bulk,
/// during shutdown wind-down). A pid being present means this
/// process launched it; it does not mean the process is still alive,
/// since there is a window between death and reap dispatch.
#[derive(Clone, Default)]
pub struct ServiceRepository {
    services: Arc<RwLock<HashMap<i32, LaunchedService>>>,
}

impl ServiceRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a launched service under its pid.
    pub async fn add(&self, service: LaunchedService) {
        let pid = service.pid;
        self.services.write().await.insert(pid, service);
        debug!(pid = pid, "Registered service");
    }

    /// Remove and return the service launched under `pid`, if any.
    ///
    /// The return value is the sole classification signal for reaped
    /// pids: `Some` means a managed service, `None` a re-parented
    /// orphan.
    pub async fn remove(&self, pid: i32) -> Option<LaunchedService> {
        self.services.write().await.remove(&pid)
    }

    /// Snapshot of the registered pids, in no particular order.
    pub async fn pids(&self) -> Vec<i32> {
        self.services.read().await.keys().copied().collect()
    }

    /// Number of registered services.
    pub async fn count(&self) -> usize {
        self.services.read().await.len()
    }

    /// Drop and return every remaining entry.
    pub async fn clear(&self) -> Vec<LaunchedService> {
        self.services
            .write()
            .await
            .drain()
            .map(|(_, service)| service)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceSpec;

    fn service(pid: i32) -> LaunchedService {
        LaunchedService {
            spec: ServiceSpec::new("/bin/true", Vec::new()),
            pid,
        }
    }

    #[tokio::test]
    async fn remove_classifies_managed_and_foreign_pids() {
        let repo = ServiceRepository::new();
        repo.add(service(100)).await;
        repo.add(service(200)).await;

        assert_eq!(repo.count().await, 2);
        assert!(repo.remove(100).await.is_some());
        assert!(repo.remove(100).await.is_none());
        assert!(repo.remove(9999).await.is_none());
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn pids_returns_a_snapshot() {
        let repo = ServiceRepository::new();
        repo.add(service(10)).await;
        repo.add(service(20)).await;

        let mut pids = repo.pids().await;
        pids.sort_unstable();
        assert_eq!(pids, vec![10, 20]);

        // Mutating after the snapshot does not affect it.
        repo.remove(10).await;
        assert_eq!(pids.len(), 2);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn clear_drains_residual_entries() {
        let repo = ServiceRepository::new();
        repo.add(service(1)).await;
        repo.add(service(2)).await;

        let drained = repo.clear().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(repo.count().await, 0);
        assert!(repo.clear().await.is_empty());
    }
}
