//! Per-project-path concurrency control.
//!
//! The orchestrator mutates a project's session state across several
//! store calls per request; a second request for the same project
//! arriving mid-turn must wait rather than race the lifecycle transition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ProjectLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ProjectLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the orchestration lock for a project path. Held for the
    /// duration of session resolution through lifecycle apply; releases
    /// automatically on drop.
    pub async fn acquire(&self, project_path: &str) -> OwnedSemaphorePermit {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(project_path.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .expect("semaphore is never closed")
    }

    pub fn project_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop tracked locks for projects with no turn in flight.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access_on_same_project() {
        let map = ProjectLockMap::new();
        let permit1 = map.acquire("/proj").await;
        drop(permit1);
        let permit2 = map.acquire("/proj").await;
        drop(permit2);
    }

    #[tokio::test]
    async fn different_projects_run_concurrently() {
        let map = Arc::new(ProjectLockMap::new());
        let p1 = map.acquire("/proj/a").await;
        let p2 = map.acquire("/proj/b").await;
        assert_eq!(map.project_count(), 2);
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn same_project_waits_for_release() {
        let map = Arc::new(ProjectLockMap::new());
        let map2 = map.clone();

        let p1 = map.acquire("/proj").await;
        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("/proj").await;
            42
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(p1);

        let result = handle.await.unwrap();
        assert_eq!(result, 42);
    }
}
