use std::collections::HashSet;
use std::sync::Arc;

use pxb_core::JobId;
use tokio::sync::RwLock;

/// Jobs this daemon process is currently driving.
///
/// Owned by the serving layer: the store is authoritative and the orchestrator never
/// reads this. Entries are removed when a run ends, so the set only holds live runs.
#[derive(Clone, Default)]
pub struct JobTracker {
    inner: Arc<RwLock<HashSet<JobId>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn started(&self, job_id: JobId) {
        self.inner.write().await.insert(job_id);
    }

    pub async fn finished(&self, job_id: JobId) {
        self.inner.write().await.remove(&job_id);
    }

    pub async fn is_driving(&self, job_id: JobId) -> bool {
        self.inner.read().await.contains(&job_id)
    }

    pub async fn active(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.inner.read().await.iter().copied().collect();
        ids.sort();
        ids
    }
}
