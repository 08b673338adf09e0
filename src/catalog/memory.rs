//! In-memory catalog store for development and tests. Real deployments back
//! this trait with a database; nothing here persists across restarts.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Application, CatalogStore, Cluster, Command, StoreError, StoreResult};
use crate::job::{JobMetadata, JobRecord, JobRequest, JobStatus, RuntimeBinding};

#[derive(Debug, Clone)]
struct StoredJob {
    request: JobRequest,
    metadata: JobMetadata,
    record: JobRecord,
}

#[derive(Debug, Default)]
struct CatalogState {
    clusters: HashMap<String, Cluster>,
    commands: HashMap<String, Command>,
    applications: HashMap<String, Application>,
    jobs: HashMap<String, StoredJob>,
    bindings: HashMap<String, RuntimeBinding>,
}

/// Thread-safe in-memory [`CatalogStore`].
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_cluster(&self, cluster: Cluster) {
        let mut inner = self.inner.write().await;
        inner.clusters.insert(cluster.id.clone(), cluster);
    }

    pub async fn add_command(&self, command: Command) {
        let mut inner = self.inner.write().await;
        inner.commands.insert(command.id.clone(), command);
    }

    pub async fn add_application(&self, application: Application) {
        let mut inner = self.inner.write().await;
        inner.applications.insert(application.id.clone(), application);
    }

    /// All clusters, ordered by id so resolution is deterministic.
    pub async fn clusters(&self) -> Vec<Cluster> {
        let inner = self.inner.read().await;
        let mut clusters: Vec<Cluster> = inner.clusters.values().cloned().collect();
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        clusters
    }

    /// All commands, ordered by id so resolution is deterministic.
    pub async fn commands(&self) -> Vec<Command> {
        let inner = self.inner.read().await;
        let mut commands: Vec<Command> = inner.commands.values().cloned().collect();
        commands.sort_by(|a, b| a.id.cmp(&b.id));
        commands
    }

    /// The stored record for a job, if any.
    pub async fn job(&self, job_id: &str) -> Option<JobRecord> {
        let inner = self.inner.read().await;
        inner.jobs.get(job_id).map(|job| job.record.clone())
    }

    /// The submission metadata persisted with a job, if any.
    pub async fn job_metadata(&self, job_id: &str) -> Option<JobMetadata> {
        let inner = self.inner.read().await;
        inner.jobs.get(job_id).map(|job| job.metadata.clone())
    }

    /// The original request persisted with a job, if any.
    pub async fn job_request(&self, job_id: &str) -> Option<JobRequest> {
        let inner = self.inner.read().await;
        inner.jobs.get(job_id).map(|job| job.request.clone())
    }

    /// The runtime binding for a job, if resolution reached the store.
    pub async fn runtime_binding(&self, job_id: &str) -> Option<RuntimeBinding> {
        let inner = self.inner.read().await;
        inner.bindings.get(job_id).cloned()
    }

    pub async fn job_count(&self) -> usize {
        self.inner.read().await.jobs.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn create_job(
        &self,
        request: &JobRequest,
        metadata: &JobMetadata,
        record: JobRecord,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.jobs.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(format!("job {}", record.id)));
        }
        inner.jobs.insert(
            record.id.clone(),
            StoredJob {
                request: request.clone(),
                metadata: metadata.clone(),
                record,
            },
        );
        Ok(())
    }

    async fn get_cluster(&self, id: &str) -> StoreResult<Cluster> {
        let inner = self.inner.read().await;
        inner
            .clusters
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("cluster {id}")))
    }

    async fn get_command(&self, id: &str) -> StoreResult<Command> {
        let inner = self.inner.read().await;
        inner
            .commands
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("command {id}")))
    }

    async fn get_application(&self, id: &str) -> StoreResult<Application> {
        let inner = self.inner.read().await;
        inner
            .applications
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("application {id}")))
    }

    async fn update_job_with_runtime_environment(
        &self,
        job_id: &str,
        cluster_id: &str,
        command_id: &str,
        application_ids: Vec<String>,
        memory_mb: u64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.jobs.contains_key(job_id) {
            return Err(StoreError::NotFound(format!("job {job_id}")));
        }
        inner.bindings.insert(
            job_id.to_string(),
            RuntimeBinding {
                job_id: job_id.to_string(),
                cluster_id: cluster_id.to_string(),
                command_id: command_id.to_string(),
                application_ids,
                memory_mb,
            },
        );
        Ok(())
    }

    async fn get_active_job_count_for_user(&self, user: &str) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        let count = inner
            .jobs
            .values()
            .filter(|job| job.record.user == user && job.record.status.is_active())
            .count();
        Ok(count as u64)
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: &str,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;
        job.record.status = status;
        job.record.status_message = message.to_string();
        Ok(())
    }
}
