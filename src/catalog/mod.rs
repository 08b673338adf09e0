pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobMetadata, JobRecord, JobRequest, JobStatus};

/// Errors surfaced by catalog store implementations. The coordinator
/// classifies these per call site; the store never decides the rejection
/// class itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A cluster jobs can be resolved onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub tags: BTreeSet<String>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// An executable registered in the catalog. Carries the ordered ids of the
/// applications it depends on and an optional default memory reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub name: String,
    pub tags: BTreeSet<String>,
    /// Default memory in MB when the request does not ask for any.
    pub memory: Option<u64>,
    pub applications: Vec<String>,
}

impl Command {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: BTreeSet::new(),
            memory: None,
            applications: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_memory(mut self, memory_mb: u64) -> Self {
        self.memory = Some(memory_mb);
        self
    }

    pub fn with_applications<I, S>(mut self, applications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applications = applications.into_iter().map(Into::into).collect();
        self
    }
}

/// A dependency bundle a command needs at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub tags: BTreeSet<String>,
}

impl Application {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Durable storage of applications, commands, clusters and jobs.
///
/// Catalog entities are read-only from the coordinator's perspective; job
/// rows are written through the job-write operations only.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Persist a new job record along with the submission it came from.
    /// Fails with [`StoreError::AlreadyExists`] when the job id is taken.
    async fn create_job(
        &self,
        request: &JobRequest,
        metadata: &JobMetadata,
        record: JobRecord,
    ) -> StoreResult<()>;

    async fn get_cluster(&self, id: &str) -> StoreResult<Cluster>;

    async fn get_command(&self, id: &str) -> StoreResult<Command>;

    async fn get_application(&self, id: &str) -> StoreResult<Application>;

    /// Persist the runtime binding for a resolved job. Overwrites any prior
    /// binding for the same job id.
    async fn update_job_with_runtime_environment(
        &self,
        job_id: &str,
        cluster_id: &str,
        command_id: &str,
        application_ids: Vec<String>,
        memory_mb: u64,
    ) -> StoreResult<()>;

    /// Number of jobs the user currently has in an active status.
    async fn get_active_job_count_for_user(&self, user: &str) -> StoreResult<u64>;

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: &str,
    ) -> StoreResult<()>;
}
