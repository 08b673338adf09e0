use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status message stored when a job record is first persisted.
pub const JOB_ACCEPTED_MESSAGE: &str = "Job accepted and in initialization phase.";

/// Canonical status message stored when the resolver cannot satisfy a request.
pub const FAILED_TO_RESOLVE_MESSAGE: &str =
    "Failed to resolve the job against the available clusters and commands";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Init,
    Resolved,
    Accepted,
    Running,
    Succeeded,
    Failed,
    Invalid,
    Killed,
}

impl JobStatus {
    /// Whether the job still counts against its user's active-jobs limit.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Init | JobStatus::Resolved | JobStatus::Accepted | JobStatus::Running
        )
    }

    pub fn is_finished(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Init => write!(f, "init"),
            JobStatus::Resolved => write!(f, "resolved"),
            JobStatus::Accepted => write!(f, "accepted"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Invalid => write!(f, "invalid"),
            JobStatus::Killed => write!(f, "killed"),
        }
    }
}

/// Resource-selection criteria carried by a request. Opaque to the
/// coordinator; only resolvers interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCriteria {
    /// Ordered preference groups of cluster tags. Earlier groups win.
    pub cluster_criteria: Vec<BTreeSet<String>>,
    /// Tags the chosen command must carry.
    pub command_criteria: BTreeSet<String>,
}

impl ResourceCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cluster preference group.
    pub fn with_cluster_criteria<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cluster_criteria
            .push(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_command_criteria<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_criteria = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A client's job submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Client-supplied id. Minted by the coordinator when absent; must be
    /// unique across all jobs the catalog store has ever seen.
    pub id: Option<String>,
    pub name: String,
    pub user: String,
    pub version: String,
    pub tags: BTreeSet<String>,
    pub command_args: Option<Vec<String>>,
    pub description: Option<String>,
    /// Requested memory in MB.
    pub memory: Option<u64>,
    pub criteria: ResourceCriteria,
}

impl JobRequest {
    pub fn new(
        name: impl Into<String>,
        user: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            user: user.into(),
            version: version.into(),
            tags: BTreeSet::new(),
            command_args: None,
            description: None,
            memory: None,
            criteria: ResourceCriteria::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_command_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_memory(mut self, memory_mb: u64) -> Self {
        self.memory = Some(memory_mb);
        self
    }

    pub fn with_criteria(mut self, criteria: ResourceCriteria) -> Self {
        self.criteria = criteria;
        self
    }
}

/// Submission context persisted verbatim next to the job record. The
/// coordinator never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub client_host: Option<String>,
    pub user_agent: Option<String>,
    pub grouping: Option<String>,
    pub grouping_instance: Option<String>,
    /// Free-form client payload.
    pub details: Option<serde_json::Value>,
}

impl JobMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_host(mut self, client_host: impl Into<String>) -> Self {
        self.client_host = Some(client_host.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_grouping(mut self, grouping: impl Into<String>) -> Self {
        self.grouping = Some(grouping.into());
        self
    }

    pub fn with_grouping_instance(mut self, grouping_instance: impl Into<String>) -> Self {
        self.grouping_instance = Some(grouping_instance.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// The durable row the coordinator creates for every submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    pub user: String,
    pub version: String,
    pub tags: BTreeSet<String>,
    pub command_args: Option<Vec<String>>,
    pub description: Option<String>,
    pub status: JobStatus,
    pub status_message: String,
    pub archive_location: String,
    pub execution_host: String,
    pub created: DateTime<Utc>,
}

/// Persisted association between a job and its resolved plan plus memory
/// reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeBinding {
    pub job_id: String,
    pub cluster_id: String,
    pub command_id: String,
    pub application_ids: Vec<String>,
    pub memory_mb: u64,
}
