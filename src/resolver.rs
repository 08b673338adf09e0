use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::memory::InMemoryCatalog;
use crate::job::JobRequest;

/// The resolver could not turn the request's criteria into a plan.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ResolutionError(pub String);

/// The resolved tuple that fully specifies how a job will be run. Immutable;
/// the coordinator never mutates a plan it receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub cluster_id: String,
    pub command_id: String,
    /// Ordered application dependencies. May be empty.
    pub application_ids: Vec<String>,
}

/// Turns a request's abstract criteria into a concrete execution plan.
#[async_trait]
pub trait JobResolver: Send + Sync {
    async fn resolve(
        &self,
        job_id: &str,
        request: &JobRequest,
    ) -> std::result::Result<ExecutionPlan, ResolutionError>;
}

/// Tag-subset resolver over the in-memory catalog.
///
/// Walks the request's cluster preference groups in order and picks the
/// first cluster (by id) whose tags cover the group, then the first command
/// whose tags cover the command criteria. The plan's applications are the
/// chosen command's ordered dependencies. Production deployments replace
/// this with a scoring resolver behind the same trait.
pub struct TagMatchResolver {
    catalog: Arc<InMemoryCatalog>,
}

impl TagMatchResolver {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl JobResolver for TagMatchResolver {
    async fn resolve(
        &self,
        job_id: &str,
        request: &JobRequest,
    ) -> std::result::Result<ExecutionPlan, ResolutionError> {
        let clusters = self.catalog.clusters().await;
        let cluster = request
            .criteria
            .cluster_criteria
            .iter()
            .find_map(|group| clusters.iter().find(|cluster| group.is_subset(&cluster.tags)))
            .ok_or_else(|| {
                ResolutionError(format!("no cluster matches the criteria for job {job_id}"))
            })?;

        let commands = self.catalog.commands().await;
        let command = commands
            .iter()
            .find(|command| request.criteria.command_criteria.is_subset(&command.tags))
            .ok_or_else(|| {
                ResolutionError(format!("no command matches the criteria for job {job_id}"))
            })?;

        tracing::debug!(
            job_id = %job_id,
            cluster_id = %cluster.id,
            command_id = %command.id,
            "Resolved execution plan"
        );

        Ok(ExecutionPlan {
            cluster_id: cluster.id.clone(),
            command_id: command.id.clone(),
            application_ids: command.applications.clone(),
        })
    }
}
