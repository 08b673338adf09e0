pub mod state;

pub use state::{NodeState, ScheduledJob};

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::{Application, CatalogStore, Cluster, Command, StoreError};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinationError, Result};
use crate::job::{
    JobMetadata, JobRecord, JobRequest, JobStatus, FAILED_TO_RESOLVE_MESSAGE, JOB_ACCEPTED_MESSAGE,
};
use crate::kill::JobKillService;
use crate::metrics::{self, MetricTag, MetricsSink};
use crate::resolver::{ExecutionPlan, JobResolver};

/// Orchestrates job admission on this node.
///
/// `submit` drives the pipeline: persist the INIT record, resolve the
/// request against the catalog, compute the effective memory, persist the
/// runtime binding, enforce the per-user quota, then admit under the node
/// memory lock. Any failure is classified into a typed rejection and the
/// store/node bookkeeping is unwound exactly once.
pub struct JobCoordinator {
    inner: Arc<CoordinatorInner>,
    kill_service: Arc<dyn JobKillService>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    store: Arc<dyn CatalogStore>,
    resolver: Arc<dyn JobResolver>,
    state: Arc<NodeState>,
    metrics: Arc<dyn MetricsSink>,
    /// Guards the compare-and-commit against the node memory ledger. Held
    /// only for node-state operations, never across store or resolver I/O.
    admission_lock: Mutex<()>,
}

/// A classified pipeline failure plus the bookkeeping needed to unwind it.
struct Failure {
    error: CoordinationError,
    job_id: Option<String>,
    pending_status: JobStatus,
    status_message: Option<String>,
}

impl Failure {
    /// A failure before any durable state exists for the job.
    fn unscoped(error: CoordinationError) -> Self {
        Self {
            error,
            job_id: None,
            pending_status: JobStatus::Failed,
            status_message: None,
        }
    }

    fn new(job_id: &str, error: CoordinationError) -> Self {
        Self {
            error,
            job_id: Some(job_id.to_string()),
            pending_status: JobStatus::Failed,
            status_message: None,
        }
    }

    fn with_status(mut self, status: JobStatus) -> Self {
        self.pending_status = status;
        self
    }

    fn with_message(mut self, message: &str) -> Self {
        self.status_message = Some(message.to_string());
        self
    }
}

impl JobCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn CatalogStore>,
        resolver: Arc<dyn JobResolver>,
        kill_service: Arc<dyn JobKillService>,
        state: Arc<NodeState>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                store,
                resolver,
                state,
                metrics,
                admission_lock: Mutex::new(()),
            }),
            kill_service,
        }
    }

    /// Admit or reject a job submission.
    ///
    /// On success the job's record and runtime binding are in the store, its
    /// memory is reserved on this node, and the returned id identifies it.
    /// On failure nothing stays reserved: the record, if one was written, is
    /// left in a terminal failed or invalid status.
    ///
    /// The pipeline runs on its own task: a caller that gives up waiting
    /// cannot abandon it halfway, so cleanup and the admission critical
    /// section always run to completion.
    pub async fn submit(&self, request: &JobRequest, metadata: &JobMetadata) -> Result<String> {
        let inner = self.inner.clone();
        let request = request.clone();
        let metadata = metadata.clone();
        let pipeline =
            tokio::spawn(async move { inner.submit_pipeline(&request, &metadata).await });
        match pipeline.await {
            Ok(result) => result,
            Err(join_error) => Err(CoordinationError::Server(format!(
                "job coordination task failed: {join_error}"
            ))),
        }
    }

    /// Terminate an in-flight job. Idempotency is the kill service's contract.
    pub async fn kill(&self, job_id: &str, reason: &str) -> Result<()> {
        tracing::info!(job_id = %job_id, reason = %reason, "Requesting job kill");
        self.kill_service.kill_job(job_id, reason).await
    }
}

impl CoordinatorInner {
    async fn submit_pipeline(&self, request: &JobRequest, metadata: &JobMetadata) -> Result<String> {
        let started = Instant::now();
        let mut tags: Vec<MetricTag> = Vec::new();

        let result = match self.coordinate(request, metadata).await {
            Ok(job_id) => {
                metrics::add_success_tags(&mut tags);
                Ok(job_id)
            }
            Err(failure) => {
                metrics::add_failure_tags(&mut tags, &failure.error);
                self.cleanup(&failure).await;
                Err(failure.error)
            }
        };

        self.metrics
            .record_timer(metrics::COORDINATION_TIMER, &tags, started.elapsed());
        result
    }

    async fn coordinate(
        &self,
        request: &JobRequest,
        metadata: &JobMetadata,
    ) -> std::result::Result<String, Failure> {
        if request.name.trim().is_empty() || request.user.trim().is_empty() {
            return Err(Failure::unscoped(CoordinationError::Precondition(
                "a job request must carry a name and a user".to_string(),
            )));
        }

        let job_id = match &request.id {
            Some(id) if id.trim().is_empty() => {
                return Err(Failure::unscoped(CoordinationError::Server(
                    "the supplied job id is blank".to_string(),
                )));
            }
            Some(id) => id.clone(),
            None => Uuid::new_v4().to_string(),
        };

        tracing::info!(job_id = %job_id, user = %request.user, "Scheduling job launch");

        // Persist the INIT record before anything else so every later
        // failure has a durable row to land on.
        let record = JobRecord {
            id: job_id.clone(),
            name: request.name.clone(),
            user: request.user.clone(),
            version: request.version.clone(),
            tags: request.tags.clone(),
            command_args: request.command_args.clone(),
            description: request.description.clone(),
            status: JobStatus::Init,
            status_message: JOB_ACCEPTED_MESSAGE.to_string(),
            archive_location: self.config.archive_location(&job_id),
            execution_host: self.config.hostname.clone(),
            created: chrono::Utc::now(),
        };
        if let Err(error) = self.store.create_job(request, metadata, record).await {
            return Err(match error {
                StoreError::AlreadyExists(_) => {
                    Failure::unscoped(CoordinationError::Conflict(job_id))
                }
                other => Failure::unscoped(CoordinationError::Server(format!(
                    "failed to persist job {job_id}: {other}"
                ))),
            });
        }

        self.state
            .init(&job_id)
            .await
            .map_err(|error| Failure::new(&job_id, error))?;

        tracing::info!(job_id = %job_id, "Attempting to resolve job");
        let plan = match self.resolver.resolve(&job_id, request).await {
            Ok(plan) => plan,
            Err(error) => {
                // The catalog cannot satisfy the request as submitted; the
                // stored record gets the canonical resolve-failure message
                // while the caller sees the resolver's own words.
                return Err(Failure::new(
                    &job_id,
                    CoordinationError::Precondition(error.to_string()),
                )
                .with_message(FAILED_TO_RESOLVE_MESSAGE));
            }
        };

        let cluster = self.load_cluster(&job_id, &plan.cluster_id).await?;
        let command = self.load_command(&job_id, &plan.command_id).await?;
        let mut applications = Vec::with_capacity(plan.application_ids.len());
        for application_id in &plan.application_ids {
            applications.push(self.load_application(&job_id, application_id).await?);
        }

        let memory_mb = request
            .memory
            .or(command.memory)
            .unwrap_or(self.config.memory.default_job_memory);
        let max_job_memory = self.config.memory.max_job_memory;
        if memory_mb > max_job_memory {
            return Err(Failure::new(
                &job_id,
                CoordinationError::Precondition(format!(
                    "Requested {memory_mb} MB to run job which is more than the \
                     {max_job_memory} MB allowed"
                )),
            )
            .with_status(JobStatus::Invalid));
        }

        self.set_runtime_environment(&job_id, &plan, memory_mb)
            .await?;

        if self.config.active_limit.enabled {
            self.check_user_limit(&job_id, &request.user).await?;
        }

        // Compare-and-commit against the node memory ledger. Nothing under
        // this lock may touch the store or the resolver.
        let _admission = self.admission_lock.lock().await;
        let used_memory = self.state.used_memory().await;
        let max_system_memory = self.config.memory.max_system_memory;
        if used_memory + memory_mb <= max_system_memory {
            tracing::info!(
                job_id = %job_id,
                used_memory,
                max_system_memory,
                memory_mb,
                "Admitting job on this node"
            );
            self.state
                .schedule(&job_id, request, &cluster, &command, &applications, memory_mb)
                .await
                .map_err(|error| Failure::new(&job_id, error))?;
            Ok(job_id)
        } else {
            Err(Failure::new(
                &job_id,
                CoordinationError::ServerUnavailable(format!(
                    "Job {job_id} can't run on this node: {used_memory}/{max_system_memory} MB \
                     are used and it requested {memory_mb} MB"
                )),
            ))
        }
    }

    async fn load_cluster(
        &self,
        job_id: &str,
        cluster_id: &str,
    ) -> std::result::Result<Cluster, Failure> {
        self.store.get_cluster(cluster_id).await.map_err(|error| {
            Failure::new(
                job_id,
                CoordinationError::Server(format!(
                    "resolved cluster {cluster_id} could not be loaded: {error}"
                )),
            )
        })
    }

    async fn load_command(
        &self,
        job_id: &str,
        command_id: &str,
    ) -> std::result::Result<Command, Failure> {
        self.store.get_command(command_id).await.map_err(|error| {
            Failure::new(
                job_id,
                CoordinationError::Server(format!(
                    "resolved command {command_id} could not be loaded: {error}"
                )),
            )
        })
    }

    async fn load_application(
        &self,
        job_id: &str,
        application_id: &str,
    ) -> std::result::Result<Application, Failure> {
        self.store
            .get_application(application_id)
            .await
            .map_err(|error| {
                Failure::new(
                    job_id,
                    CoordinationError::Server(format!(
                        "resolved application {application_id} could not be loaded: {error}"
                    )),
                )
            })
    }

    /// Persist the runtime binding, timing the write whatever the outcome.
    async fn set_runtime_environment(
        &self,
        job_id: &str,
        plan: &ExecutionPlan,
        memory_mb: u64,
    ) -> std::result::Result<(), Failure> {
        let started = Instant::now();
        let mut tags: Vec<MetricTag> = Vec::new();

        let result = match self
            .store
            .update_job_with_runtime_environment(
                job_id,
                &plan.cluster_id,
                &plan.command_id,
                plan.application_ids.clone(),
                memory_mb,
            )
            .await
        {
            Ok(()) => {
                metrics::add_success_tags(&mut tags);
                Ok(())
            }
            Err(error) => {
                let failure = Failure::new(
                    job_id,
                    CoordinationError::Server(format!(
                        "failed to persist the runtime binding for job {job_id}: {error}"
                    )),
                );
                metrics::add_failure_tags(&mut tags, &failure.error);
                Err(failure)
            }
        };

        self.metrics
            .record_timer(metrics::SET_JOB_ENVIRONMENT_TIMER, &tags, started.elapsed());
        result
    }

    async fn check_user_limit(
        &self,
        job_id: &str,
        user: &str,
    ) -> std::result::Result<(), Failure> {
        let limit = self.config.active_limit.user_limit(user);
        let active = self
            .store
            .get_active_job_count_for_user(user)
            .await
            .map_err(|error| {
                Failure::new(
                    job_id,
                    CoordinationError::Server(format!(
                        "failed to count active jobs for user {user}: {error}"
                    )),
                )
            })?;
        if active >= limit {
            self.metrics.increment_counter(
                metrics::USER_LIMIT_EXCEEDED_COUNTER,
                &[
                    (metrics::tag_keys::USER, user.to_string()),
                    (metrics::tag_keys::JOBS_USER_LIMIT, limit.to_string()),
                ],
            );
            return Err(Failure::new(
                job_id,
                CoordinationError::UserLimitExceeded {
                    user: user.to_string(),
                    count: active,
                    limit,
                },
            ));
        }
        Ok(())
    }

    /// Universal cleanup for a classified failure.
    ///
    /// A conflict means the record belongs to another submission, possibly
    /// one racing on the same client-supplied id, so it is never touched.
    /// Everything else releases the node slot and lands the record in its
    /// pending terminal status, if and only if the node tracked the job.
    /// Secondary failures are logged and never mask the primary error.
    async fn cleanup(&self, failure: &Failure) {
        if matches!(failure.error, CoordinationError::Conflict(_)) {
            return;
        }
        let Some(job_id) = &failure.job_id else {
            return;
        };
        if !self.state.job_exists(job_id).await {
            return;
        }
        if let Err(error) = self.state.done(job_id).await {
            tracing::warn!(
                job_id = %job_id,
                error = %error,
                "Failed to release the node slot during cleanup"
            );
        }
        let message = failure
            .status_message
            .clone()
            .unwrap_or_else(|| failure.error.to_string());
        if let Err(error) = self
            .store
            .update_job_status(job_id, failure.pending_status, &message)
            .await
        {
            tracing::warn!(
                job_id = %job_id,
                error = %error,
                "Failed to record the terminal job status during cleanup"
            );
        }
    }
}
