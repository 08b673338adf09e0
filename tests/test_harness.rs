//! Shared fixtures for job coordination integration tests.
//!
//! Provides a coordinator wired to in-memory collaborators plus a few
//! scripted resolver/store doubles for failure-path tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use berth::catalog::memory::InMemoryCatalog;
use berth::catalog::{
    Application, CatalogStore, Cluster, Command, StoreError, StoreResult,
};
use berth::config::CoordinatorConfig;
use berth::coordinator::{JobCoordinator, NodeState};
use berth::error::Result;
use berth::job::{JobMetadata, JobRecord, JobRequest, JobStatus, ResourceCriteria};
use berth::kill::JobKillService;
use berth::metrics::RecordingSink;
use berth::resolver::{ExecutionPlan, JobResolver, ResolutionError, TagMatchResolver};

/// A coordinator plus handles to every collaborator it was wired with.
pub struct TestCoordinator {
    pub catalog: Arc<InMemoryCatalog>,
    pub state: Arc<NodeState>,
    pub metrics: Arc<RecordingSink>,
    pub kills: Arc<RecordingKillService>,
    pub coordinator: JobCoordinator,
}

/// Seed the catalog with the standard fixture: cluster `c1`, command `k1`
/// (default memory 2048 MB, depending on application `a1`) and `a1` itself.
pub async fn seed_catalog(catalog: &InMemoryCatalog) {
    catalog
        .add_cluster(Cluster::new("c1", "prod-yarn").with_tags(["sched:yarn", "env:prod"]))
        .await;
    catalog
        .add_command(
            Command::new("k1", "spark-submit")
                .with_tags(["type:spark"])
                .with_memory(2_048)
                .with_applications(["a1"]),
        )
        .await;
    catalog
        .add_application(Application::new("a1", "spark-runtime"))
        .await;
}

/// Coordinator over a freshly seeded catalog and the tag-match resolver.
pub async fn seeded_coordinator(config: CoordinatorConfig) -> TestCoordinator {
    let catalog = Arc::new(InMemoryCatalog::new());
    seed_catalog(&catalog).await;
    let resolver = Arc::new(TagMatchResolver::new(catalog.clone()));
    coordinator_with(config, catalog.clone(), catalog, resolver)
}

/// Coordinator over a seeded catalog but a caller-supplied resolver.
pub async fn coordinator_with_resolver(
    config: CoordinatorConfig,
    resolver: Arc<dyn JobResolver>,
) -> TestCoordinator {
    let catalog = Arc::new(InMemoryCatalog::new());
    seed_catalog(&catalog).await;
    coordinator_with(config, catalog.clone(), catalog, resolver)
}

/// Coordinator over a seeded catalog with a caller-supplied store facade,
/// for tests that script store failures.
pub async fn coordinator_with_store(
    config: CoordinatorConfig,
    store: Arc<dyn CatalogStore>,
    catalog: Arc<InMemoryCatalog>,
) -> TestCoordinator {
    let resolver = Arc::new(TagMatchResolver::new(catalog.clone()));
    coordinator_with(config, catalog, store, resolver)
}

/// Install a subscriber once so `RUST_LOG=debug cargo test` shows the
/// pipeline logs.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn coordinator_with(
    config: CoordinatorConfig,
    catalog: Arc<InMemoryCatalog>,
    store: Arc<dyn CatalogStore>,
    resolver: Arc<dyn JobResolver>,
) -> TestCoordinator {
    init_tracing();
    let state = Arc::new(NodeState::new());
    let metrics = Arc::new(RecordingSink::new());
    let kills = Arc::new(RecordingKillService::default());
    let coordinator = JobCoordinator::new(
        config,
        store,
        resolver,
        kills.clone(),
        state.clone(),
        metrics.clone(),
    );
    TestCoordinator {
        catalog,
        state,
        metrics,
        kills,
        coordinator,
    }
}

/// A request whose criteria match the standard fixture.
pub fn sample_request(user: &str) -> JobRequest {
    JobRequest::new("sample-job", user, "1.0.0")
        .with_tags(["team:data"])
        .with_criteria(
            ResourceCriteria::new()
                .with_cluster_criteria(["sched:yarn"])
                .with_command_criteria(["type:spark"]),
        )
}

pub fn sample_metadata() -> JobMetadata {
    JobMetadata::new()
        .with_client_host("client.example.com")
        .with_user_agent("berth-test/1.0")
}

/// Insert an active (INIT) job row for the user directly into the catalog,
/// bypassing the coordinator.
pub async fn seed_active_job(catalog: &InMemoryCatalog, id: &str, user: &str) {
    let request = sample_request(user).with_id(id);
    let record = JobRecord {
        id: id.to_string(),
        name: request.name.clone(),
        user: user.to_string(),
        version: request.version.clone(),
        tags: request.tags.clone(),
        command_args: None,
        description: None,
        status: JobStatus::Init,
        status_message: berth::job::JOB_ACCEPTED_MESSAGE.to_string(),
        archive_location: format!("/archives/root/{id}"),
        execution_host: "node-1.example.com".to_string(),
        created: chrono::Utc::now(),
    };
    catalog
        .create_job(&request, &sample_metadata(), record)
        .await
        .expect("seeded job id must be unique");
}

/// Resolver double that always fails with the given message.
pub struct FailingResolver(pub String);

#[async_trait]
impl JobResolver for FailingResolver {
    async fn resolve(
        &self,
        _job_id: &str,
        _request: &JobRequest,
    ) -> std::result::Result<ExecutionPlan, ResolutionError> {
        Err(ResolutionError(self.0.clone()))
    }
}

/// Resolver double that always returns the given plan.
pub struct FixedPlanResolver(pub ExecutionPlan);

#[async_trait]
impl JobResolver for FixedPlanResolver {
    async fn resolve(
        &self,
        _job_id: &str,
        _request: &JobRequest,
    ) -> std::result::Result<ExecutionPlan, ResolutionError> {
        Ok(self.0.clone())
    }
}

/// Kill service double that records every request it receives.
#[derive(Debug, Default)]
pub struct RecordingKillService {
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingKillService {
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().expect("kill log poisoned").clone()
    }
}

#[async_trait]
impl JobKillService for RecordingKillService {
    async fn kill_job(&self, job_id: &str, reason: &str) -> Result<()> {
        self.requests
            .lock()
            .expect("kill log poisoned")
            .push((job_id.to_string(), reason.to_string()));
        Ok(())
    }
}

/// Store facade that delegates to an in-memory catalog but fails every
/// runtime-binding write.
pub struct FailingBindingStore {
    pub inner: Arc<InMemoryCatalog>,
}

#[async_trait]
impl CatalogStore for FailingBindingStore {
    async fn create_job(
        &self,
        request: &JobRequest,
        metadata: &JobMetadata,
        record: JobRecord,
    ) -> StoreResult<()> {
        self.inner.create_job(request, metadata, record).await
    }

    async fn get_cluster(&self, id: &str) -> StoreResult<Cluster> {
        self.inner.get_cluster(id).await
    }

    async fn get_command(&self, id: &str) -> StoreResult<Command> {
        self.inner.get_command(id).await
    }

    async fn get_application(&self, id: &str) -> StoreResult<Application> {
        self.inner.get_application(id).await
    }

    async fn update_job_with_runtime_environment(
        &self,
        _job_id: &str,
        _cluster_id: &str,
        _command_id: &str,
        _application_ids: Vec<String>,
        _memory_mb: u64,
    ) -> StoreResult<()> {
        Err(StoreError::Backend("binding writes are down".to_string()))
    }

    async fn get_active_job_count_for_user(&self, user: &str) -> StoreResult<u64> {
        self.inner.get_active_job_count_for_user(user).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: &str,
    ) -> StoreResult<()> {
        self.inner.update_job_status(job_id, status, message).await
    }
}
