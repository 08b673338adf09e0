use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::catalog::{Application, Cluster, Command};
use crate::error::{CoordinationError, Result};
use crate::job::JobRequest;

/// Launch context handed to the local execution subsystem when a job is
/// admitted.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub request: JobRequest,
    pub cluster: Cluster,
    pub command: Command,
    pub applications: Vec<Application>,
    pub memory_mb: u64,
}

/// Per-job slot. An intent slot reserves no memory; an admitted slot holds
/// the launch context and the memory it reserved.
#[derive(Debug)]
enum JobSlot {
    Init,
    Admitted(Box<ScheduledJob>),
}

#[derive(Debug, Default)]
struct Ledger {
    slots: HashMap<String, JobSlot>,
    used_memory: u64,
}

/// Tracks the jobs live on this node and the memory they have reserved.
///
/// Slot state machine per job id: absent -> init -> admitted -> absent.
/// Transitions are driven exclusively by the coordinator; anything else is
/// a programming error and is rejected. `schedule` is only ever called from
/// inside the coordinator's admission critical section, so its callers are
/// serialized.
#[derive(Debug, Default)]
pub struct NodeState {
    inner: RwLock<Ledger>,
}

impl NodeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intent slot for a job that has just been persisted in INIT.
    pub async fn init(&self, job_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.slots.contains_key(job_id) {
            return Err(CoordinationError::Server(format!(
                "job {job_id} is already tracked on this node"
            )));
        }
        inner.slots.insert(job_id.to_string(), JobSlot::Init);
        Ok(())
    }

    /// Membership test used by the submit error path.
    pub async fn job_exists(&self, job_id: &str) -> bool {
        self.inner.read().await.slots.contains_key(job_id)
    }

    /// Memory currently reserved by admitted jobs, in MB.
    pub async fn used_memory(&self) -> u64 {
        self.inner.read().await.used_memory
    }

    /// Number of jobs tracked, intent slots included.
    pub async fn job_count(&self) -> usize {
        self.inner.read().await.slots.len()
    }

    /// Admit a job: reserve its memory and store the launch context for the
    /// execution subsystem. Requires an intent slot.
    pub async fn schedule(
        &self,
        job_id: &str,
        request: &JobRequest,
        cluster: &Cluster,
        command: &Command,
        applications: &[Application],
        memory_mb: u64,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.slots.get(job_id) {
            Some(JobSlot::Init) => {}
            Some(JobSlot::Admitted(_)) => {
                return Err(CoordinationError::Server(format!(
                    "job {job_id} is already admitted on this node"
                )));
            }
            None => {
                return Err(CoordinationError::Server(format!(
                    "job {job_id} was never initialized on this node"
                )));
            }
        }
        inner.slots.insert(
            job_id.to_string(),
            JobSlot::Admitted(Box::new(ScheduledJob {
                request: request.clone(),
                cluster: cluster.clone(),
                command: command.clone(),
                applications: applications.to_vec(),
                memory_mb,
            })),
        );
        inner.used_memory += memory_mb;
        tracing::info!(
            job_id = %job_id,
            memory_mb,
            used_memory = inner.used_memory,
            "Job admitted on this node"
        );
        Ok(())
    }

    /// Release a job's slot, returning its reserved memory to the ledger.
    /// Intent slots reserve nothing, so releasing one subtracts nothing.
    pub async fn done(&self, job_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.slots.remove(job_id) {
            Some(JobSlot::Admitted(job)) => {
                inner.used_memory -= job.memory_mb;
                tracing::info!(
                    job_id = %job_id,
                    memory_mb = job.memory_mb,
                    used_memory = inner.used_memory,
                    "Job released its node reservation"
                );
                Ok(())
            }
            Some(JobSlot::Init) => Ok(()),
            None => Err(CoordinationError::Server(format!(
                "job {job_id} is not tracked on this node"
            ))),
        }
    }

    /// The launch context for an admitted job, if it is admitted.
    pub async fn scheduled_job(&self, job_id: &str) -> Option<ScheduledJob> {
        match self.inner.read().await.slots.get(job_id) {
            Some(JobSlot::Admitted(job)) => Some((**job).clone()),
            _ => None,
        }
    }
}
