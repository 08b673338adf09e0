use async_trait::async_trait;

use crate::error::Result;

/// Terminates an admitted job. Idempotency and liveness are the
/// implementation's contract; the coordinator only delegates.
#[async_trait]
pub trait JobKillService: Send + Sync {
    async fn kill_job(&self, job_id: &str, reason: &str) -> Result<()>;
}
