use thiserror::Error;

/// Typed rejection classes for job coordination.
///
/// Every failed submission is classified into exactly one of these kinds so
/// the transport layer can translate rejections without inspecting messages.
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// The job id is already taken in the catalog store.
    #[error("Job {0} already exists")]
    Conflict(String),

    /// The request cannot be satisfied as submitted.
    #[error("{0}")]
    Precondition(String),

    /// The per-user active-jobs cap has been reached.
    #[error("User {user} has {count} active jobs and the limit is {limit}")]
    UserLimitExceeded {
        user: String,
        count: u64,
        limit: u64,
    },

    /// This node cannot take the job right now; the caller may retry elsewhere.
    #[error("{0}")]
    ServerUnavailable(String),

    /// Unclassified failure or a broken internal invariant.
    #[error("{0}")]
    Server(String),
}

impl CoordinationError {
    /// Stable label used to tag metrics with the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinationError::Conflict(_) => "conflict",
            CoordinationError::Precondition(_) => "precondition",
            CoordinationError::UserLimitExceeded { .. } => "user_limit_exceeded",
            CoordinationError::ServerUnavailable(_) => "server_unavailable",
            CoordinationError::Server(_) => "server_error",
        }
    }

    /// HTTP status the transport should answer with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            CoordinationError::Conflict(_) => 409,
            CoordinationError::Precondition(_) => 412,
            CoordinationError::UserLimitExceeded { .. } => 429,
            CoordinationError::ServerUnavailable(_) => 503,
            CoordinationError::Server(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinationError>;
