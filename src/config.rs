use std::collections::HashMap;

/// Delimiter used when deriving per-job archive locations. Archive roots may
/// be plain paths or URI prefixes, so this is always `/`.
pub const FILE_PATH_DELIMITER: char = '/';

/// Configuration for the job coordinator running on this node.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Root path or URI prefix under which job archives are stored.
    pub archive_root: String,
    /// This node's identity, stamped onto every job record's execution host.
    pub hostname: String,
    pub memory: MemoryConfig,
    pub active_limit: ActiveLimitConfig,
}

/// Memory limits, all in MB.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Fallback when neither the request nor the command specifies memory.
    pub default_job_memory: u64,
    /// Hard upper bound per job; exceeding it makes the job invalid.
    pub max_job_memory: u64,
    /// Total memory this node will reserve across admitted jobs.
    pub max_system_memory: u64,
}

/// Per-user cap on concurrently active jobs.
#[derive(Debug, Clone)]
pub struct ActiveLimitConfig {
    pub enabled: bool,
    pub default_user_limit: u64,
    pub user_overrides: HashMap<String, u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            archive_root: "/tmp/berth/archives".to_string(),
            hostname: "localhost".to_string(),
            memory: MemoryConfig::default(),
            active_limit: ActiveLimitConfig::default(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_job_memory: 1_024,
            max_job_memory: 10_240,
            max_system_memory: 30_720,
        }
    }
}

impl Default for ActiveLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_user_limit: 100,
            user_overrides: HashMap::new(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new(archive_root: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            archive_root: archive_root.into(),
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_active_limit(mut self, active_limit: ActiveLimitConfig) -> Self {
        self.active_limit = active_limit;
        self
    }

    /// Archive location for a job: the archive root, normalized to end with
    /// the path delimiter, followed by the job id. Stored verbatim on the
    /// job record; consumers depend on the exact value.
    pub fn archive_location(&self, job_id: &str) -> String {
        let mut location = self.archive_root.clone();
        if !location.ends_with(FILE_PATH_DELIMITER) {
            location.push(FILE_PATH_DELIMITER);
        }
        location.push_str(job_id);
        location
    }
}

impl ActiveLimitConfig {
    /// An enabled limit where every user gets the same cap.
    pub fn enabled(default_user_limit: u64) -> Self {
        Self {
            enabled: true,
            default_user_limit,
            user_overrides: HashMap::new(),
        }
    }

    pub fn with_user_override(mut self, user: impl Into<String>, limit: u64) -> Self {
        self.user_overrides.insert(user.into(), limit);
        self
    }

    /// The active-jobs cap for a user, honoring per-user overrides.
    pub fn user_limit(&self, user: &str) -> u64 {
        self.user_overrides
            .get(user)
            .copied()
            .unwrap_or(self.default_user_limit)
    }
}
