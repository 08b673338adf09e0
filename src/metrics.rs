//! Coordination metrics.
//!
//! Instrument names and tag keys live here as constants. The coordinator
//! records through [`MetricsSink`] so tests can observe emissions directly;
//! [`FacadeSink`] forwards to whatever recorder the hosting process has
//! installed via the `metrics` facade.

use std::sync::Mutex;
use std::time::Duration;

use metrics::{describe_counter, describe_histogram, Label};

use crate::error::CoordinationError;

/// Wall-clock duration of every submit call, success or failure.
pub const COORDINATION_TIMER: &str = "coordination.timer";

/// Duration of the runtime-binding write.
pub const SET_JOB_ENVIRONMENT_TIMER: &str = "submit.setJobEnvironment.timer";

/// Submissions rejected because the user reached the active-jobs limit.
pub const USER_LIMIT_EXCEEDED_COUNTER: &str = "submit.rejected.jobs-limit.counter";

pub mod tag_keys {
    pub const STATUS: &str = "status";
    pub const ERROR: &str = "error";
    pub const USER: &str = "user";
    pub const JOBS_USER_LIMIT: &str = "jobsUserLimit";
}

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILURE: &str = "failure";

/// One metric tag as a key/value pair.
pub type MetricTag = (&'static str, String);

/// Mark a tag bag as a successful outcome.
pub fn add_success_tags(tags: &mut Vec<MetricTag>) {
    tags.push((tag_keys::STATUS, STATUS_SUCCESS.to_string()));
}

/// Mark a tag bag as a failed outcome, recording the failure class.
pub fn add_failure_tags(tags: &mut Vec<MetricTag>, error: &CoordinationError) {
    tags.push((tag_keys::STATUS, STATUS_FAILURE.to_string()));
    tags.push((tag_keys::ERROR, error.kind().to_string()));
}

/// Registers metric descriptions with the installed recorder.
///
/// Call once at process startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_histogram!(
        COORDINATION_TIMER,
        "Wall-clock duration of job coordination in seconds"
    );
    describe_histogram!(
        SET_JOB_ENVIRONMENT_TIMER,
        "Duration of the runtime environment write in seconds"
    );
    describe_counter!(
        USER_LIMIT_EXCEEDED_COUNTER,
        "Jobs rejected because the user reached the active-jobs limit"
    );
}

/// Counters and timers keyed by tag sets.
pub trait MetricsSink: Send + Sync {
    fn record_timer(&self, name: &'static str, tags: &[MetricTag], elapsed: Duration);

    fn increment_counter(&self, name: &'static str, tags: &[MetricTag]);
}

/// Forwards to the global (or thread-local) `metrics` recorder. Durations
/// are recorded as histograms in seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeSink;

impl MetricsSink for FacadeSink {
    fn record_timer(&self, name: &'static str, tags: &[MetricTag], elapsed: Duration) {
        metrics::histogram!(name, to_labels(tags)).record(elapsed.as_secs_f64());
    }

    fn increment_counter(&self, name: &'static str, tags: &[MetricTag]) {
        metrics::counter!(name, to_labels(tags)).increment(1);
    }
}

fn to_labels(tags: &[MetricTag]) -> Vec<Label> {
    tags.iter()
        .map(|(key, value)| Label::new(*key, value.clone()))
        .collect()
}

/// A recorded timer emission.
#[derive(Debug, Clone)]
pub struct TimerSample {
    pub name: &'static str,
    pub tags: Vec<MetricTag>,
    pub elapsed: Duration,
}

impl TimerSample {
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|(k, v)| *k == key && v == value)
    }
}

/// A recorded counter emission.
#[derive(Debug, Clone)]
pub struct CounterSample {
    pub name: &'static str,
    pub tags: Vec<MetricTag>,
}

impl CounterSample {
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|(k, v)| *k == key && v == value)
    }
}

/// In-memory sink for tests and development.
#[derive(Debug, Default)]
pub struct RecordingSink {
    timers: Mutex<Vec<TimerSample>>,
    counters: Mutex<Vec<CounterSample>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All timer samples recorded under the given instrument name.
    pub fn timers(&self, name: &str) -> Vec<TimerSample> {
        self.timers
            .lock()
            .expect("recording sink lock poisoned")
            .iter()
            .filter(|sample| sample.name == name)
            .cloned()
            .collect()
    }

    /// All counter samples recorded under the given instrument name.
    pub fn counters(&self, name: &str) -> Vec<CounterSample> {
        self.counters
            .lock()
            .expect("recording sink lock poisoned")
            .iter()
            .filter(|sample| sample.name == name)
            .cloned()
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn record_timer(&self, name: &'static str, tags: &[MetricTag], elapsed: Duration) {
        self.timers
            .lock()
            .expect("recording sink lock poisoned")
            .push(TimerSample {
                name,
                tags: tags.to_vec(),
                elapsed,
            });
    }

    fn increment_counter(&self, name: &'static str, tags: &[MetricTag]) {
        self.counters
            .lock()
            .expect("recording sink lock poisoned")
            .push(CounterSample {
                name,
                tags: tags.to_vec(),
            });
    }
}
