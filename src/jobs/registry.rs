use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::types::{JobRecord, JobUpdate};

/// Process-wide store of job records keyed by job id.
///
/// Cloning is cheap and every clone shares the same map. All operations take
/// one map-wide lock for the duration of a single in-memory mutation and
/// never hold it across I/O or an `.await`.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        // A panic while holding the lock cannot leave a record half-merged:
        // `JobRecord::apply` only assigns whole fields.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a new job in the `queued` state. Creating an id that already
    /// exists returns the stored record unchanged.
    pub fn create(&self, job_id: &str) -> JobRecord {
        let mut jobs = self.lock();
        jobs.entry(job_id.to_string())
            .or_insert_with(|| JobRecord::queued(job_id))
            .clone()
    }

    /// Merge `update` into the record for `job_id` and return the result.
    /// An unknown id gets a default queued record first.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> JobRecord {
        let mut jobs = self.lock();
        let record = jobs.entry(job_id.to_string()).or_insert_with(|| {
            tracing::debug!(job_id, "update for unknown job, creating record");
            JobRecord::queued(job_id)
        });
        record.apply(update);
        record.clone()
    }

    /// Snapshot of the record for `job_id`, if one exists.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().get(job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
