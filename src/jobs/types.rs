use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::Stage;

/// Lifecycle state of a job. Transitions only move forward:
/// `Queued → Running → Done | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Done | Self::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    /// Re-asserting the current state is always allowed.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid job state: {}", s)),
        }
    }
}

/// Client-facing snapshot of one separation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    pub stage: Stage,
    pub progress: f64,
    pub eta_seconds: Option<u64>,
    pub message: String,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Queued,
            stage: Stage::Starting,
            progress: 0.0,
            eta_seconds: None,
            message: "Queued…".to_string(),
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Merge `update` into this record, enforcing the record invariants:
    /// forward-only state, non-decreasing progress within [0, 100], and an
    /// `error` that is only set on entering `Error` and never cleared.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(state) = update.state
            && self.state.can_transition_to(state)
        {
            self.state = state;
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(progress) = update.progress
            && !progress.is_nan()
        {
            self.progress = progress.clamp(0.0, 100.0).max(self.progress);
        }
        if let Some(eta) = update.eta_seconds {
            self.eta_seconds = eta;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(error) = update.error
            && self.state == JobState::Error
            && self.error.is_none()
        {
            self.error = Some(error);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update for a [`JobRecord`]. Every `None` leaves the stored field
/// unchanged. `eta_seconds` is tri-state so an estimate can be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub state: Option<JobState>,
    pub stage: Option<Stage>,
    pub progress: Option<f64>,
    pub eta_seconds: Option<Option<u64>>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn eta_seconds(mut self, eta: Option<u64>) -> Self {
        self.eta_seconds = Some(eta);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_forward_transitions() {
        assert!(JobState::Queued.can_transition_to(JobState::Running));
        assert!(JobState::Running.can_transition_to(JobState::Done));
        assert!(JobState::Running.can_transition_to(JobState::Error));
        assert!(JobState::Queued.can_transition_to(JobState::Error));
    }

    #[test]
    fn test_state_no_backward_transitions() {
        assert!(!JobState::Running.can_transition_to(JobState::Queued));
        assert!(!JobState::Done.can_transition_to(JobState::Running));
        assert!(!JobState::Done.can_transition_to(JobState::Error));
        assert!(!JobState::Error.can_transition_to(JobState::Done));
    }

    #[test]
    fn test_state_roundtrip_str() {
        for state in [JobState::Queued, JobState::Running, JobState::Done, JobState::Error] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("finished".parse::<JobState>().is_err());
    }

    #[test]
    fn test_apply_merges_only_given_fields() {
        let mut record = JobRecord::queued("abc");
        record.apply(JobUpdate::new().message("Loading model…"));
        assert_eq!(record.message, "Loading model…");
        assert_eq!(record.state, JobState::Queued);
        assert_eq!(record.stage, Stage::Starting);
        assert_eq!(record.progress, 0.0);
    }

    #[test]
    fn test_apply_progress_never_decreases() {
        let mut record = JobRecord::queued("abc");
        record.apply(JobUpdate::new().progress(40.0));
        record.apply(JobUpdate::new().progress(10.0));
        assert_eq!(record.progress, 40.0);
        record.apply(JobUpdate::new().progress(0.0));
        assert_eq!(record.progress, 40.0);
    }

    #[test]
    fn test_apply_progress_clamped_and_nan_ignored() {
        let mut record = JobRecord::queued("abc");
        record.apply(JobUpdate::new().progress(250.0));
        assert_eq!(record.progress, 100.0);

        let mut record = JobRecord::queued("abc");
        record.apply(JobUpdate::new().progress(f64::NAN));
        assert_eq!(record.progress, 0.0);
    }

    #[test]
    fn test_apply_error_only_on_error_state() {
        let mut record = JobRecord::queued("abc");
        record.apply(JobUpdate::new().state(JobState::Running).error("ignored"));
        assert_eq!(record.error, None);

        record.apply(JobUpdate::new().state(JobState::Error).error("boom"));
        assert_eq!(record.state, JobState::Error);
        assert_eq!(record.error.as_deref(), Some("boom"));

        record.apply(JobUpdate::new().error("second"));
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_apply_eta_can_be_cleared() {
        let mut record = JobRecord::queued("abc");
        record.apply(JobUpdate::new().eta_seconds(Some(30)));
        assert_eq!(record.eta_seconds, Some(30));
        record.apply(JobUpdate::new().message("no eta change"));
        assert_eq!(record.eta_seconds, Some(30));
        record.apply(JobUpdate::new().eta_seconds(None));
        assert_eq!(record.eta_seconds, None);
    }

    #[test]
    fn test_record_serializes_all_fields() {
        let record = JobRecord::queued("abc");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["job_id"], "abc");
        assert_eq!(json["state"], "queued");
        assert_eq!(json["stage"], "starting");
        assert_eq!(json["progress"], 0.0);
        assert!(json["eta_seconds"].is_null());
        assert!(json["error"].is_null());
        assert!(json.get("updated_at").is_some());
        assert_eq!(json.as_object().unwrap().len(), 8);
    }
}
