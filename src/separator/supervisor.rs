use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::artifacts::StemArtifacts;
use super::runner::SeparationRunner;
use crate::jobs::{JobRecord, JobRegistry, JobState, JobUpdate};
use crate::progress::{ProgressUpdate, Stage};

/// One admitted separation request.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub job_id: String,
    /// Temporary copy of the upload; removed when the job finishes.
    pub input_path: PathBuf,
    /// Per-job directory that receives the final stems.
    pub job_dir: PathBuf,
}

impl From<ProgressUpdate> for JobUpdate {
    fn from(update: ProgressUpdate) -> Self {
        JobUpdate::new()
            .stage(update.stage)
            .progress(update.progress)
            .eta_seconds(update.eta_seconds)
            .message(update.message)
    }
}

/// Drives jobs from admission to a terminal state.
///
/// Each job gets its own task. Progress flows from the runner over a channel
/// to the job's worker, which is the only writer of that job's record.
/// There is no limit on how many jobs run at once.
#[derive(Debug, Clone)]
pub struct JobSupervisor {
    registry: JobRegistry,
    runner: Arc<SeparationRunner>,
}

impl JobSupervisor {
    pub fn new(registry: JobRegistry, runner: SeparationRunner) -> Self {
        Self {
            registry,
            runner: Arc::new(runner),
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &SeparationRunner {
        &self.runner
    }

    /// Start `job` in the background. The handle may be dropped; the job
    /// runs to completion regardless.
    pub fn submit(&self, job: JobSpec) -> JoinHandle<JobRecord> {
        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.run(job).await })
    }

    /// Run `job` to completion and return its terminal record.
    pub async fn run(&self, job: JobSpec) -> JobRecord {
        let JobSpec {
            job_id,
            input_path,
            job_dir,
        } = job;
        let _cleanup = InputCleanup(input_path.clone());

        tracing::info!(job_id = %job_id, input = %input_path.display(), "job started");
        self.registry.update(
            &job_id,
            JobUpdate::new().state(JobState::Running).message("Starting…"),
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
        let runner = Arc::clone(&self.runner);
        let worker = tokio::spawn(async move { runner.run(&input_path, &job_dir, &tx).await });

        while let Some(update) = rx.recv().await {
            self.registry
                .update(&job_id, JobUpdate::from(update).state(JobState::Running));
        }

        let outcome = match worker.await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("separator task failed: {}", e)),
        };

        match outcome {
            Ok(artifacts) => self.finish(&job_id, &artifacts),
            Err(error) => self.fail(&job_id, error),
        }
    }

    fn finish(&self, job_id: &str, artifacts: &StemArtifacts) -> JobRecord {
        tracing::info!(
            job_id,
            vocals = %artifacts.vocals.display(),
            instrumental = %artifacts.instrumental.display(),
            "job done"
        );
        self.registry.update(
            job_id,
            JobUpdate::new()
                .state(JobState::Done)
                .stage(Stage::Done)
                .progress(100.0)
                .eta_seconds(Some(0))
                .message("Done"),
        )
    }

    fn fail(&self, job_id: &str, error: String) -> JobRecord {
        tracing::error!(job_id, error = %error, "job failed");
        self.registry.update(
            job_id,
            JobUpdate::new()
                .state(JobState::Error)
                .stage(Stage::Error)
                .eta_seconds(None)
                .message("Failed")
                .error(error),
        )
    }
}

/// Removes the temporary input file when dropped, on every exit path.
struct InputCleanup(PathBuf);

impl Drop for InputCleanup {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = %self.0.display(), "removed input file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.0.display(), error = %e, "failed to remove input file")
            }
        }
    }
}
