//! One-shot local separation — `stemsplit separate <input>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use stemsplit::config::StemsplitConfig;
use stemsplit::jobs::{JobRecord, JobRegistry, JobState};
use stemsplit::separator::{JobSpec, JobSupervisor, SeparationRunner};
use stemsplit::server::{new_job_id, sanitize_filename};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn cmd_separate(config: StemsplitConfig, input: &Path, out_dir: &Path) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    for problem in config.validate() {
        tracing::warn!(problem = %problem, "configuration problem");
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    // The supervisor deletes its input when done, so it gets a private copy.
    let job_id = new_job_id();
    let work_dir = std::env::temp_dir().join(format!("stemsplit-{}", job_id));
    let job_dir = work_dir.join("job");
    std::fs::create_dir_all(&job_dir)
        .with_context(|| format!("Failed to create {}", job_dir.display()))?;

    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let input_copy = work_dir.join(format!("{}_{}", job_id, sanitize_filename(&file_name)));
    std::fs::copy(input, &input_copy)
        .with_context(|| format!("Failed to stage {}", input.display()))?;

    let result = run_job(&config, &job_id, input_copy, &job_dir).await;
    let outcome = result.and_then(|record| finish(&config, &record, &job_dir, out_dir));

    if let Err(e) = std::fs::remove_dir_all(&work_dir) {
        tracing::warn!(path = %work_dir.display(), error = %e, "failed to remove work directory");
    }
    outcome
}

async fn run_job(
    config: &StemsplitConfig,
    job_id: &str,
    input_path: PathBuf,
    job_dir: &Path,
) -> Result<JobRecord> {
    let registry = JobRegistry::new();
    registry.create(job_id);
    let supervisor = JobSupervisor::new(
        registry.clone(),
        SeparationRunner::new(config.separator.clone()),
    );

    let bar = progress_bar();
    let mut handle = supervisor.submit(JobSpec {
        job_id: job_id.to_string(),
        input_path,
        job_dir: job_dir.to_path_buf(),
    });

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let record = loop {
        tokio::select! {
            joined = &mut handle => break joined.context("Separation task failed")?,
            _ = ticker.tick() => {
                if let Some(record) = registry.get(job_id) {
                    render(&bar, &record);
                }
            }
        }
    };

    render(&bar, &record);
    if record.state == JobState::Done {
        bar.finish_with_message("Done");
    } else {
        bar.abandon_with_message("Failed");
    }
    Ok(record)
}

fn finish(
    config: &StemsplitConfig,
    record: &JobRecord,
    job_dir: &Path,
    out_dir: &Path,
) -> Result<()> {
    if record.state != JobState::Done {
        let reason = record.error.as_deref().unwrap_or("unknown error");
        anyhow::bail!("Separation failed: {}", reason);
    }

    for name in [
        config.separator.vocals_file_name(),
        config.separator.instrumental_file_name(),
    ] {
        let dest = out_dir.join(&name);
        std::fs::copy(job_dir.join(&name), &dest)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        println!("{}", dest.display());
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .expect("progress bar template is a valid static string")
        .progress_chars("█▓▒░");
    let bar = ProgressBar::new(100);
    bar.set_style(style);
    bar.set_prefix("Separating");
    bar
}

fn render(bar: &ProgressBar, record: &JobRecord) {
    bar.set_position(record.progress.floor() as u64);
    let message = match record.eta_seconds {
        Some(eta) if record.state == JobState::Running => {
            format!("{} (eta {})", record.message, format_eta(eta))
        }
        _ => record.message.clone(),
    };
    bar.set_message(message);
}

fn format_eta(seconds: u64) -> String {
    if seconds >= 3600 {
        format!("{}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
    } else {
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(0), "00:00");
        assert_eq!(format_eta(75), "01:15");
        assert_eq!(format_eta(3725), "1:02:05");
    }
}
