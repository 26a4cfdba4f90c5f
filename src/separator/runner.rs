use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::artifacts::{StemArtifacts, collect_stems};
use crate::config::SeparatorConfig;
use crate::errors::SeparationError;
use crate::progress::{PhaseTracker, ProgressUpdate, parse_line};

/// Lines of child output kept for the failure diagnostic.
const OUTPUT_TAIL_LINES: usize = 50;

/// Longest line [`LineSplitter`] buffers before emitting it unterminated.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Runs the external separator for one input and reports progress.
#[derive(Debug, Clone)]
pub struct SeparationRunner {
    config: SeparatorConfig,
}

impl SeparationRunner {
    pub fn new(config: SeparatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeparatorConfig {
        &self.config
    }

    /// Separate `input` into `job_dir`, sending every progress step to
    /// `progress`. The child's stdout and stderr are consumed live and merged
    /// in arrival order.
    ///
    /// Returns the relocated stems, or the reason the run failed. A closed
    /// progress channel does not stop the run.
    pub async fn run(
        &self,
        input: &Path,
        job_dir: &Path,
        progress: &mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<StemArtifacts, SeparationError> {
        let mut tracker = PhaseTracker::new(self.config.phases());
        report(progress, tracker.starting());

        let out_dir = job_dir.join("out");
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|source| SeparationError::OutputDirFailed {
                path: out_dir.clone(),
                source,
            })?;

        let args = self.config.command_args(input, &out_dir);
        tracing::debug!(program = %self.config.program, args = ?args, "spawning separator");

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SeparationError::SpawnFailed {
                program: self.config.program.clone(),
                source,
            })?;

        tracing::debug!(pid = ?child.id(), "separator spawned");

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_lines(stdout, line_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_lines(stderr, line_tx.clone())));
        }
        drop(line_tx);

        let mut tail = OutputTail::new(OUTPUT_TAIL_LINES);
        while let Some(line) = line_rx.recv().await {
            tracing::trace!(line = %line, "separator output");
            match parse_line(&line) {
                // Bar redraws would crowd the traceback out of the tail.
                Some(signal) if signal.percent_in_bar.is_some() => {
                    report(progress, tracker.observe(&signal));
                }
                Some(signal) => {
                    report(progress, tracker.observe(&signal));
                    tail.push(line);
                }
                None => tail.push(line),
            }
        }

        for pump in pumps {
            match pump.await {
                Ok(result) => result.map_err(SeparationError::StreamFailed)?,
                Err(e) => {
                    return Err(SeparationError::StreamFailed(std::io::Error::other(e)));
                }
            }
        }

        let status = child.wait().await.map_err(SeparationError::WaitFailed)?;
        tracing::debug!(exit_code = ?status.code(), "separator exited");
        if !status.success() {
            return Err(SeparationError::ProcessFailed {
                exit_code: status.code(),
                output: tail.join(),
            });
        }

        report(progress, tracker.finalizing());
        let artifacts = collect_stems(&out_dir, job_dir, &self.config)?;
        report(progress, tracker.done());

        Ok(artifacts)
    }
}

fn report(progress: &mpsc::UnboundedSender<ProgressUpdate>, update: ProgressUpdate) {
    tracing::debug!(
        progress = update.progress,
        stage = %update.stage,
        eta = ?update.eta_seconds,
        "progress"
    );
    // The receiver only disappears when nobody is polling this job any more.
    let _ = progress.send(update);
}

/// The last few lines of child output, oldest first.
#[derive(Debug)]
struct OutputTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn join(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}

/// Read `reader` to the end, forwarding each non-empty line.
async fn pump_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<String>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for line in splitter.push(&buf[..n]) {
            let _ = tx.send(line);
        }
    }
    if let Some(line) = splitter.finish() {
        let _ = tx.send(line);
    }
    Ok(())
}

/// Splits a byte stream into lines on `\n` or `\r`.
///
/// tqdm redraws its bar in place with carriage returns, so a bar that never
/// prints a newline still produces one line per redraw. Output with no
/// terminator at all is cut into [`MAX_LINE_BYTES`] pieces.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feed bytes and return every line they complete. Empty lines are
    /// dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
                if self.pending.len() >= MAX_LINE_BYTES {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            }
        }
        lines
    }

    /// Flush a trailing line that had no terminator.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}
