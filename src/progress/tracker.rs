//! Stitches the separator's per-model progress bars into one overall figure.
//!
//! Demucs runs each model of a bag as a separate pass with its own 0–100
//! tqdm bar and never announces the pass change. A pass boundary is inferred
//! when the bar drops from near the top back to near zero.

use std::time::{Duration, Instant};

use super::Stage;
use super::parser::{Signal, StageHint};

/// Overall percentage at or below which no ETA is derived.
pub const MIN_ETA_PERCENT: f64 = 1.0;

/// A bar at or above this value that is followed by one at or below
/// [`WRAP_LOW`] is treated as a finished pass.
const WRAP_HIGH: f64 = 90.0;
const WRAP_LOW: f64 = 10.0;

const STARTING_PERCENT: f64 = 1.0;
const MODEL_LOADING_FLOOR: f64 = 2.0;
const DOWNLOADING_FLOOR: f64 = 3.0;
const SEPARATING_FLOOR: f64 = 5.0;
const FINALIZING_PERCENT: f64 = 95.0;

/// One client-facing progress step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub stage: Stage,
    pub eta_seconds: Option<u64>,
    pub message: String,
}

/// Reconstructs a monotonic overall percentage from a stream of [`Signal`]s.
#[derive(Debug)]
pub struct PhaseTracker {
    total_phases: u32,
    phase_index: u32,
    last_percent_in_phase: f64,
    last_overall: f64,
    stage: Stage,
    /// Set once the first separation pass is seen; download bars can't
    /// freeze progress after that.
    separation_started: bool,
    started: Instant,
}

impl PhaseTracker {
    pub fn new(total_phases: u32) -> Self {
        Self {
            total_phases: total_phases.max(1),
            phase_index: 0,
            last_percent_in_phase: 0.0,
            last_overall: 0.0,
            stage: Stage::Starting,
            separation_started: false,
            started: Instant::now(),
        }
    }

    pub fn total_phases(&self) -> u32 {
        self.total_phases
    }

    pub fn phase_index(&self) -> u32 {
        self.phase_index
    }

    pub fn overall(&self) -> f64 {
        self.last_overall
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The update emitted before the child process has produced anything.
    pub fn starting(&mut self) -> ProgressUpdate {
        self.raise_to(STARTING_PERCENT);
        self.emit(None, "Starting separator…")
    }

    /// Fold one parsed line into the tracker state.
    pub fn observe(&mut self, signal: &Signal) -> ProgressUpdate {
        if let Some(hint) = &signal.stage_hint {
            return self.observe_hint(hint, signal.eta_seconds);
        }

        match signal.percent_in_bar {
            Some(percent) if self.stage == Stage::Downloading => {
                // Weight download bars say nothing about separation passes.
                let message = format!("Downloading model files… {}%", percent);
                self.emit(signal.eta_seconds, message)
            }
            Some(percent) => {
                self.observe_percent(f64::from(percent));
                self.emit(signal.eta_seconds, "Processing…")
            }
            None => self.emit(signal.eta_seconds, "Processing…"),
        }
    }

    /// The update emitted once the child exits cleanly, before artifacts are
    /// collected.
    pub fn finalizing(&mut self) -> ProgressUpdate {
        self.stage = Stage::Finalizing;
        self.raise_to(FINALIZING_PERCENT);
        self.emit(None, "Finalizing output files…")
    }

    pub fn done(&mut self) -> ProgressUpdate {
        self.stage = Stage::Done;
        self.raise_to(100.0);
        self.emit(Some(0), "Done")
    }

    fn observe_hint(&mut self, hint: &StageHint, eta: Option<u64>) -> ProgressUpdate {
        match hint {
            StageHint::ModelLoading => {
                self.stage = Stage::Starting;
                self.raise_to(MODEL_LOADING_FLOOR);
                self.emit(None, "Loading model…")
            }
            StageHint::Downloading if self.separation_started => {
                self.emit(eta, "Downloading model files…")
            }
            StageHint::Downloading => {
                self.stage = Stage::Downloading;
                self.raise_to(DOWNLOADING_FLOOR);
                self.emit(eta, "Downloading model files…")
            }
            StageHint::Separating => {
                self.stage = Stage::Separating;
                self.separation_started = true;
                self.raise_to(SEPARATING_FLOOR);
                self.emit(None, "Separating stems…")
            }
            StageHint::Keyword { stage, text } => {
                if *stage != Stage::Downloading || !self.separation_started {
                    self.stage = *stage;
                }
                self.emit(eta, text.clone())
            }
        }
    }

    fn observe_percent(&mut self, percent: f64) {
        if self.stage == Stage::Starting {
            self.stage = Stage::Separating;
        }
        self.separation_started = true;

        if self.last_percent_in_phase >= WRAP_HIGH && percent <= WRAP_LOW {
            if self.phase_index + 1 < self.total_phases {
                self.phase_index += 1;
            }
            self.last_percent_in_phase = 0.0;
        }

        let percent = percent.max(self.last_percent_in_phase);
        self.last_percent_in_phase = percent;

        let overall = (f64::from(self.phase_index) + percent / 100.0)
            / f64::from(self.total_phases)
            * 100.0;
        self.raise_to(overall);
    }

    fn raise_to(&mut self, percent: f64) {
        self.last_overall = percent.clamp(0.0, 100.0).max(self.last_overall);
    }

    fn emit(&self, parsed_eta: Option<u64>, message: impl Into<String>) -> ProgressUpdate {
        ProgressUpdate {
            progress: self.last_overall,
            stage: self.stage,
            eta_seconds: parsed_eta
                .or_else(|| estimate_eta(self.started.elapsed(), self.last_overall)),
            message: message.into(),
        }
    }
}

/// Remaining seconds assuming the rate so far holds:
/// `elapsed * (100 - overall) / overall`. Unknown at or below
/// [`MIN_ETA_PERCENT`].
pub fn estimate_eta(elapsed: Duration, overall: f64) -> Option<u64> {
    if overall.is_nan() || overall <= MIN_ETA_PERCENT {
        return None;
    }
    let overall = overall.min(100.0);
    let remaining = elapsed.as_secs_f64() * (100.0 - overall) / overall;
    Some(remaining.round() as u64)
}
