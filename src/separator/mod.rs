//! Supervision of the external stem separator (demucs).
//!
//! ```text
//! JobSupervisor::submit ──spawn──► worker task
//!     │                               │
//!     │                      SeparationRunner::run
//!     │                        spawn demucs, merge stdout/stderr
//!     │                        line → parse_line → PhaseTracker
//!     │ ◄──── mpsc<ProgressUpdate> ───┘
//!     ▼
//! JobRegistry::update(job_id, …)
//! ```
//!
//! On a clean exit the newest `vocals.mp3` / `no_vocals.mp3` under the
//! run's output tree are copied to fixed names in the job directory.

mod artifacts;
mod runner;
mod supervisor;

pub use artifacts::{INSTRUMENTAL_STEM, StemArtifacts, VOCALS_STEM, collect_stems, find_newest};
pub use runner::{LineSplitter, SeparationRunner};
pub use supervisor::{JobSpec, JobSupervisor};
