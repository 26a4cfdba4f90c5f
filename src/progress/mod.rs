//! Progress reconstruction from the separator's console output.
//!
//! Demucs reports progress through tqdm bars on stderr, one independent
//! 0–100 bar per model in the bag, interleaved with a few plain status lines:
//!
//! ```text
//! Selected model is a bag of 4 models. You will see that many progress bars per track.
//! Separating track /tmp/abc123_song.wav
//! 100%|██████████████████████| 175.5/175.5 [00:09<00:00, 18.80seconds/s]
//!  45%|█████████▍            | 78.9/175.5 [00:04<00:05, 19.04seconds/s]
//! ```
//!
//! - `parser` turns one line into a [`Signal`] (or nothing)
//! - `tracker` stitches the sequence of bars into one monotonic percentage

mod parser;
mod tracker;

use serde::{Deserialize, Serialize};

pub use parser::{Signal, StageHint, parse_line};
pub use tracker::{MIN_ETA_PERCENT, PhaseTracker, ProgressUpdate, estimate_eta};

/// Coarse, advisory label for what a job is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Starting,
    Downloading,
    Loading,
    Separating,
    Applying,
    Finalizing,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Loading => "loading",
            Self::Separating => "separating",
            Self::Applying => "applying",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
