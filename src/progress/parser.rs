//! Line parsing for the separator's console output.
//!
//! Rules, in priority order, on the trimmed line:
//! 1. Literal stage markers at the start of the line → a [`StageHint`]
//!    (plus ETA for download lines)
//! 2. A tqdm `NN%|` prefix → `percent_in_bar`, with any `<MM:SS` ETA
//! 3. A stage keyword anywhere in the line → [`StageHint::Keyword`]
//! 4. Anything else is noise and yields `None`

use regex::Regex;
use std::sync::LazyLock;

use super::Stage;

// Compile regexes once using LazyLock
static PERCENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})%\|").expect("percent regex is valid"));

static ETA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:(\d+):)?(\d{2}):(\d{2})").expect("eta regex is valid")
});

static KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(downloading|separating|applying|loading)").expect("keyword regex is valid")
});

const MODEL_BAG_MARKER: &str = "Selected model is a bag of";
const DOWNLOADING_MARKER: &str = "Downloading";
const SEPARATING_MARKER: &str = "Separating track";

/// Longest slice of a raw line carried as a keyword message.
const KEYWORD_MESSAGE_CHARS: usize = 80;

/// A phase boundary or stage change announced by the separator.
#[derive(Debug, Clone, PartialEq)]
pub enum StageHint {
    /// The model bag was selected and is being loaded.
    ModelLoading,
    /// Model weights are being fetched.
    Downloading,
    /// Separation of the input track has begun.
    Separating,
    /// A stage keyword on an otherwise unrecognised line.
    Keyword { stage: Stage, text: String },
}

/// Structured reading of one output line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signal {
    pub percent_in_bar: Option<u8>,
    pub eta_seconds: Option<u64>,
    pub stage_hint: Option<StageHint>,
}

impl Signal {
    pub fn percent(percent: u8) -> Self {
        Self {
            percent_in_bar: Some(percent),
            ..Self::default()
        }
    }

    pub fn hint(hint: StageHint) -> Self {
        Self {
            stage_hint: Some(hint),
            ..Self::default()
        }
    }
}

/// Parse a single line of separator output.
pub fn parse_line(line: &str) -> Option<Signal> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // Markers only count at the start of a line: the separating line carries
    // the input path, which holds the user's file name.
    if line.starts_with(SEPARATING_MARKER) {
        return Some(Signal::hint(StageHint::Separating));
    }
    if line.starts_with(MODEL_BAG_MARKER) {
        return Some(Signal::hint(StageHint::ModelLoading));
    }
    if line.starts_with(DOWNLOADING_MARKER) {
        return Some(Signal {
            eta_seconds: parse_eta_seconds(line),
            ..Signal::hint(StageHint::Downloading)
        });
    }

    if let Some(cap) = PERCENT_REGEX.captures(line)
        && let Ok(percent) = cap[1].parse::<u16>()
    {
        return Some(Signal {
            percent_in_bar: Some(percent.min(100) as u8),
            eta_seconds: parse_eta_seconds(line),
            stage_hint: None,
        });
    }

    if let Some(cap) = KEYWORD_REGEX.captures(line) {
        let stage = match cap[1].to_lowercase().as_str() {
            "downloading" => Stage::Downloading,
            "separating" => Stage::Separating,
            "applying" => Stage::Applying,
            _ => Stage::Loading,
        };
        let text: String = line.chars().take(KEYWORD_MESSAGE_CHARS).collect();
        return Some(Signal {
            eta_seconds: parse_eta_seconds(line),
            ..Signal::hint(StageHint::Keyword { stage, text })
        });
    }

    None
}

/// Extract a tqdm remaining-time field (`<MM:SS` or `<H:MM:SS`) as seconds.
fn parse_eta_seconds(line: &str) -> Option<u64> {
    let cap = ETA_REGEX.captures(line)?;
    let hours = match cap.get(1) {
        Some(h) => h.as_str().parse::<u64>().ok()?,
        None => 0,
    };
    let minutes: u64 = cap[2].parse().ok()?;
    let seconds: u64 = cap[3].parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}
