//! Typed error hierarchy for stemsplit.
//!
//! Two top-level enums cover the two fallible subsystems:
//! - `SeparationError` — failures while running the separator for one job
//! - `ConfigError` — failures loading `stemsplit.toml`
//!
//! Registry operations never fail and have no error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single separation run. Every variant terminates the job in
/// the `error` state; the `Display` text becomes the record's `error` field.
#[derive(Debug, Error)]
pub enum SeparationError {
    #[error("Failed to spawn separator '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read separator output: {0}")]
    StreamFailed(#[source] std::io::Error),

    #[error("Failed to wait for separator: {0}")]
    WaitFailed(#[source] std::io::Error),

    #[error("{}", describe_exit(.exit_code, .output))]
    ProcessFailed {
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Outputs not found after separator run: no {stem} under {}", .search_root.display())]
    MissingArtifact {
        stem: &'static str,
        search_root: PathBuf,
    },

    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(exit_code: &Option<i32>, output: &str) -> String {
    let output = output.trim();
    if !output.is_empty() {
        return output.to_string();
    }
    match exit_code {
        Some(code) => format!("separator failed with code {}", code),
        None => "separator was terminated by a signal".to_string(),
    }
}

/// Errors from loading and parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidEnv { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_failed_prefers_captured_output() {
        let err = SeparationError::ProcessFailed {
            exit_code: Some(1),
            output: "  RuntimeError: CUDA out of memory\n".to_string(),
        };
        assert_eq!(err.to_string(), "RuntimeError: CUDA out of memory");
    }

    #[test]
    fn process_failed_without_output_names_exit_code() {
        let err = SeparationError::ProcessFailed {
            exit_code: Some(2),
            output: String::new(),
        };
        assert_eq!(err.to_string(), "separator failed with code 2");
    }

    #[test]
    fn process_failed_killed_by_signal() {
        let err = SeparationError::ProcessFailed {
            exit_code: None,
            output: " ".to_string(),
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn missing_artifact_names_the_stem() {
        let err = SeparationError::MissingArtifact {
            stem: "no_vocals.mp3",
            search_root: PathBuf::from("/jobs/abc/out"),
        };
        let msg = err.to_string();
        assert!(msg.contains("no_vocals.mp3"));
        assert!(msg.contains("/jobs/abc/out"));
    }

    #[test]
    fn spawn_failed_carries_io_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "python3 not found");
        let err = SeparationError::SpawnFailed {
            program: "python3".into(),
            source: io_err,
        };
        match &err {
            SeparationError::SpawnFailed { program, source } => {
                assert_eq!(program, "python3");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected SpawnFailed"),
        }
    }

    #[test]
    fn config_error_converts_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: ConfigError = toml_err.into();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&SeparationError::ProcessFailed {
            exit_code: Some(1),
            output: String::new(),
        });
        assert_std_error(&ConfigError::InvalidEnv {
            key: "STEMSPLIT_PORT".into(),
            message: "not a number".into(),
        });
    }
}
