//! Configuration for stemsplit, read from `stemsplit.toml`.
//!
//! Layered: file → environment → CLI flags. A missing file means defaults.
//!
//! ```toml
//! [separator]
//! program = "python3"
//! args = ["-m", "demucs"]
//! model = "htdemucs_ft"
//! bitrate = 320
//! # total_phases = 4
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//! storage_dir = "storage"
//! tmp_dir = "tmp"
//! dev_mode = false
//! max_upload_mb = 200
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "stemsplit.toml";

/// Models that are bags of four networks, each producing its own tqdm bar.
const FOUR_PASS_MODELS: &[&str] = &["htdemucs_ft", "mdx", "mdx_extra", "mdx_q", "mdx_extra_q"];

/// How to invoke the external separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparatorConfig {
    /// Executable to spawn
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the demucs flags
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// MP3 bitrate in kbps
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    /// Number of progress bars the model emits per track. Derived from the
    /// model name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_phases: Option<u32>,
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-m".to_string(), "demucs".to_string()]
}

fn default_model() -> String {
    "htdemucs_ft".to_string()
}

fn default_bitrate() -> u32 {
    320
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            model: default_model(),
            bitrate: default_bitrate(),
            total_phases: None,
        }
    }
}

impl SeparatorConfig {
    /// Effective phase count: explicit setting, else what the model is known
    /// to emit.
    pub fn phases(&self) -> u32 {
        self.total_phases.unwrap_or_else(|| phases_for_model(&self.model))
    }

    /// Full argument list for one run.
    pub fn command_args(&self, input: &Path, out_dir: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "-n".to_string(),
            self.model.clone(),
            "--two-stems=vocals".to_string(),
            "--mp3".to_string(),
            "--mp3-bitrate".to_string(),
            self.bitrate.to_string(),
            "-o".to_string(),
            out_dir.to_string_lossy().to_string(),
            input.to_string_lossy().to_string(),
        ]);
        args
    }

    pub fn vocals_file_name(&self) -> String {
        format!("vocals_{}.mp3", self.bitrate)
    }

    pub fn instrumental_file_name(&self) -> String {
        format!("instrumental_{}.mp3", self.bitrate)
    }
}

pub fn phases_for_model(model: &str) -> u32 {
    if FOUR_PASS_MODELS.contains(&model) { 4 } else { 1 }
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Root of per-job output directories
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Where uploads are written before separation
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,
    /// Permissive CORS and bind on all interfaces
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_max_upload_mb() -> usize {
    200
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage_dir: default_storage_dir(),
            tmp_dir: default_tmp_dir(),
            dev_mode: false,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        let host = if self.dev_mode { "0.0.0.0" } else { self.host.as_str() };
        format!("{}:{}", host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemsplitConfig {
    #[serde(default)]
    pub separator: SeparatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl StemsplitConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if it exists, otherwise start from defaults. Environment
    /// overrides are applied either way.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `STEMSPLIT_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup("STEMSPLIT_PROGRAM") {
            self.separator.program = program;
        }
        if let Some(model) = lookup("STEMSPLIT_MODEL") {
            self.separator.model = model;
        }
        if let Some(port) = lookup("STEMSPLIT_PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::InvalidEnv {
                key: "STEMSPLIT_PORT".to_string(),
                message: format!("{}", e),
            })?;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Human-readable problems with the configuration; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.separator.program.trim().is_empty() {
            problems.push("separator.program must not be empty".to_string());
        }
        if self.separator.model.trim().is_empty() {
            problems.push("separator.model must not be empty".to_string());
        }
        if self.separator.bitrate == 0 {
            problems.push("separator.bitrate must be greater than 0".to_string());
        }
        if self.separator.total_phases == Some(0) {
            problems.push("separator.total_phases must be at least 1".to_string());
        }
        if self.server.max_upload_mb == 0 {
            problems.push("server.max_upload_mb must be greater than 0".to_string());
        }
        problems
    }
}
