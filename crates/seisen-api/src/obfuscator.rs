//! # Lua Obfuscator Runner
//!
//! Runs the Prometheus obfuscator (`cli.lua`) as a child process. Each
//! request writes its source to `input_<id>.lua` in the temp directory,
//! reads back `output_<id>.lua`, and removes both files. A periodic
//! [`sweep`] catches files left behind by crashed runs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use utoipa::ToSchema;

/// Files older than this are removed by the periodic sweep.
pub const TEMP_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Target Lua dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LuaVersion {
    Lua51,
    Luau,
}

impl LuaVersion {
    pub const NAMES: &'static str = "lua51, luau";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lua51 => "lua51",
            Self::Luau => "luau",
        }
    }
}

impl FromStr for LuaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lua51" => Ok(Self::Lua51),
            "luau" => Ok(Self::Luau),
            _ => Err(format!("Invalid version: must be one of {}", Self::NAMES)),
        }
    }
}

/// Obfuscation strength preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Minify,
    Weak,
    Medium,
    Strong,
}

impl Preset {
    pub const NAMES: &'static str = "minify, weak, medium, strong";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minify => "minify",
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
        }
    }

    /// Name as the CLI expects it after `--preset`.
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Minify => "Minify",
            Self::Weak => "Weak",
            Self::Medium => "Medium",
            Self::Strong => "Strong",
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minify" => Ok(Self::Minify),
            "weak" => Ok(Self::Weak),
            "medium" => Ok(Self::Medium),
            "strong" => Ok(Self::Strong),
            _ => Err(format!("Invalid preset: must be one of {}", Self::NAMES)),
        }
    }
}

/// Where the obfuscator lives and how long it may run.
#[derive(Debug, Clone)]
pub struct ObfuscatorConfig {
    /// Directory containing `cli.lua`. Also the child's working directory.
    pub prometheus_path: PathBuf,
    pub lua_executable: String,
    pub temp_dir: PathBuf,
    pub timeout: Duration,
}

impl ObfuscatorConfig {
    /// `PROMETHEUS_PATH` (default `./Prometheus`), `LUA_EXECUTABLE`
    /// (`lua`), `TEMP_DIR` (`./temp`), `OBFUSCATOR_TIMEOUT_SECS` (120).
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let timeout_secs = std::env::var("OBFUSCATOR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(120);
        Self {
            prometheus_path: PathBuf::from(var("PROMETHEUS_PATH", "./Prometheus")),
            lua_executable: var("LUA_EXECUTABLE", "lua"),
            temp_dir: PathBuf::from(var("TEMP_DIR", "./temp")),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Obfuscator failures. [`crate::error::AppError`] renders them.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    #[error("Prometheus not found. Please ensure Prometheus is installed at: {}", .0.display())]
    NotInstalled(PathBuf),

    #[error("Obfuscation failed")]
    Failed { details: String },

    #[error("Obfuscation completed but output file not found")]
    MissingOutput,

    #[error("obfuscator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obfuscated {
    pub code: String,
    pub original_size: usize,
    pub obfuscated_size: usize,
}

/// Removes the run's temp files when dropped, whatever the outcome.
struct TempFiles {
    input: PathBuf,
    output: PathBuf,
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in [&self.input, &self.output] {
            if let Err(err) = std::fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %err, "temp file cleanup failed");
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Obfuscator {
    config: ObfuscatorConfig,
}

impl Obfuscator {
    pub fn new(config: ObfuscatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ObfuscatorConfig {
        &self.config
    }

    pub fn cli_path(&self) -> PathBuf {
        self.config.prometheus_path.join("cli.lua")
    }

    pub fn is_installed(&self) -> bool {
        self.cli_path().is_file()
    }

    /// Obfuscate `code`.
    pub async fn obfuscate(
        &self,
        code: &str,
        version: LuaVersion,
        preset: Preset,
    ) -> Result<Obfuscated, ObfuscateError> {
        if !self.is_installed() {
            return Err(ObfuscateError::NotInstalled(
                self.config.prometheus_path.clone(),
            ));
        }
        let cli = tokio::fs::canonicalize(self.cli_path()).await?;

        tokio::fs::create_dir_all(&self.config.temp_dir).await?;
        let dir = tokio::fs::canonicalize(&self.config.temp_dir).await?;
        let id = hex::encode(rand::random::<[u8; 16]>());
        let files = TempFiles {
            input: dir.join(format!("input_{id}.lua")),
            output: dir.join(format!("output_{id}.lua")),
        };
        tokio::fs::write(&files.input, code).await?;

        let mut command = Command::new(&self.config.lua_executable);
        command.arg(&cli);
        if version == LuaVersion::Luau {
            command.arg("--LuaU");
        }
        command
            .args(["--preset", preset.cli_name(), "--out"])
            .arg(&files.output)
            .arg(&files.input)
            .current_dir(&self.config.prometheus_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| ObfuscateError::Failed {
            details: format!("failed to start {}: {err}", self.config.lua_executable),
        })?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(run = %id, timeout = ?self.config.timeout, "obfuscator timed out");
                return Err(ObfuscateError::Failed {
                    details: format!("timed out after {}s", self.config.timeout.as_secs()),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(run = %id, status = ?output.status.code(), "obfuscator exited with failure");
            return Err(ObfuscateError::Failed {
                details: if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                },
            });
        }

        let obfuscated = match tokio::fs::read_to_string(&files.output).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObfuscateError::MissingOutput)
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(run = %id, version = version.as_str(), preset = preset.as_str(), "obfuscation finished");
        Ok(Obfuscated {
            original_size: code.chars().count(),
            obfuscated_size: obfuscated.chars().count(),
            code: obfuscated,
        })
    }
}

/// Delete regular files in `dir` last modified more than `max_age` ago.
/// A missing directory counts as empty. Returns the number removed.
pub async fn sweep(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };
    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age >= max_age {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
    }
    if removed > 0 {
        tracing::info!(dir = %dir.display(), removed, "swept stale temp files");
    }
    Ok(removed)
}
