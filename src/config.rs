//! Workflow settings.
//!
//! `WorkflowConfig` is loaded once (JSON file plus environment overrides) and
//! handed to [`crate::pipeline::Workflow`]; nothing in the crate reads
//! settings from global state.

use crate::error::{Result, ResultExt as _, WorkflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default share of non-missing values that must parse as numbers.
pub const DEFAULT_NUMERIC_THRESHOLD: f64 = 0.8;

/// Default share of non-missing values that must parse as dates.
pub const DEFAULT_DATETIME_THRESHOLD: f64 = 0.8;

/// Default truncation of frequency tables in profile summaries.
pub const DEFAULT_FREQUENCY_TOP_K: usize = 20;

/// Upper bound accepted for a page size.
pub const MAX_PAGE_SIZE: usize = 100;

const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

pub const ENV_ARTIFACTS_DIR: &str = "PIPEWRIGHT_ARTIFACTS_DIR";
pub const ENV_PYTHON: &str = "PIPEWRIGHT_PYTHON";
pub const ENV_TIMEOUT_SECS: &str = "PIPEWRIGHT_TIMEOUT_SECS";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProfilingSettings {
    pub numeric_threshold: f64,
    pub datetime_threshold: f64,
    /// Number of entries kept in each frequency table
    pub frequency_top_k: usize,
    /// Distinct non-missing values kept per column as samples
    pub sample_values: usize,
    /// Leading records returned alongside a profile for chart rendering
    pub chart_rows: usize,
}

impl Default for ProfilingSettings {
    fn default() -> Self {
        Self {
            numeric_threshold: DEFAULT_NUMERIC_THRESHOLD,
            datetime_threshold: DEFAULT_DATETIME_THRESHOLD,
            frequency_top_k: DEFAULT_FREQUENCY_TOP_K,
            sample_values: 5,
            chart_rows: 100,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PagingSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            default_page_size: 12,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write rotating log files in addition to the console
    pub file_logging: bool,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Overrides the platform log directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: true,
            level: "info".to_owned(),
            directory: None,
        }
    }
}

/// File names of the fixed, per-stage artifacts inside `artifacts_dir`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactNames {
    pub raw_csv: String,
    pub cleaned_csv: String,
    pub training_results: String,
    pub extraction_script: String,
    pub cleaning_script: String,
    pub training_script: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            raw_csv: "scraped_data.csv".to_owned(),
            cleaned_csv: "clean_data.csv".to_owned(),
            training_results: "model_results.json".to_owned(),
            extraction_script: "scraper.py".to_owned(),
            cleaning_script: "clean_data.py".to_owned(),
            training_script: "train_model.py".to_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Shared directory holding scripts and artifacts; workers run with it as cwd
    pub artifacts_dir: PathBuf,
    /// Interpreter used to run generated scripts
    pub interpreter: PathBuf,
    /// Deadline for one worker run; 0 disables the deadline
    pub run_timeout_secs: u64,
    pub profiling: ProfilingSettings,
    pub paging: PagingSettings,
    pub logging: LoggingConfig,
    pub artifacts: ArtifactNames,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("generated"),
            interpreter: default_interpreter(),
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            profiling: ProfilingSettings::default(),
            paging: PagingSettings::default(),
            logging: LoggingConfig::default(),
            artifacts: ArtifactNames::default(),
        }
    }
}

fn default_interpreter() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from("python")
    } else {
        PathBuf::from("python3")
    }
}

impl WorkflowConfig {
    /// Load settings from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WorkflowError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&content).map_err(|e| {
            WorkflowError::Config(format!("Invalid settings file {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_ARTIFACTS_DIR).filter(|v| !v.is_empty()) {
            self.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(python) = lookup(ENV_PYTHON).filter(|v| !v.is_empty()) {
            self.interpreter = PathBuf::from(python);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.is_empty()) {
            self.run_timeout_secs = raw.trim().parse::<u64>().map_err(|_| {
                WorkflowError::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    /// Reject settings that would make profiling or paging meaningless.
    pub fn check(&self) -> Result<()> {
        let p = &self.profiling;
        for (name, value) in [
            ("numeric_threshold", p.numeric_threshold),
            ("datetime_threshold", p.datetime_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(WorkflowError::Config(format!(
                    "profiling.{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if p.frequency_top_k == 0 {
            return Err(WorkflowError::Config(
                "profiling.frequency_top_k must be at least 1".to_owned(),
            ));
        }
        let paging = &self.paging;
        if paging.max_page_size == 0 || paging.max_page_size > MAX_PAGE_SIZE {
            return Err(WorkflowError::Config(format!(
                "paging.max_page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if paging.default_page_size == 0 || paging.default_page_size > paging.max_page_size {
            return Err(WorkflowError::Config(format!(
                "paging.default_page_size must be between 1 and {}",
                paging.max_page_size
            )));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.artifacts_dir.join(name)
    }

    pub fn raw_csv_path(&self) -> PathBuf {
        self.artifact_path(&self.artifacts.raw_csv)
    }

    pub fn cleaned_csv_path(&self) -> PathBuf {
        self.artifact_path(&self.artifacts.cleaned_csv)
    }

    pub fn training_results_path(&self) -> PathBuf {
        self.artifact_path(&self.artifacts.training_results)
    }
}
