//! Query surface.
//!
//! Thin wrappers over [`Workflow`] that return serializable payloads and
//! flatten every failure into a [`CommandError`], the shape front ends and
//! the CLI print.

use crate::analyser::{DatasetProfile, MissingnessReport, ProfileOptions, profile_file};
use crate::config::PagingSettings;
use crate::error::WorkflowError;
use crate::pager::{PageRequest, PageWindow};
use crate::pipeline::{
    CleaningConfig, CleaningOutcome, ExtractionConfig, ExtractionOutcome, TrainingConfig,
    TrainingOutcome, TrainingReport, Workflow,
};
use crate::reader::{Record, RecordStream, read_window};
use crate::runner::AbortSignal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use crate::utils::run_blocking;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which CSV artifact a query reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Raw,
    #[default]
    Cleaned,
}

impl DataSource {
    pub fn path(self, workflow: &Workflow) -> PathBuf {
        match self {
            Self::Raw => workflow.config().raw_csv_path(),
            Self::Cleaned => workflow.config().cleaned_csv_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    pub source: DataSource,
    #[serde(flatten)]
    pub page: PageRequest,
}

/// One page of data plus everything the dashboard shows next to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub rows: Vec<Record>,
    pub pagination: PageWindow,
    pub statistics: MissingnessReport,
    pub profile: DatasetProfile,
    /// Leading records for charts, independent of the current page
    pub chart_rows: Vec<Record>,
}

/// Failure as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<WorkflowError> for CommandError {
    fn from(err: WorkflowError) -> Self {
        let details = match &err {
            WorkflowError::Validation(issues) => json!({ "issues": issues }),
            WorkflowError::MissingPrecondition { artifact, hint } => {
                json!({ "artifact": artifact, "hint": hint })
            }
            WorkflowError::ProcessFailed {
                exit_code,
                stdout,
                stderr,
            } => json!({ "exitCode": exit_code, "stdout": stdout, "stderr": stderr }),
            WorkflowError::Timeout { seconds, stderr } => {
                json!({ "seconds": seconds, "stderr": stderr })
            }
            WorkflowError::ArtifactNotProduced {
                artifact,
                stdout,
                stderr,
            } => json!({ "artifact": artifact, "stdout": stdout, "stderr": stderr }),
            WorkflowError::MalformedRow {
                path,
                line,
                expected,
                found,
            } => json!({ "path": path, "line": line, "expected": expected, "found": found }),
            WorkflowError::InvalidPage { page, total_pages } => {
                json!({ "page": page, "totalPages": total_pages })
            }
            _ => Value::Null,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            details,
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Profile a CSV artifact and return the requested page of it.
///
/// The artifact's run lock is held across all three reads, so a stage
/// rewriting the file is waited for rather than read half-written.
///
/// # Errors
///
/// `not_found` or `empty_input` for a missing or empty artifact,
/// `invalid_page`/`invalid_page_size` for a bad window.
pub async fn profile(workflow: &Workflow, request: ProfileRequest) -> CommandResult<ProfileResponse> {
    let path = request.source.path(workflow);
    let _guards = workflow.lock_artifacts(&[&path]).await?;

    let config = workflow.config();
    let options = ProfileOptions::from(&config.profiling);
    let paging = config.paging.clone();
    let chart_rows = config.profiling.chart_rows;
    let response = run_blocking(move || {
        read_profile_page(&path, options, &paging, chart_rows, request.page)
    })
    .await?;
    Ok(response)
}

fn read_profile_page(
    path: &Path,
    options: ProfileOptions,
    paging: &PagingSettings,
    chart_rows: usize,
    page: PageRequest,
) -> crate::error::Result<ProfileResponse> {
    let profile = profile_file(path, options)?;
    let pagination = page.resolve(profile.total_rows, paging)?;
    let rows = read_window(path, &pagination)?;
    let chart_rows = RecordStream::open(path)?
        .take(chart_rows)
        .collect::<crate::error::Result<Vec<_>>>()?;

    Ok(ProfileResponse {
        rows,
        pagination,
        statistics: MissingnessReport::from_profile(&profile),
        profile,
        chart_rows,
    })
}

/// # Errors
///
/// Any stage failure, see [`Workflow::extract`].
pub async fn extract(
    workflow: &Workflow,
    config: &ExtractionConfig,
    abort: &AbortSignal,
) -> CommandResult<ExtractionOutcome> {
    Ok(workflow.extract(config, abort).await?)
}

/// # Errors
///
/// Any stage failure, see [`Workflow::clean`].
pub async fn clean(
    workflow: &Workflow,
    config: &CleaningConfig,
    abort: &AbortSignal,
) -> CommandResult<CleaningOutcome> {
    Ok(workflow.clean(config, abort).await?)
}

/// # Errors
///
/// Any stage failure, see [`Workflow::train`].
pub async fn train(
    workflow: &Workflow,
    config: &TrainingConfig,
    abort: &AbortSignal,
) -> CommandResult<TrainingOutcome> {
    Ok(workflow.train(config, abort).await?)
}

/// # Errors
///
/// `not_found` before the first training run.
pub async fn model_results(workflow: &Workflow) -> CommandResult<TrainingReport> {
    Ok(workflow.model_results().await?)
}
