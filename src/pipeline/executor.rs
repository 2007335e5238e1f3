//! Stage orchestration.
//!
//! A [`Workflow`] owns the settings and the run locks. Each stage goes
//! through the same sequence:
//!
//! 1. validate the request (no disk effects on failure)
//! 2. wait for the run locks of the input and output artifacts
//! 3. check the input artifact and the columns the request refers to
//! 4. remove a stale output, write the generated script
//! 5. supervise the worker
//! 6. verify the output artifact before reporting success
//!
//! The locks are held until verification is done, so a stage never reads a
//! file another stage is rewriting.

use super::cleaning::{ScriptFiles, render_cleaning_script};
use super::extraction::render_extraction_script;
use super::lock::{RunGuard, RunLocks};
use super::results::TrainingReport;
use super::training::render_training_script;
use super::spec::{
    CleaningConfig, CleaningPlan, ColumnTarget, ExtractionConfig, ExtractionPlan, TrainingConfig,
    TrainingPlan,
};
use super::validation::{check_columns_exist, validate_cleaning, validate_extraction, validate_training};
use crate::analyser::{DatasetProfile, ProfileOptions, profile_file};
use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::reader::{ReadOptions, RecordStream, read_header};
use crate::runner::{AbortSignal, Invocation, RunResult, Supervisor, TracingSink};
use crate::utils::run_blocking;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument as _;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Clean,
    Train,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Clean => "clean",
            Self::Train => "train",
        }
    }
}

/// A script as written to the artifacts directory.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedScript {
    pub path: PathBuf,
    pub text: String,
}

/// Shape of a CSV artifact after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableShape {
    pub columns: Vec<String>,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub script: GeneratedScript,
    pub run: RunResult,
    pub output: TableShape,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningOutcome {
    pub script: GeneratedScript,
    pub run: RunResult,
    pub input: TableShape,
    pub output: TableShape,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingOutcome {
    pub script: GeneratedScript,
    pub run: RunResult,
    pub report: TrainingReport,
    pub elapsed_secs: f64,
}

/// Everything one worker run needs once its request has been accepted.
struct Job {
    stage: Stage,
    script_name: String,
    script_text: String,
    output: PathBuf,
}

pub struct Workflow {
    config: WorkflowConfig,
    locks: RunLocks,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("artifacts_dir", &self.config.artifacts_dir)
            .field("interpreter", &self.config.interpreter)
            .finish_non_exhaustive()
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

async fn require_input(path: &Path, hint: &str) -> Result<()> {
    if is_file(path).await {
        Ok(())
    } else {
        Err(WorkflowError::MissingPrecondition {
            artifact: path.to_path_buf(),
            hint: hint.to_owned(),
        })
    }
}

async fn remove_stale(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed output from previous run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Re-read a CSV artifact end to end.
fn table_shape(path: &Path) -> Result<TableShape> {
    let stream = RecordStream::open_with(
        path,
        ReadOptions {
            require_records: false,
        },
    )?;
    let columns = stream.columns().to_vec();
    let mut rows = 0;
    for record in stream {
        record?;
        rows += 1;
    }
    Ok(TableShape { columns, rows })
}

fn corrupt(path: &Path, message: String) -> WorkflowError {
    WorkflowError::CorruptArtifact {
        artifact: path.to_path_buf(),
        message,
    }
}

/// Re-read a CSV artifact, reporting any parse failure as corruption.
fn verify_table(path: &Path) -> Result<TableShape> {
    table_shape(path).map_err(|err| match err {
        WorkflowError::MalformedRow { .. }
        | WorkflowError::DuplicateColumn { .. }
        | WorkflowError::Csv { .. } => corrupt(path, err.to_string()),
        other => other,
    })
}

fn check_cleaned_columns(
    path: &Path,
    plan: &CleaningPlan,
    input: &[String],
    output: &[String],
) -> Result<()> {
    if plan.null_handling.may_drop_columns() {
        if let Some(extra) = output.iter().find(|c| !input.contains(c)) {
            return Err(corrupt(
                path,
                format!("column '{extra}' does not exist in the input"),
            ));
        }
    } else if input != output {
        return Err(corrupt(
            path,
            format!(
                "expected columns [{}], found [{}]",
                input.join(", "),
                output.join(", ")
            ),
        ));
    }
    Ok(())
}

async fn table_shape_of(path: &Path) -> Result<TableShape> {
    let path = path.to_path_buf();
    run_blocking(move || table_shape(&path)).await
}

async fn verify_table_of(path: &Path) -> Result<TableShape> {
    let path = path.to_path_buf();
    run_blocking(move || verify_table(&path)).await
}

async fn load_report(path: &Path) -> Result<TrainingReport> {
    let path = path.to_path_buf();
    run_blocking(move || TrainingReport::from_path(&path)).await
}

fn elapsed_secs(started: Instant) -> f64 {
    started.elapsed().as_secs_f64()
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            locks: RunLocks::new(),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Script preview

    /// Validate `config` and render the extraction script without running it.
    ///
    /// # Errors
    ///
    /// `Validation` when the request is invalid.
    pub fn extraction_script(&self, config: &ExtractionConfig) -> Result<String> {
        let plan = validate_extraction(config)?;
        Ok(self.render_extraction(&plan))
    }

    /// Validate `config` and render the cleaning script without running it.
    ///
    /// # Errors
    ///
    /// `Validation` when the request is invalid.
    pub fn cleaning_script(&self, config: &CleaningConfig) -> Result<String> {
        let plan = validate_cleaning(config)?;
        Ok(self.render_cleaning(&plan))
    }

    /// Validate `config` and render the training script without running it.
    ///
    /// # Errors
    ///
    /// `Validation` when the request is invalid.
    pub fn training_script(&self, config: &TrainingConfig) -> Result<String> {
        let plan = validate_training(config)?;
        Ok(self.render_training(&plan))
    }

    fn render_extraction(&self, plan: &ExtractionPlan) -> String {
        render_extraction_script(plan, &self.config.artifacts.raw_csv)
    }

    fn render_cleaning(&self, plan: &CleaningPlan) -> String {
        let names = &self.config.artifacts;
        render_cleaning_script(
            plan,
            ScriptFiles {
                input: &names.raw_csv,
                output: &names.cleaned_csv,
            },
        )
    }

    fn render_training(&self, plan: &TrainingPlan) -> String {
        let names = &self.config.artifacts;
        render_training_script(
            plan,
            ScriptFiles {
                input: &names.cleaned_csv,
                output: &names.training_results,
            },
        )
    }

    // ------------------------------------------------------------------
    // Stages

    /// Run the extraction stage, producing the raw CSV.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad request, process errors from the worker, and
    /// `ArtifactNotProduced`/`CorruptArtifact` when the CSV is missing or its
    /// header does not match the requested fields.
    pub async fn extract(
        &self,
        config: &ExtractionConfig,
        abort: &AbortSignal,
    ) -> Result<ExtractionOutcome> {
        let started = Instant::now();
        let plan = validate_extraction(config)?;

        let output = self.config.raw_csv_path();
        let _guards = self.lock_artifacts(&[&output]).await?;
        let job = Job {
            stage: Stage::Extract,
            script_name: self.config.artifacts.extraction_script.clone(),
            script_text: self.render_extraction(&plan),
            output: output.clone(),
        };
        let (script, mut run) = self.execute(job, abort).await?;

        let shape = verify_table_of(&output).await?;
        let expected = plan.column_names();
        if shape.columns != expected {
            return Err(corrupt(
                &output,
                format!(
                    "expected columns [{}], found [{}]",
                    expected.join(", "),
                    shape.columns.join(", ")
                ),
            ));
        }
        run.produced_artifact_path = Some(output);

        Ok(ExtractionOutcome {
            script,
            run,
            output: shape,
            elapsed_secs: elapsed_secs(started),
        })
    }

    /// Run the cleaning stage over the raw CSV.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad request or an unknown target column,
    /// `MissingPrecondition` when there is no raw CSV, process errors from the
    /// worker, and `ArtifactNotProduced`/`CorruptArtifact` when the cleaned
    /// CSV is missing or has unexpected columns.
    pub async fn clean(&self, config: &CleaningConfig, abort: &AbortSignal) -> Result<CleaningOutcome> {
        let started = Instant::now();
        let plan = validate_cleaning(config)?;

        let input_path = self.config.raw_csv_path();
        let output = self.config.cleaned_csv_path();
        let _guards = self.lock_artifacts(&[&input_path, &output]).await?;

        require_input(&input_path, "Run the extraction stage first to produce the raw data").await?;
        let input = table_shape_of(&input_path).await?;
        if let ColumnTarget::Column(name) = &plan.target {
            check_columns_exist(&input.columns, &[("targetColumn", name.as_str())])?;
        }

        let job = Job {
            stage: Stage::Clean,
            script_name: self.config.artifacts.cleaning_script.clone(),
            script_text: self.render_cleaning(&plan),
            output: output.clone(),
        };
        let (script, mut run) = self.execute(job, abort).await?;

        let shape = verify_table_of(&output).await?;
        check_cleaned_columns(&output, &plan, &input.columns, &shape.columns)?;
        run.produced_artifact_path = Some(output);

        Ok(CleaningOutcome {
            script,
            run,
            input,
            output: shape,
            elapsed_secs: elapsed_secs(started),
        })
    }

    /// Run the training stage over the cleaned CSV.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad request or unknown columns,
    /// `MissingPrecondition` when there is no cleaned CSV, process errors from
    /// the worker, and `ArtifactNotProduced`/`CorruptArtifact` when the result
    /// document is missing or malformed.
    pub async fn train(&self, config: &TrainingConfig, abort: &AbortSignal) -> Result<TrainingOutcome> {
        let started = Instant::now();
        let plan = validate_training(config)?;

        let input_path = self.config.cleaned_csv_path();
        let output = self.config.training_results_path();
        let _guards = self.lock_artifacts(&[&input_path, &output]).await?;

        require_input(&input_path, "Run the cleaning stage first to produce the cleaned data").await?;
        let header = {
            let path = input_path.clone();
            run_blocking(move || read_header(&path)).await?
        };
        let mut wanted = vec![("targetVariable".to_owned(), plan.target.as_str())];
        for (idx, feature) in plan.features.iter().enumerate() {
            wanted.push((format!("featureColumns.{idx}"), feature.as_str()));
        }
        let wanted: Vec<(&str, &str)> = wanted.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        check_columns_exist(&header, &wanted)?;

        let job = Job {
            stage: Stage::Train,
            script_name: self.config.artifacts.training_script.clone(),
            script_text: self.render_training(&plan),
            output: output.clone(),
        };
        let (script, mut run) = self.execute(job, abort).await?;

        let report = load_report(&output).await?;
        run.produced_artifact_path = Some(output);

        Ok(TrainingOutcome {
            script,
            run,
            report,
            elapsed_secs: elapsed_secs(started),
        })
    }

    // ------------------------------------------------------------------
    // Queries

    /// Profile the CSV at `path` with the configured settings.
    ///
    /// Takes no lock; pair it with [`Self::lock_artifacts`] when a stage may
    /// be rewriting the file.
    ///
    /// # Errors
    ///
    /// `NotFound`, `EmptyInput` or `MalformedRow` from the reader.
    pub fn profile(&self, path: &Path) -> Result<DatasetProfile> {
        profile_file(path, ProfileOptions::from(&self.config.profiling))
    }

    /// The result document of the last successful training run.
    ///
    /// Waits for a training run in progress to finish first.
    ///
    /// # Errors
    ///
    /// `NotFound` when no training has run yet, `CorruptArtifact` when the
    /// document cannot be parsed.
    pub async fn model_results(&self) -> Result<TrainingReport> {
        let path = self.config.training_results_path();
        let _guards = self.lock_artifacts(&[&path]).await?;
        load_report(&path).await
    }

    /// Wait for exclusive use of `artifacts`.
    ///
    /// Creates the artifacts directory first so every path resolves to the
    /// same lock key whether or not a run has happened yet. Stages call this
    /// with their input and output; readers with the file they read.
    ///
    /// # Errors
    ///
    /// `Io` when the artifacts directory cannot be created.
    pub async fn lock_artifacts(&self, artifacts: &[&Path]) -> Result<Vec<RunGuard>> {
        tokio::fs::create_dir_all(&self.config.artifacts_dir).await?;
        let guards = self.locks.acquire_all(artifacts).await;
        tracing::debug!(count = guards.len(), "run locks acquired");
        Ok(guards)
    }

    // ------------------------------------------------------------------

    async fn execute(&self, job: Job, abort: &AbortSignal) -> Result<(GeneratedScript, RunResult)> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", stage = job.stage.name(), %run_id);
        self.execute_inner(job, abort).instrument(span).await
    }

    /// Caller holds the locks for the job's artifacts.
    async fn execute_inner(&self, job: Job, abort: &AbortSignal) -> Result<(GeneratedScript, RunResult)> {
        tracing::info!(output = %job.output.display(), "run started");

        let working_dir = std::path::absolute(&self.config.artifacts_dir)?;
        remove_stale(&job.output).await?;

        let script_path = working_dir.join(&job.script_name);
        tokio::fs::write(&script_path, &job.script_text).await?;
        tracing::debug!(script = %script_path.display(), bytes = job.script_text.len(), "script written");

        let supervisor = Supervisor::new(
            &self.config.interpreter,
            Arc::new(TracingSink {
                stage: job.stage.name(),
            }),
        );
        let invocation = Invocation {
            script: &script_path,
            working_dir: &working_dir,
            timeout: self.config.run_timeout(),
        };
        let run = supervisor.run(&invocation, abort).await?.into_success()?;

        if !is_file(&job.output).await {
            return Err(WorkflowError::ArtifactNotProduced {
                artifact: job.output,
                stdout: run.stdout,
                stderr: run.stderr,
            });
        }

        Ok((
            GeneratedScript {
                path: script_path,
                text: job.script_text,
            },
            run,
        ))
    }
}
