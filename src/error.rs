//! Error handling for profiling, script synthesis and worker runs.
//!
//! Every failure in this crate is a returned value. The variants follow the
//! four families callers care about:
//!
//! - **Precondition** errors (`MissingPrecondition`, `Validation`): nothing was
//!   spawned, fix the input and retry.
//! - **Parse/format** errors (`NotFound`, `EmptyInput`, `MalformedRow`,
//!   `DuplicateColumn`, `CorruptArtifact`): carry the file and the shape that
//!   was expected versus observed.
//! - **Process** errors (`SpawnError`, `ProcessFailed`, `Timeout`, `Aborted`,
//!   `ArtifactNotProduced`): captured stderr and exit code travel with the
//!   error verbatim.
//! - **Paging** errors (`InvalidPage`, `InvalidPageSize`).
//!
//! ```
//! use pipewright::error::WorkflowError;
//!
//! let err = WorkflowError::InvalidPage { page: 5, total_pages: 2 };
//! assert_eq!(err.kind(), "invalid_page");
//! assert_eq!(err.to_string(), "Page 5 does not exist. Total pages: 2");
//! ```

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A single problem found while validating a configuration object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Dotted path of the offending field, e.g. `fields.2.selector`.
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Main error type for pipewright operations.
#[derive(Debug)]
pub enum WorkflowError {
    /// I/O errors outside of the more specific cases below
    Io(std::io::Error),

    /// Input file does not exist
    NotFound(PathBuf),

    /// File has a header but no data records
    EmptyInput(PathBuf),

    /// A row's field count does not match the header
    MalformedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Header contains the same column name twice
    DuplicateColumn { path: PathBuf, column: String },

    /// Low-level CSV decoding failure (invalid UTF-8, broken quoting)
    Csv { path: PathBuf, message: String },

    /// Page number is zero or past the last page
    InvalidPage { page: usize, total_pages: usize },

    /// Page size outside the accepted range
    InvalidPageSize { page_size: usize, max: usize },

    /// Configuration object failed validation; all issues are collected
    Validation(Vec<FieldIssue>),

    /// A stage's required input artifact is missing
    MissingPrecondition { artifact: PathBuf, hint: String },

    /// The interpreter could not be located or executed
    SpawnError { interpreter: PathBuf, message: String },

    /// The worker exited with a non-zero status
    ProcessFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The worker exceeded its deadline and was terminated
    Timeout { seconds: u64, stderr: String },

    /// The caller aborted the run
    Aborted,

    /// The worker exited cleanly but its output artifact is missing
    ArtifactNotProduced {
        artifact: PathBuf,
        stdout: String,
        stderr: String,
    },

    /// The output artifact exists but cannot be parsed in its declared format
    CorruptArtifact { artifact: PathBuf, message: String },

    /// Settings file or environment overrides are unusable
    Config(String),

    /// Generic error with context
    Other(String),
}

impl WorkflowError {
    /// Stable, machine-readable name of the error family.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::NotFound(_) => "not_found",
            Self::EmptyInput(_) => "empty_input",
            Self::MalformedRow { .. } => "malformed_row",
            Self::DuplicateColumn { .. } => "duplicate_column",
            Self::Csv { .. } => "csv",
            Self::InvalidPage { .. } => "invalid_page",
            Self::InvalidPageSize { .. } => "invalid_page_size",
            Self::Validation(_) => "validation",
            Self::MissingPrecondition { .. } => "missing_precondition",
            Self::SpawnError { .. } => "spawn_error",
            Self::ProcessFailed { .. } => "process_failed",
            Self::Timeout { .. } => "timeout",
            Self::Aborted => "aborted",
            Self::ArtifactNotProduced { .. } => "artifact_not_produced",
            Self::CorruptArtifact { .. } => "corrupt_artifact",
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }

    /// Field-level issues, empty for anything but `Validation`.
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            Self::Validation(issues) => issues,
            _ => &[],
        }
    }

    /// Whether the caller can fix this by correcting its input and retrying.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::MissingPrecondition { .. }
                | Self::InvalidPage { .. }
                | Self::InvalidPageSize { .. }
        )
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::NotFound(path) => write!(f, "File not found: {}", path.display()),
            Self::EmptyInput(path) => write!(f, "CSV file is empty: {}", path.display()),
            Self::MalformedRow {
                path,
                line,
                expected,
                found,
            } => write!(
                f,
                "Malformed row at {}:{line}: expected {expected} fields, found {found}",
                path.display()
            ),
            Self::DuplicateColumn { path, column } => write!(
                f,
                "Duplicate column '{column}' in header of {}",
                path.display()
            ),
            Self::Csv { path, message } => {
                write!(f, "Failed to read CSV {}: {message}", path.display())
            }
            Self::InvalidPage { page, total_pages } => {
                if *page == 0 {
                    write!(f, "Page must be >= 1")
                } else {
                    write!(f, "Page {page} does not exist. Total pages: {total_pages}")
                }
            }
            Self::InvalidPageSize { max, .. } => {
                write!(f, "Page size must be between 1 and {max}")
            }
            Self::Validation(issues) => {
                write!(f, "Validation failed")?;
                for issue in issues {
                    write!(f, "; {issue}")?;
                }
                Ok(())
            }
            Self::MissingPrecondition { artifact, hint } => {
                write!(f, "Input file '{}' not found. {hint}", artifact.display())
            }
            Self::SpawnError {
                interpreter,
                message,
            } => write!(
                f,
                "Failed to start interpreter '{}': {message}",
                interpreter.display()
            ),
            Self::ProcessFailed {
                exit_code, stderr, ..
            } => match exit_code {
                Some(code) => write!(f, "Worker script failed with exit code {code}: {stderr}"),
                None => write!(f, "Worker script was terminated by a signal: {stderr}"),
            },
            Self::Timeout { seconds, .. } => {
                write!(f, "Worker script timed out after {seconds} seconds")
            }
            Self::Aborted => write!(f, "Operation aborted by user"),
            Self::ArtifactNotProduced { artifact, .. } => write!(
                f,
                "Worker script finished but did not produce '{}'",
                artifact.display()
            ),
            Self::CorruptArtifact { artifact, message } => write!(
                f,
                "Output artifact '{}' is unreadable: {message}",
                artifact.display()
            ),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for WorkflowError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<WorkflowError> for String {
    fn from(err: WorkflowError) -> Self {
        err.to_string()
    }
}

/// Result type alias for pipewright operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<WorkflowError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: WorkflowError = e.into();
            WorkflowError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: WorkflowError = e.into();
            WorkflowError::Other(format!("{}: {}", f(), err))
        })
    }
}
