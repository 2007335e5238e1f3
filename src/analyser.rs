//! Column profiling.
//!
//! Reads a CSV file once and reports, per column, the inferred semantic type,
//! null and distinct counts, sample values and a type-specific summary:
//!
//! - numeric: min, max, mean, median, population std, q1, q3
//! - categorical: frequency table, top-K by count
//! - datetime: earliest and latest timestamp
//!
//! ```no_run
//! use pipewright::analyser::{self, ProfileOptions};
//!
//! let profile = analyser::profile_file("generated/clean_data.csv", ProfileOptions::default())?;
//! for column in &profile.columns {
//!     println!("{}: {} ({} nulls)", column.name, column.inferred_type, column.null_count);
//! }
//! # Ok::<(), pipewright::error::WorkflowError>(())
//! ```

pub mod inference;
pub mod missing;
pub mod profiling;
pub mod types;

pub use inference::InferenceThresholds;
pub use missing::{ColumnMissing, MissingnessReport};
pub use profiling::{ColumnAccumulator, NumericAccumulator, ProfileOptions, Profiler, profile_records};
pub use types::{
    ColumnKind, ColumnProfile, ColumnSummary, DatasetProfile, DateRange, FrequencyEntry,
    FrequencyTable, NumericSummary,
};

use crate::error::Result;
use crate::reader::RecordStream;
use std::path::Path;

/// Profile every record of the file at `path` in a single streaming pass.
///
/// # Errors
///
/// Fails if the file is missing, has no data records or contains a row whose
/// width does not match the header.
pub fn profile_file(path: impl AsRef<Path>, options: ProfileOptions) -> Result<DatasetProfile> {
    let path = path.as_ref();
    let stream = RecordStream::open(path)?;
    let columns = stream.shared_columns();
    let profile = profile_records(&columns, stream, options)?;
    tracing::info!(
        path = %path.display(),
        rows = profile.total_rows,
        columns = profile.columns.len(),
        "Profiled file"
    );
    Ok(profile)
}
