//! Streaming CSV reader.
//!
//! [`RecordStream`] yields one [`Record`] at a time from a comma-separated
//! file whose first row is the header. Opening the stream reads the header
//! and pre-fetches the first record, so an empty file is reported up front
//! while the rest of the file is only read as the caller pulls records.
//!
//! Rows whose width differs from the header abort the read; every consumer
//! downstream assumes a consistent column set.

use crate::error::{Result, WorkflowError};
use crate::pager::PageWindow;
use serde::ser::{Serialize, SerializeMap as _, Serializer};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const UTF8_BOM: char = '\u{feff}';

/// One data row keyed by the file's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Record {
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(columns.len(), values.len(), "record width must match header");
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Value of `column`, or `None` when the column is not in the header.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// Column/value pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Fail with `EmptyInput` when the file has no data records
    pub require_records: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            require_records: true,
        }
    }
}

/// Lazy, finite, non-restartable sequence of records.
///
/// The underlying file handle is owned by the stream and released when the
/// stream is dropped, whether it was exhausted, failed or abandoned early.
/// After an error the stream is fused and yields nothing further.
pub struct RecordStream {
    path: PathBuf,
    reader: csv::Reader<File>,
    columns: Arc<[String]>,
    row: csv::StringRecord,
    pending: Option<Record>,
    done: bool,
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    /// Open `path`, failing with `EmptyInput` if it has no data records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_file(&path)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let columns = header_columns(&mut reader, &path)?;
        if columns.is_empty() && options.require_records {
            return Err(WorkflowError::EmptyInput(path));
        }

        let mut stream = Self {
            path,
            reader,
            columns: columns.into(),
            row: csv::StringRecord::new(),
            pending: None,
            done: false,
        };

        stream.pending = stream.read_next()?;
        if stream.pending.is_none() && options.require_records {
            return Err(WorkflowError::EmptyInput(stream.path));
        }

        tracing::debug!(
            path = %stream.path.display(),
            columns = stream.columns.len(),
            "Opened CSV stream"
        );
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Shared handle to the header, as stored in every record.
    pub fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    fn read_next(&mut self) -> Result<Option<Record>> {
        let more = self
            .reader
            .read_record(&mut self.row)
            .map_err(|e| csv_error(&self.path, &e))?;
        if !more {
            return Ok(None);
        }

        if self.row.len() != self.columns.len() {
            let line = self.row.position().map_or(0, csv::Position::line);
            return Err(WorkflowError::MalformedRow {
                path: self.path.clone(),
                line,
                expected: self.columns.len(),
                found: self.row.len(),
            });
        }

        let values = self.row.iter().map(str::to_owned).collect();
        Ok(Some(Record::new(Arc::clone(&self.columns), values)))
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(record) = self.pending.take() {
            return Some(Ok(record));
        }
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for RecordStream {}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WorkflowError::NotFound(path.to_path_buf())
        } else {
            WorkflowError::Io(e)
        }
    })
}

fn csv_error(path: &Path, err: &csv::Error) -> WorkflowError {
    WorkflowError::Csv {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn header_columns(reader: &mut csv::Reader<File>, path: &Path) -> Result<Vec<String>> {
    let headers = reader.headers().map_err(|e| csv_error(path, &e))?;

    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        let name = if idx == 0 {
            name.trim_start_matches(UTF8_BOM)
        } else {
            name
        };
        if columns.iter().any(|c| c == name) {
            return Err(WorkflowError::DuplicateColumn {
                path: path.to_path_buf(),
                column: name.to_owned(),
            });
        }
        columns.push(name.to_owned());
    }

    // A file with no bytes at all parses as a single empty header field.
    if columns.len() == 1 && columns.first().is_some_and(String::is_empty) {
        columns.clear();
    }
    Ok(columns)
}

/// Read only the header row of `path`.
pub fn read_header(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let stream = RecordStream::open_with(
        path,
        ReadOptions {
            require_records: false,
        },
    )?;
    Ok(stream.columns().to_vec())
}

/// Read every record of `path` into memory.
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    RecordStream::open(path)?.collect()
}

/// Read only the records inside `window`, stopping once it is filled.
///
/// Rows before the window are still checked for width; rows after it are
/// never read.
pub fn read_window(path: impl AsRef<Path>, window: &PageWindow) -> Result<Vec<Record>> {
    let stream = RecordStream::open_with(
        path,
        ReadOptions {
            require_records: false,
        },
    )?;
    let mut rows = Vec::with_capacity(window.end.saturating_sub(window.start));
    for (idx, record) in stream.enumerate().take(window.end) {
        let record = record?;
        if idx >= window.start {
            rows.push(record);
        }
    }
    Ok(rows)
}
