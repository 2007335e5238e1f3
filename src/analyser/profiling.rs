//! Single-pass column profiling.
//!
//! Each column gets a [`ColumnAccumulator`] that sees every value exactly
//! once. Distinct values are tracked in first-seen order so the frequency
//! tie-break is exact, and parsed numbers are kept at full precision until
//! the summary is rendered.

use super::inference::{self, InferenceThresholds};
use super::types::{
    ColumnKind, ColumnProfile, ColumnSummary, DatasetProfile, DateRange, FrequencyEntry,
    FrequencyTable, NumericSummary,
};
use crate::config::ProfilingSettings;
use crate::error::Result;
use crate::reader::Record;
use crate::utils::round2;
use chrono::NaiveDateTime;
use std::collections::HashMap;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Knobs for one profiling pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileOptions {
    pub thresholds: InferenceThresholds,
    pub frequency_top_k: usize,
    pub sample_values: usize,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self::from(&ProfilingSettings::default())
    }
}

impl From<&ProfilingSettings> for ProfileOptions {
    fn from(settings: &ProfilingSettings) -> Self {
        Self {
            thresholds: InferenceThresholds::from(settings),
            frequency_top_k: settings.frequency_top_k,
            sample_values: settings.sample_values,
        }
    }
}

/// Full-precision numeric values of one column.
#[derive(Debug, Default, Clone)]
pub struct NumericAccumulator {
    values: Vec<f64>,
    sum: f64,
}

impl NumericAccumulator {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        (!self.values.is_empty()).then(|| self.sum / self.values.len() as f64)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.values.len() as f64;
        Some(variance.sqrt())
    }

    /// Summarise the values; `None` when nothing was pushed.
    pub fn summarize(&self) -> Option<NumericSummary> {
        let mean = self.mean()?;
        let std = self.std_dev()?;

        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let at = |idx: usize| sorted.get(idx.min(n - 1)).copied();
        let median = if n % 2 == 0 {
            (at(n / 2 - 1)? + at(n / 2)?) / 2.0
        } else {
            at(n / 2)?
        };

        // Every field goes through the same monotone rounding, which keeps
        // min <= q1 <= median <= q3 <= max intact
        Some(NumericSummary {
            min: round2(at(0)?),
            max: round2(at(n - 1)?),
            mean: round2(mean),
            median: round2(median),
            std: round2(std),
            q1: round2(at(n / 4)?),
            q3: round2(at(n * 3 / 4)?),
        })
    }
}

/// Everything observed about one column during the pass.
#[derive(Debug, Default)]
pub struct ColumnAccumulator {
    name: String,
    null_count: usize,
    distinct: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
    numeric: NumericAccumulator,
    datetime_hits: usize,
    earliest: Option<NaiveDateTime>,
    latest: Option<NaiveDateTime>,
}

impl ColumnAccumulator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn observe(&mut self, value: &str) {
        if inference::is_missing(value) {
            self.null_count += 1;
            return;
        }

        match self.positions.get(value) {
            Some(&idx) => {
                if let Some((_, count)) = self.distinct.get_mut(idx) {
                    *count += 1;
                }
            }
            None => {
                self.positions.insert(value.to_owned(), self.distinct.len());
                self.distinct.push((value.to_owned(), 1));
            }
        }

        if let Some(number) = inference::parse_number(value) {
            self.numeric.push(number);
        } else if let Some(ts) = inference::parse_datetime(value) {
            self.datetime_hits += 1;
            self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
            self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
        }
    }

    pub fn non_null_count(&self) -> usize {
        self.distinct.iter().map(|(_, count)| count).sum()
    }

    pub fn kind(&self, thresholds: InferenceThresholds) -> ColumnKind {
        inference::classify(
            self.numeric.len(),
            self.datetime_hits,
            self.non_null_count(),
            thresholds,
        )
    }

    /// Frequency table over non-missing values, truncated to `top_k`.
    pub fn frequencies(&self, top_k: usize) -> FrequencyTable {
        let total = self.non_null_count();
        if total == 0 {
            return FrequencyTable::default();
        }

        // Stable sort keeps first-seen order among equal counts.
        let mut ordered: Vec<&(String, usize)> = self.distinct.iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));

        FrequencyTable(
            ordered
                .into_iter()
                .take(top_k)
                .map(|(value, count)| FrequencyEntry {
                    value: value.clone(),
                    count: *count,
                    percentage: round2(*count as f64 / total as f64 * 100.0),
                })
                .collect(),
        )
    }

    fn date_range(&self) -> Option<DateRange> {
        Some(DateRange {
            earliest: self.earliest?.format(ISO_FORMAT).to_string(),
            latest: self.latest?.format(ISO_FORMAT).to_string(),
        })
    }

    fn finish(self, options: &ProfileOptions) -> (ColumnProfile, Option<ColumnSummary>) {
        let kind = self.kind(options.thresholds);

        let summary = match kind {
            ColumnKind::Numeric => self.numeric.summarize().map(ColumnSummary::Numeric),
            ColumnKind::Datetime => self.date_range().map(ColumnSummary::DateRange),
            ColumnKind::Categorical => Some(self.frequencies(options.frequency_top_k))
                .filter(|table| !table.is_empty())
                .map(ColumnSummary::Frequency),
        };

        let profile = ColumnProfile {
            name: self.name,
            inferred_type: kind,
            unique_count: self.distinct.len(),
            null_count: self.null_count,
            sample_values: self
                .distinct
                .iter()
                .take(options.sample_values)
                .map(|(value, _)| value.clone())
                .collect(),
        };
        (profile, summary)
    }
}

/// Streaming profiler over records that share one header.
#[derive(Debug)]
pub struct Profiler {
    options: ProfileOptions,
    columns: Vec<ColumnAccumulator>,
    total_rows: usize,
}

impl Profiler {
    pub fn new(columns: &[String], options: ProfileOptions) -> Self {
        Self {
            options,
            columns: columns.iter().map(ColumnAccumulator::new).collect(),
            total_rows: 0,
        }
    }

    pub fn observe(&mut self, record: &Record) {
        self.total_rows += 1;
        for (acc, value) in self.columns.iter_mut().zip(record.values()) {
            acc.observe(value);
        }
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn finish(self) -> DatasetProfile {
        let mut profile = DatasetProfile {
            columns: Vec::with_capacity(self.columns.len()),
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            datetime_columns: Vec::new(),
            total_rows: self.total_rows,
            summary: Vec::new(),
        };

        for acc in self.columns {
            let (column, summary) = acc.finish(&self.options);
            let bucket = match column.inferred_type {
                ColumnKind::Numeric => &mut profile.numeric_columns,
                ColumnKind::Categorical => &mut profile.categorical_columns,
                ColumnKind::Datetime => &mut profile.datetime_columns,
            };
            bucket.push(column.name.clone());
            if let Some(summary) = summary {
                profile.summary.push((column.name.clone(), summary));
            }
            profile.columns.push(column);
        }

        tracing::debug!(
            rows = profile.total_rows,
            numeric = profile.numeric_columns.len(),
            categorical = profile.categorical_columns.len(),
            datetime = profile.datetime_columns.len(),
            "Profile complete"
        );
        profile
    }
}

/// Profile a stream of records in one pass, stopping at the first error.
pub fn profile_records<I>(columns: &[String], records: I, options: ProfileOptions) -> Result<DatasetProfile>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let mut profiler = Profiler::new(columns, options);
    for record in records {
        profiler.observe(&record?);
    }
    Ok(profiler.finish())
}
