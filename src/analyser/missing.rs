//! Missing-value statistics shown next to the paged data view.

use super::types::DatasetProfile;
use crate::utils::round2;
use serde::Serialize;

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMissing {
    pub column_name: String,
    pub missing_count: usize,
    pub missing_percentage: f64,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissingnessReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub total_missing_values: usize,
    /// Share of non-missing cells; 100 for a file without rows
    pub completeness_rate: f64,
    pub column_stats: Vec<ColumnMissing>,
}

impl MissingnessReport {
    /// Derive the report from a profile; a value is missing exactly when the
    /// profiler counted it as null.
    pub fn from_profile(profile: &DatasetProfile) -> Self {
        let total_rows = profile.total_rows;
        let total_columns = profile.columns.len();

        if total_rows == 0 {
            return Self {
                total_rows,
                total_columns,
                total_missing_values: 0,
                completeness_rate: 100.0,
                column_stats: Vec::new(),
            };
        }

        let column_stats: Vec<ColumnMissing> = profile
            .columns
            .iter()
            .map(|column| ColumnMissing {
                column_name: column.name.clone(),
                missing_count: column.null_count,
                missing_percentage: round2(column.null_count as f64 / total_rows as f64 * 100.0),
            })
            .collect();

        let total_missing_values = column_stats.iter().map(|c| c.missing_count).sum();
        let total_cells = total_rows * total_columns;
        let completeness_rate = if total_cells == 0 {
            100.0
        } else {
            round2((total_cells - total_missing_values) as f64 / total_cells as f64 * 100.0)
        };

        Self {
            total_rows,
            total_columns,
            total_missing_values,
            completeness_rate,
            column_stats,
        }
    }
}
