use serde::ser::{SerializeMap as _, Serializer};
use serde::{Deserialize, Serialize};

/// Semantic type inferred for a column.
#[derive(Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Debug, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Datetime,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
        }
    }
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub inferred_type: ColumnKind,
    /// Distinct non-missing values
    pub unique_count: usize,
    pub null_count: usize,
    /// First distinct non-missing values in file order
    pub sample_values: Vec<String>,
}

impl ColumnProfile {
    pub fn non_null_count(&self, total_rows: usize) -> usize {
        total_rows.saturating_sub(self.null_count)
    }
}

/// Display-ready distribution summary of a numeric column.
///
/// Every field is rounded to two decimals; [`NumericAccumulator`] keeps the
/// full-precision values.
///
/// [`NumericAccumulator`]: crate::analyser::NumericAccumulator
#[derive(Clone, Copy, Deserialize, Serialize, Debug, PartialEq)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub q1: f64,
    pub q3: f64,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
    /// Share of non-missing values, rounded to two decimals
    pub percentage: f64,
}

/// Value counts ordered by count descending, ties in first-seen order.
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct FrequencyTable(pub Vec<FrequencyEntry>);

impl FrequencyTable {
    pub fn entries(&self) -> &[FrequencyEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `k` most frequent entries (chart views use smaller `k` than summaries).
    pub fn top(&self, k: usize) -> Self {
        Self(self.0.iter().take(k).cloned().collect())
    }

    pub fn percentage_total(&self) -> f64 {
        self.0.iter().map(|e| e.percentage).sum()
    }
}

/// Earliest and latest timestamps of a datetime column, ISO 8601.
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub earliest: String,
    pub latest: String,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Frequency(FrequencyTable),
    DateRange(DateRange),
}

impl ColumnSummary {
    pub fn as_numeric(&self) -> Option<&NumericSummary> {
        match self {
            Self::Numeric(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_frequency(&self) -> Option<&FrequencyTable> {
        match self {
            Self::Frequency(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_date_range(&self) -> Option<&DateRange> {
        match self {
            Self::DateRange(r) => Some(r),
            _ => None,
        }
    }
}

/// Profile of a whole file.
///
/// `summary` holds one entry per column that had at least one usable value,
/// in header order.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetProfile {
    pub columns: Vec<ColumnProfile>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub datetime_columns: Vec<String>,
    pub total_rows: usize,
    #[serde(serialize_with = "ordered_map")]
    pub summary: Vec<(String, ColumnSummary)>,
}

/// Serialize `(key, value)` pairs as a JSON object without re-sorting keys.
fn ordered_map<S>(entries: &[(String, ColumnSummary)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn summary_for(&self, name: &str) -> Option<&ColumnSummary> {
        self.summary
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, summary)| summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str, count: usize, percentage: f64) -> FrequencyEntry {
        FrequencyEntry {
            value: value.to_owned(),
            count,
            percentage,
        }
    }

    #[test]
    fn test_column_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&ColumnKind::Datetime).expect("serialize"),
            "\"datetime\""
        );
        assert_eq!(ColumnKind::Numeric.to_string(), "numeric");
    }

    #[test]
    fn test_frequency_top_keeps_order() {
        let table = FrequencyTable(vec![entry("a", 3, 50.0), entry("b", 2, 33.33), entry("c", 1, 16.67)]);
        let top = table.top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top.entries()[1].value, "b");
        assert!((table.percentage_total() - 100.0).abs() < 0.05);
    }

    #[test]
    fn test_summary_serializes_untagged() {
        let numeric = ColumnSummary::Numeric(NumericSummary {
            min: 1.0,
            max: 3.0,
            mean: 2.0,
            median: 2.0,
            std: 0.82,
            q1: 1.0,
            q3: 3.0,
        });
        let json = serde_json::to_value(&numeric).expect("serialize");
        assert_eq!(json["median"], 2.0);

        let freq = ColumnSummary::Frequency(FrequencyTable(vec![entry("x", 1, 100.0)]));
        let json = serde_json::to_value(&freq).expect("serialize");
        assert!(json.is_array());
    }
}
