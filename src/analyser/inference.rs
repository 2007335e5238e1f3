//! Value classification and column type inference.
//!
//! A value is *missing* when it is empty after trimming. Non-missing values
//! are tried as numbers first and as dates second, so a purely numeric column
//! is never reported as datetime.

use super::types::ColumnKind;
use crate::config::{DEFAULT_DATETIME_THRESHOLD, DEFAULT_NUMERIC_THRESHOLD, ProfilingSettings};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Minimum share of non-missing values that must parse for a type to win.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceThresholds {
    pub numeric: f64,
    pub datetime: f64,
}

impl Default for InferenceThresholds {
    fn default() -> Self {
        Self {
            numeric: DEFAULT_NUMERIC_THRESHOLD,
            datetime: DEFAULT_DATETIME_THRESHOLD,
        }
    }
}

impl From<&ProfilingSettings> for InferenceThresholds {
    fn from(settings: &ProfilingSettings) -> Self {
        Self {
            numeric: settings.numeric_threshold,
            datetime: settings.datetime_threshold,
        }
    }
}

pub fn is_missing(value: &str) -> bool {
    value.trim().is_empty()
}

/// Parse a finite number. `NaN` and infinities are not numbers here.
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a calendar date or timestamp; offsets are normalised to UTC.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Pick a column type from parse hit counts over `non_missing` values.
///
/// A column with no usable values is categorical.
pub fn classify(
    numeric_hits: usize,
    datetime_hits: usize,
    non_missing: usize,
    thresholds: InferenceThresholds,
) -> ColumnKind {
    if non_missing == 0 {
        return ColumnKind::Categorical;
    }
    let total = non_missing as f64;
    if numeric_hits as f64 / total >= thresholds.numeric {
        ColumnKind::Numeric
    } else if datetime_hits as f64 / total >= thresholds.datetime {
        ColumnKind::Datetime
    } else {
        ColumnKind::Categorical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values() {
        assert!(is_missing(""));
        assert!(is_missing("   "));
        assert!(!is_missing("0"));
        assert!(!is_missing("null"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("-1.5e3"), Some(-1500.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12abc"), None);
    }

    #[test]
    fn test_parse_datetime_formats() {
        for value in [
            "2024-03-01",
            "2024/03/01",
            "03/01/2024",
            "2024-03-01T10:15:00",
            "2024-03-01 10:15:00.250",
            "2024-03-01T10:15:00Z",
            "2024-03-01T12:15:00+02:00",
            "Fri, 01 Mar 2024 10:15:00 +0000",
        ] {
            assert!(parse_datetime(value).is_some(), "{value} should parse");
        }
        assert!(parse_datetime("2024").is_none());
        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn test_offsets_normalise_to_utc() {
        let a = parse_datetime("2024-03-01T12:15:00+02:00").expect("parse");
        let b = parse_datetime("2024-03-01T10:15:00Z").expect("parse");
        assert_eq!(a, b);
    }

    #[test]
    fn test_classify_order_and_threshold() {
        let t = InferenceThresholds::default();
        assert_eq!(classify(8, 0, 10, t), ColumnKind::Numeric);
        assert_eq!(classify(7, 0, 10, t), ColumnKind::Categorical);
        assert_eq!(classify(0, 9, 10, t), ColumnKind::Datetime);
        assert_eq!(classify(10, 10, 10, t), ColumnKind::Numeric);
        assert_eq!(classify(0, 0, 0, t), ColumnKind::Categorical);
    }

    #[test]
    fn test_thresholds_are_overridable() {
        let strict = InferenceThresholds {
            numeric: 1.0,
            datetime: 1.0,
        };
        assert_eq!(classify(9, 0, 10, strict), ColumnKind::Categorical);
    }
}
