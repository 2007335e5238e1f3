//! Request validation.
//!
//! Turns caller requests into plans. Every problem is collected as a
//! [`FieldIssue`] keyed by the request's own field path, so a caller can fix
//! everything in one round trip. Nothing here touches the filesystem.

use super::spec::{
    CleaningConfig, CleaningPlan, ColumnTarget, ExtractionConfig, ExtractionPlan, FieldPlan,
    FieldSource, NullHandling, NullStrategy, SelectorKind, TrainingConfig, TrainingPlan,
};
use crate::error::{FieldIssue, Result, WorkflowError};
use std::collections::HashSet;

/// Longest accepted CSS selector.
pub const MAX_SELECTOR_LEN: usize = 500;

/// Placeholder a pagination template must contain.
pub const PAGE_PLACEHOLDER: &str = "{page}";

fn finish<T>(issues: Vec<FieldIssue>, plan: impl FnOnce() -> T) -> Result<T> {
    if issues.is_empty() {
        Ok(plan())
    } else {
        Err(WorkflowError::Validation(issues))
    }
}

/// Validate a cleaning request.
///
/// # Errors
///
/// Returns `Validation` listing every offending field.
pub fn validate_cleaning(config: &CleaningConfig) -> Result<CleaningPlan> {
    let mut issues = Vec::new();

    if config.target_column.trim().is_empty() {
        issues.push(FieldIssue::new("targetColumn", "Target column is required"));
    }

    let custom_value = config
        .custom_fill_value
        .as_deref()
        .filter(|v| !v.is_empty());
    if config.null_handling_strategy == NullStrategy::Custom && custom_value.is_none() {
        issues.push(FieldIssue::new(
            "customFillValue",
            "Custom value is required when the null handling strategy is 'custom'",
        ));
    }

    finish(issues, || CleaningPlan {
        target: ColumnTarget::parse(&config.target_column),
        trim_whitespace: config.trim_whitespace,
        dedupe: config.dedupe,
        null_handling: match config.null_handling_strategy {
            NullStrategy::Rows => NullHandling::DropRows,
            NullStrategy::Columns => NullHandling::DropColumns,
            NullStrategy::Mean => NullHandling::Mean,
            NullStrategy::Median => NullHandling::Median,
            NullStrategy::Mode => NullHandling::Mode,
            NullStrategy::Zero => NullHandling::Zero,
            NullStrategy::Custom => NullHandling::Custom {
                value: custom_value.unwrap_or_default().to_owned(),
            },
            NullStrategy::None => NullHandling::None,
        },
        normalization: config
            .normalization_enabled
            .then(|| config.normalization_strategy.into()),
    })
}

/// Validate a training request.
///
/// # Errors
///
/// Returns `Validation` listing every offending field.
pub fn validate_training(config: &TrainingConfig) -> Result<TrainingPlan> {
    let mut issues = Vec::new();

    let target = config.target_variable.trim();
    if target.is_empty() {
        issues.push(FieldIssue::new("targetVariable", "Target variable is required"));
    }

    if config.feature_columns.is_empty() {
        issues.push(FieldIssue::new(
            "featureColumns",
            "At least one feature column is required",
        ));
    }
    let mut seen = HashSet::new();
    let features: Vec<&str> = config.feature_columns.iter().map(|f| f.trim()).collect();
    for (idx, feature) in features.iter().copied().enumerate() {
        let path = format!("featureColumns.{idx}");
        if feature.is_empty() {
            issues.push(FieldIssue::new(path, "Feature column name cannot be empty"));
        } else if feature == target {
            issues.push(FieldIssue::new(
                path,
                format!("'{feature}' is the target variable and cannot also be a feature"),
            ));
        } else if !seen.insert(feature) {
            issues.push(FieldIssue::new(path, format!("'{feature}' is listed more than once")));
        }
    }

    let fraction = config.test_fraction;
    if !(fraction.is_finite() && fraction > 0.0 && fraction < 1.0) {
        issues.push(FieldIssue::new(
            "testFraction",
            format!("Test fraction must be between 0 and 1 (exclusive), got {fraction}"),
        ));
    }

    let seed = u32::try_from(config.random_seed);
    if seed.is_err() {
        issues.push(FieldIssue::new(
            "randomSeed",
            format!("Random seed must be between 0 and {}", u32::MAX),
        ));
    }

    finish(issues, || TrainingPlan {
        target: target.to_owned(),
        features: features.iter().map(|f| (*f).to_owned()).collect(),
        model: config.model_kind,
        balancing: config.balancing_technique,
        test_fraction: fraction,
        random_seed: seed.unwrap_or_default(),
    })
}

fn check_selector(issues: &mut Vec<FieldIssue>, path: &str, selector: &str) {
    if selector.trim().is_empty() {
        issues.push(FieldIssue::new(path, "CSS selector cannot be empty"));
    } else if selector.chars().count() > MAX_SELECTOR_LEN {
        issues.push(FieldIssue::new(path, "CSS selector is too long"));
    }
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

/// Validate an extraction request.
///
/// # Errors
///
/// Returns `Validation` listing every offending field.
pub fn validate_extraction(config: &ExtractionConfig) -> Result<ExtractionPlan> {
    let mut issues = Vec::new();

    if !is_web_url(&config.target_url) {
        issues.push(FieldIssue::new("targetUrl", "Target URL must be an http(s) URL"));
    }
    check_selector(&mut issues, "container", &config.container);

    let template = config
        .pagination_template
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(template) = template {
        if !template.contains(PAGE_PLACEHOLDER) {
            issues.push(FieldIssue::new(
                "paginationTemplate",
                format!("Pagination template must contain {PAGE_PLACEHOLDER}"),
            ));
        } else if !is_web_url(&template.replace(PAGE_PLACEHOLDER, "1")) {
            issues.push(FieldIssue::new(
                "paginationTemplate",
                "Pagination template must be an http(s) URL",
            ));
        }
    }

    let pages = u32::try_from(config.pages).ok().filter(|p| *p >= 1);
    if pages.is_none() {
        issues.push(FieldIssue::new("pages", "Pages must be a positive number"));
    }

    if config.fields.is_empty() {
        issues.push(FieldIssue::new("fields", "At least one field is required"));
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(config.fields.len());
    for (idx, field) in config.fields.iter().enumerate() {
        let name = field.column_name.trim();
        if name.is_empty() {
            issues.push(FieldIssue::new(
                format!("fields.{idx}.columnName"),
                "Column name cannot be empty",
            ));
        } else if !seen.insert(name) {
            issues.push(FieldIssue::new(
                format!("fields.{idx}.columnName"),
                format!("Column name '{name}' is used more than once"),
            ));
        }

        check_selector(&mut issues, &format!("fields.{idx}.selector"), &field.selector);

        let attribute = field
            .attribute_name
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        let source = match (field.source, attribute) {
            (SelectorKind::Content, _) => FieldSource::Content,
            (SelectorKind::Attribute, Some(attr)) => FieldSource::Attribute(attr.to_owned()),
            (SelectorKind::Attribute, None) => {
                issues.push(FieldIssue::new(
                    format!("fields.{idx}.attributeName"),
                    "attributeName is required when the selector type is 'attribute'",
                ));
                FieldSource::Content
            }
        };

        fields.push(FieldPlan {
            column_name: name.to_owned(),
            selector: field.selector.trim().to_owned(),
            source,
            data_type: field.data_type,
        });
    }

    finish(issues, || ExtractionPlan {
        target_url: config.target_url.trim().to_owned(),
        container: config.container.trim().to_owned(),
        pagination_template: template.map(str::to_owned),
        pages: pages.unwrap_or(1),
        fields,
    })
}

/// Check that every column a plan refers to exists in the input header.
///
/// # Errors
///
/// Returns `Validation` with one issue per unknown column.
pub fn check_columns_exist(header: &[String], wanted: &[(&str, &str)]) -> Result<()> {
    let issues: Vec<FieldIssue> = wanted
        .iter()
        .filter(|(_, column)| !header.iter().any(|h| h == column))
        .map(|(path, column)| {
            FieldIssue::new(*path, format!("Column '{column}' not found in input data"))
        })
        .collect();
    finish(issues, || ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::spec::{
        Balancing, FieldConfig, FieldType, ModelKind, Normalization, NormalizationStrategy,
    };

    fn cleaning(strategy: NullStrategy, custom: Option<&str>) -> CleaningConfig {
        CleaningConfig {
            target_column: "all".to_owned(),
            null_handling_strategy: strategy,
            normalization_strategy: NormalizationStrategy::MinMaxUnit,
            custom_fill_value: custom.map(str::to_owned),
            trim_whitespace: false,
            dedupe: false,
            normalization_enabled: false,
        }
    }

    fn training() -> TrainingConfig {
        TrainingConfig {
            target_variable: "label".to_owned(),
            feature_columns: vec!["a".to_owned(), "b".to_owned()],
            model_kind: ModelKind::DecisionTree,
            balancing_technique: Balancing::Both,
            test_fraction: 0.2,
            random_seed: 42,
        }
    }

    fn extraction() -> ExtractionConfig {
        ExtractionConfig {
            target_url: "https://example.com/shop".to_owned(),
            container: "li.product".to_owned(),
            pagination_template: None,
            pages: 1,
            fields: vec![FieldConfig {
                column_name: "name".to_owned(),
                selector: "h2".to_owned(),
                source: SelectorKind::Content,
                attribute_name: None,
                data_type: FieldType::Text,
            }],
        }
    }

    #[test]
    fn test_custom_without_value_is_rejected() {
        for missing in [None, Some("")] {
            let err = validate_cleaning(&cleaning(NullStrategy::Custom, missing))
                .expect_err("custom needs a value");
            assert_eq!(err.issues().len(), 1);
            assert_eq!(err.issues()[0].path, "customFillValue");
        }
    }

    #[test]
    fn test_custom_with_value_is_accepted() {
        let plan = validate_cleaning(&cleaning(NullStrategy::Custom, Some("N/A"))).expect("valid");
        assert_eq!(
            plan.null_handling,
            NullHandling::Custom {
                value: "N/A".to_owned()
            }
        );
        assert_eq!(plan.target, ColumnTarget::All);
    }

    #[test]
    fn test_cleaning_issues_are_collected() {
        let mut config = cleaning(NullStrategy::Custom, None);
        config.target_column = "  ".to_owned();
        let err = validate_cleaning(&config).expect_err("two problems");
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["targetColumn", "customFillValue"]);
    }

    #[test]
    fn test_normalization_only_when_enabled() {
        let mut config = cleaning(NullStrategy::Mean, None);
        config.normalization_strategy = NormalizationStrategy::ZScore;
        assert_eq!(validate_cleaning(&config).expect("valid").normalization, None);

        config.normalization_enabled = true;
        assert_eq!(
            validate_cleaning(&config).expect("valid").normalization,
            Some(Normalization::ZScore)
        );
    }

    #[test]
    fn test_training_valid() {
        let plan = validate_training(&training()).expect("valid");
        assert_eq!(plan.random_seed, 42);
        assert_eq!(plan.features, ["a", "b"]);
    }

    #[test]
    fn test_training_issues_are_collected() {
        let mut config = training();
        config.feature_columns = vec!["label".to_owned(), "a".to_owned(), "a".to_owned()];
        config.test_fraction = 1.0;
        config.random_seed = -1;

        let err = validate_training(&config).expect_err("invalid");
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            ["featureColumns.0", "featureColumns.2", "testFraction", "randomSeed"]
        );
    }

    #[test]
    fn test_training_names_are_trimmed_alike() {
        let mut config = training();
        config.target_variable = " label ".to_owned();
        config.feature_columns = vec![" a".to_owned(), "b ".to_owned()];
        let plan = validate_training(&config).expect("padded names are valid");
        assert_eq!(plan.target, "label");
        assert_eq!(plan.features, ["a", "b"]);

        config.feature_columns = vec![" a".to_owned(), "label ".to_owned(), "a".to_owned()];
        let err = validate_training(&config).expect_err("invalid");
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["featureColumns.1", "featureColumns.2"]);
    }

    #[test]
    fn test_training_requires_features() {
        let mut config = training();
        config.feature_columns.clear();
        config.test_fraction = f64::NAN;
        let err = validate_training(&config).expect_err("invalid");
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_extraction_valid() {
        let mut config = extraction();
        config.pagination_template = Some("https://example.com/shop/page/{page}".to_owned());
        config.pages = 10;
        let plan = validate_extraction(&config).expect("valid");
        assert_eq!(plan.pages, 10);
        assert_eq!(plan.column_names(), ["name"]);
    }

    #[test]
    fn test_extraction_issues_are_collected() {
        let mut config = extraction();
        config.target_url = "ftp://example.com".to_owned();
        config.pagination_template = Some("https://example.com/page/1".to_owned());
        config.pages = 0;
        config.fields.push(FieldConfig {
            column_name: "name".to_owned(),
            selector: "x".repeat(MAX_SELECTOR_LEN + 1),
            source: SelectorKind::Attribute,
            attribute_name: None,
            data_type: FieldType::Number,
        });

        let err = validate_extraction(&config).expect_err("invalid");
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "targetUrl",
                "paginationTemplate",
                "pages",
                "fields.1.columnName",
                "fields.1.selector",
                "fields.1.attributeName",
            ]
        );
    }

    #[test]
    fn test_extraction_requires_fields() {
        let mut config = extraction();
        config.fields.clear();
        let err = validate_extraction(&config).expect_err("invalid");
        assert_eq!(err.issues()[0].path, "fields");
    }

    #[test]
    fn test_check_columns_exist() {
        let header = vec!["a".to_owned(), "label".to_owned()];
        assert!(check_columns_exist(&header, &[("targetVariable", "label")]).is_ok());

        let err = check_columns_exist(&header, &[("featureColumns.1", "zzz")]).expect_err("missing");
        assert_eq!(err.issues()[0].path, "featureColumns.1");
    }
}
