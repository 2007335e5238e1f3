//! Stage configuration types.
//!
//! Each stage has two shapes:
//!
//! - a *request* shape (`CleaningConfig`, `TrainingConfig`,
//!   `ExtractionConfig`) that mirrors what callers send as JSON, and
//! - a *plan* shape (`CleaningPlan`, `TrainingPlan`, `ExtractionPlan`) with
//!   one typed variant per strategy, produced only by
//!   [`super::validation`].
//!
//! Script synthesis only ever sees plans.

use crate::error::{Result, ResultExt as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column selector passed to the cleaning helpers.
pub const ALL_COLUMNS: &str = "all";

/// Load any request shape from a JSON file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse configuration {}", path.display()))
}

// ---------------------------------------------------------------------------
// Cleaning

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullStrategy {
    Rows,
    Columns,
    Mean,
    Median,
    Mode,
    Zero,
    Custom,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationStrategy {
    #[default]
    #[serde(rename = "minmax_0_1", alias = "mix_max_0_1")]
    MinMaxUnit,
    #[serde(rename = "minmax_neg1_1", alias = "mix_max_-1_1")]
    MinMaxSymmetric,
    #[serde(rename = "zscore", alias = "z_score_standard")]
    ZScore,
}

/// Cleaning request as sent by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningConfig {
    /// A column name, or `all`
    pub target_column: String,
    #[serde(alias = "nhs")]
    pub null_handling_strategy: NullStrategy,
    #[serde(default, alias = "normalization")]
    pub normalization_strategy: NormalizationStrategy,
    #[serde(default, alias = "customValue")]
    pub custom_fill_value: Option<String>,
    #[serde(default, alias = "trimWhiteSpaces")]
    pub trim_whitespace: bool,
    #[serde(default, alias = "removeDupRows")]
    pub dedupe: bool,
    #[serde(default, alias = "enableNormalization")]
    pub normalization_enabled: bool,
}

/// What the cleaning helpers operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "name")]
pub enum ColumnTarget {
    All,
    Column(String),
}

impl ColumnTarget {
    pub fn parse(target: &str) -> Self {
        if target == ALL_COLUMNS {
            Self::All
        } else {
            Self::Column(target.to_owned())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => ALL_COLUMNS,
            Self::Column(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "strategy")]
pub enum NullHandling {
    DropRows,
    DropColumns,
    Mean,
    Median,
    Mode,
    Zero,
    Custom { value: String },
    None,
}

impl NullHandling {
    /// Request-side name of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DropRows => "rows",
            Self::DropColumns => "columns",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Mode => "mode",
            Self::Zero => "zero",
            Self::Custom { .. } => "custom",
            Self::None => "none",
        }
    }

    /// Whether the cleaned file may have fewer columns than its input.
    pub fn may_drop_columns(&self) -> bool {
        matches!(self, Self::DropColumns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    MinMaxUnit,
    MinMaxSymmetric,
    ZScore,
}

impl Normalization {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MinMaxUnit => "minmax_0_1",
            Self::MinMaxSymmetric => "minmax_neg1_1",
            Self::ZScore => "zscore",
        }
    }
}

impl From<NormalizationStrategy> for Normalization {
    fn from(strategy: NormalizationStrategy) -> Self {
        match strategy {
            NormalizationStrategy::MinMaxUnit => Self::MinMaxUnit,
            NormalizationStrategy::MinMaxSymmetric => Self::MinMaxSymmetric,
            NormalizationStrategy::ZScore => Self::ZScore,
        }
    }
}

/// One operation of a cleaning script, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "step")]
pub enum CleaningStep {
    TrimWhitespace,
    Deduplicate,
    HandleNulls { handling: NullHandling },
    Normalize { normalization: Normalization },
}

/// Validated cleaning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleaningPlan {
    pub target: ColumnTarget,
    pub trim_whitespace: bool,
    pub dedupe: bool,
    pub null_handling: NullHandling,
    pub normalization: Option<Normalization>,
}

impl CleaningPlan {
    /// Steps in their fixed order: trim, dedupe, nulls, normalization.
    pub fn steps(&self) -> Vec<CleaningStep> {
        let mut steps = Vec::with_capacity(4);
        if self.trim_whitespace {
            steps.push(CleaningStep::TrimWhitespace);
        }
        if self.dedupe {
            steps.push(CleaningStep::Deduplicate);
        }
        if self.null_handling != NullHandling::None {
            steps.push(CleaningStep::HandleNulls {
                handling: self.null_handling.clone(),
            });
        }
        if let Some(normalization) = self.normalization {
            steps.push(CleaningStep::Normalize { normalization });
        }
        steps
    }
}

// ---------------------------------------------------------------------------
// Training

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    RandomForest,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecisionTree => "decision_tree",
            Self::RandomForest => "random_forest",
        }
    }

    /// scikit-learn estimator class.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::DecisionTree => "DecisionTreeClassifier",
            Self::RandomForest => "RandomForestClassifier",
        }
    }

    pub fn import_line(&self) -> &'static str {
        match self {
            Self::DecisionTree => "from sklearn.tree import DecisionTreeClassifier",
            Self::RandomForest => "from sklearn.ensemble import RandomForestClassifier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Balancing {
    #[serde(alias = "smote")]
    Oversample,
    ClassWeights,
    Both,
}

/// A balanced model trained next to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingBlock {
    Oversample,
    ClassWeights,
}

impl Balancing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oversample => "oversample",
            Self::ClassWeights => "class_weights",
            Self::Both => "both",
        }
    }

    /// Blocks to emit, oversampling always before class weights.
    pub fn blocks(&self) -> &'static [BalancingBlock] {
        match self {
            Self::Oversample => &[BalancingBlock::Oversample],
            Self::ClassWeights => &[BalancingBlock::ClassWeights],
            Self::Both => &[BalancingBlock::Oversample, BalancingBlock::ClassWeights],
        }
    }
}

/// Training request as sent by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    pub target_variable: String,
    pub feature_columns: Vec<String>,
    #[serde(alias = "modelType")]
    pub model_kind: ModelKind,
    pub balancing_technique: Balancing,
    #[serde(alias = "testSize")]
    pub test_fraction: f64,
    #[serde(alias = "randomState")]
    pub random_seed: i64,
}

/// Validated training configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingPlan {
    pub target: String,
    pub features: Vec<String>,
    pub model: ModelKind,
    pub balancing: Balancing,
    pub test_fraction: f64,
    pub random_seed: u32,
}

// ---------------------------------------------------------------------------
// Extraction

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Content,
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    pub column_name: String,
    pub selector: String,
    #[serde(default = "default_selector_kind", alias = "selectorType")]
    pub source: SelectorKind,
    #[serde(default)]
    pub attribute_name: Option<String>,
    #[serde(default)]
    pub data_type: FieldType,
}

fn default_selector_kind() -> SelectorKind {
    SelectorKind::Content
}

/// Extraction request as sent by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionConfig {
    pub target_url: String,
    pub container: String,
    #[serde(default, alias = "paginationUrlTemplate")]
    pub pagination_template: Option<String>,
    pub pages: i64,
    #[serde(alias = "selectors")]
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum FieldSource {
    Content,
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPlan {
    pub column_name: String,
    pub selector: String,
    pub source: FieldSource,
    pub data_type: FieldType,
}

/// Validated extraction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionPlan {
    pub target_url: String,
    pub container: String,
    pub pagination_template: Option<String>,
    pub pages: u32,
    pub fields: Vec<FieldPlan>,
}

impl ExtractionPlan {
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaning_request_accepts_short_names() {
        let json = r#"{
            "targetColumn": "age",
            "nhs": "custom",
            "normalization": "mix_max_-1_1",
            "customValue": "N/A",
            "trimWhiteSpaces": true,
            "removeDupRows": false,
            "enableNormalization": true
        }"#;
        let config: CleaningConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.null_handling_strategy, NullStrategy::Custom);
        assert_eq!(
            config.normalization_strategy,
            NormalizationStrategy::MinMaxSymmetric
        );
        assert_eq!(config.custom_fill_value.as_deref(), Some("N/A"));
        assert!(config.trim_whitespace);
    }

    #[test]
    fn test_cleaning_request_canonical_names() {
        let json = r#"{
            "targetColumn": "all",
            "nullHandlingStrategy": "mean",
            "normalizationStrategy": "zscore"
        }"#;
        let config: CleaningConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.null_handling_strategy, NullStrategy::Mean);
        assert_eq!(config.normalization_strategy, NormalizationStrategy::ZScore);
        assert!(!config.normalization_enabled);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let json = r#"{ "targetColumn": "a", "nhs": "interpolate" }"#;
        assert!(serde_json::from_str::<CleaningConfig>(json).is_err());
    }

    #[test]
    fn test_plan_steps_follow_canonical_order() {
        let plan = CleaningPlan {
            target: ColumnTarget::All,
            trim_whitespace: true,
            dedupe: true,
            null_handling: NullHandling::Zero,
            normalization: Some(Normalization::ZScore),
        };
        assert_eq!(
            plan.steps(),
            [
                CleaningStep::TrimWhitespace,
                CleaningStep::Deduplicate,
                CleaningStep::HandleNulls {
                    handling: NullHandling::Zero
                },
                CleaningStep::Normalize {
                    normalization: Normalization::ZScore
                },
            ]
        );

        let bare = CleaningPlan {
            null_handling: NullHandling::None,
            normalization: None,
            trim_whitespace: false,
            dedupe: false,
            ..plan
        };
        assert!(bare.steps().is_empty());
    }

    #[test]
    fn test_balancing_blocks() {
        assert_eq!(Balancing::Both.blocks(), [BalancingBlock::Oversample, BalancingBlock::ClassWeights]);
        assert_eq!(Balancing::ClassWeights.blocks(), [BalancingBlock::ClassWeights]);
        let smote: Balancing = serde_json::from_str("\"smote\"").expect("alias");
        assert_eq!(smote, Balancing::Oversample);
    }

    #[test]
    fn test_training_request_shape() {
        let json = r#"{
            "targetVariable": "contract_type",
            "featureColumns": ["job_sector", "job_title"],
            "modelType": "random_forest",
            "balancingTechnique": "both",
            "testSize": 0.2,
            "randomState": 42
        }"#;
        let config: TrainingConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.model_kind, ModelKind::RandomForest);
        assert_eq!(config.random_seed, 42);
    }

    #[test]
    fn test_extraction_request_shape() {
        let json = r#"{
            "targetUrl": "https://example.com/shop",
            "container": "li.product",
            "paginationUrlTemplate": "https://example.com/shop/page/{page}",
            "pages": 3,
            "selectors": [
                { "id": 0, "columnName": "name", "selector": "h2", "selectorType": "content" },
                { "id": 1, "columnName": "link", "selector": "a", "selectorType": "attribute",
                  "attributeName": "href", "dataType": "text" }
            ]
        }"#;
        let config: ExtractionConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.fields.len(), 2);
        assert_eq!(config.fields[1].source, SelectorKind::Attribute);
        assert_eq!(config.fields[0].data_type, FieldType::Text);
    }
}
