//! The training result document written by the training script.

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration echoed back by the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingEcho {
    pub target: String,
    pub features: Vec<String>,
    pub model_type: String,
    pub balancing: String,
    pub test_size: f64,
    pub random_state: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub total_samples: u64,
    pub train_samples: u64,
    pub test_samples: u64,
    pub n_features: u64,
    pub feature_names: Vec<String>,
    pub target_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceAnalysis {
    pub imbalance_detected: bool,
    pub imbalance_ratio: f64,
    pub class_distribution: BTreeMap<String, u64>,
    pub class_percentages: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: Vec<Vec<u64>>,
    /// Per-class breakdown as produced by scikit-learn.
    #[serde(default)]
    pub classification_report: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model_type: String,
    pub balancing: String,
    pub metrics: ModelMetrics,
}

/// Parsed `model_results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub configuration: TrainingEcho,
    pub dataset_info: DatasetInfo,
    pub imbalance_analysis: ImbalanceAnalysis,
    /// Keyed by `baseline`, `smote_balanced`, `class_weighted`.
    pub models: BTreeMap<String, ModelResult>,
    pub training_date: String,
}

impl TrainingReport {
    /// Read and check a result document.
    ///
    /// # Errors
    ///
    /// `NotFound` when the file is absent, `CorruptArtifact` when it does not
    /// parse or fails [`TrainingReport::check`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let corrupt = |message: String| WorkflowError::CorruptArtifact {
            artifact: path.to_path_buf(),
            message,
        };
        let report: Self = serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
        report.check().map_err(corrupt)?;
        Ok(report)
    }

    /// Structural checks beyond what deserialization enforces.
    ///
    /// # Errors
    ///
    /// Describes the first problem found.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.models.is_empty() {
            return Err("document contains no models".to_owned());
        }
        for (name, model) in &self.models {
            let matrix = &model.metrics.confusion_matrix;
            let n = matrix.len();
            if let Some(row) = matrix.iter().position(|row| row.len() != n) {
                return Err(format!(
                    "confusion matrix of '{name}' is not square: row {row} has {} cells, expected {n}",
                    matrix.get(row).map_or(0, Vec::len)
                ));
            }
        }
        Ok(())
    }

    pub fn model(&self, name: &str) -> Option<&ModelResult> {
        self.models.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "configuration": {
        "target": "contract_type",
        "features": ["job_sector"],
        "model_type": "decision_tree",
        "balancing": "class_weights",
        "test_size": 0.2,
        "random_state": 42
      },
      "dataset_info": {
        "total_samples": 10,
        "train_samples": 8,
        "test_samples": 2,
        "n_features": 1,
        "feature_names": ["job_sector"],
        "target_classes": ["full_time", "part_time"]
      },
      "imbalance_analysis": {
        "imbalance_detected": false,
        "imbalance_ratio": 1.5,
        "class_distribution": {"0": 6, "1": 4},
        "class_percentages": {"0": 60.0, "1": 40.0}
      },
      "models": {
        "baseline": {
          "model_type": "decision_tree",
          "balancing": "none",
          "metrics": {
            "accuracy": 0.5, "precision": 0.5, "recall": 0.5, "f1_score": 0.5,
            "confusion_matrix": [[1, 0], [1, 0]],
            "classification_report": {"accuracy": 0.5}
          }
        },
        "class_weighted": {
          "model_type": "decision_tree",
          "balancing": "Class Weights",
          "metrics": {
            "accuracy": 1.0, "precision": 1.0, "recall": 1.0, "f1_score": 1.0,
            "confusion_matrix": [[1, 0], [0, 1]],
            "classification_report": {}
          }
        }
      },
      "training_date": "2026-10-16T09:30:00.123456"
    }"#;

    fn write(dir: &Path, text: &str) -> std::path::PathBuf {
        let path = dir.join("model_results.json");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_parses_document() {
        let dir = tempfile::tempdir().unwrap();
        let report = TrainingReport::from_path(&write(dir.path(), SAMPLE)).unwrap();

        assert_eq!(report.dataset_info.target_classes.len(), 2);
        assert_eq!(report.imbalance_analysis.class_distribution.get("0"), Some(&6));
        let names: Vec<&str> = report.models.keys().map(String::as_str).collect();
        assert_eq!(names, ["baseline", "class_weighted"]);
        assert!((report.model("class_weighted").unwrap().metrics.f1_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_square_matrix_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let text = SAMPLE.replace("[[1, 0], [1, 0]]", "[[1, 0], [1]]");
        let err = TrainingReport::from_path(&write(dir.path(), &text)).unwrap_err();
        assert!(matches!(err, WorkflowError::CorruptArtifact { .. }), "{err:?}");
        assert!(err.to_string().contains("not square"));
    }

    #[test]
    fn test_invalid_json_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrainingReport::from_path(&write(dir.path(), "not json")).unwrap_err();
        assert!(matches!(err, WorkflowError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrainingReport::from_path(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
