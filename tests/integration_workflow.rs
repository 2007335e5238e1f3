//! Integration tests for stage execution
//!
//! The interpreter is replaced by a small shell script that plays the
//! worker's part directly in the artifacts directory (looking at the script
//! name at most), so these tests need no Python.

#![cfg(unix)]

use pipewright::commands::{self, DataSource, ProfileRequest};
use pipewright::config::WorkflowConfig;
use pipewright::error::WorkflowError;
use pipewright::pager::PageRequest;
use pipewright::pipeline::{CleaningConfig, ExtractionConfig, TrainingConfig, Workflow};
use pipewright::runner::{AbortSignal, RunOutcome};
use std::os::unix::fs::PermissionsExt as _;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const RAW_CSV: &str = "name,age,city\nAnn,30,Oslo\nBob,,Rome\n";

const RESULTS_JSON: &str = r#"{
  "configuration": {"target": "city", "features": ["age"], "model_type": "random_forest",
                    "balancing": "both", "test_size": 0.2, "random_state": 42},
  "dataset_info": {"total_samples": 2, "train_samples": 1, "test_samples": 1, "n_features": 1,
                   "feature_names": ["age"], "target_classes": ["Oslo", "Rome"]},
  "imbalance_analysis": {"imbalance_detected": false, "imbalance_ratio": 1.0,
                         "class_distribution": {"0": 1, "1": 1},
                         "class_percentages": {"0": 50.0, "1": 50.0}},
  "models": {
    "baseline": {"model_type": "random_forest", "balancing": "none",
                 "metrics": {"accuracy": 1.0, "precision": 1.0, "recall": 1.0, "f1_score": 1.0,
                             "confusion_matrix": [[1, 0], [0, 0]], "classification_report": {}}}
  },
  "training_date": "2026-10-16T12:00:00"
}"#;

struct Fixture {
    dir: TempDir,
    workflow: Workflow,
}

impl Fixture {
    /// Workflow whose interpreter runs `body` with the artifacts dir as cwd.
    fn new(body: &str) -> Self {
        Self::with_timeout(body, 0)
    }

    fn with_timeout(body: &str, run_timeout_secs: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let interpreter = dir.path().join("fake-python");
        std::fs::write(&interpreter, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&interpreter, std::fs::Permissions::from_mode(0o755)).unwrap();

        let artifacts_dir = dir.path().join("generated");
        let workflow = Workflow::new(WorkflowConfig {
            artifacts_dir,
            interpreter,
            run_timeout_secs,
            ..WorkflowConfig::default()
        });
        Self { dir, workflow }
    }

    fn artifacts(&self) -> &Path {
        &self.workflow.config().artifacts_dir
    }

    fn write_artifact(&self, name: &str, content: &str) {
        std::fs::create_dir_all(self.artifacts()).unwrap();
        std::fs::write(self.artifacts().join(name), content).unwrap();
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn cleaning(strategy: &str) -> CleaningConfig {
    serde_json::from_value(serde_json::json!({
        "targetColumn": "all",
        "nullHandlingStrategy": strategy,
        "trimWhitespace": true,
    }))
    .unwrap()
}

fn training() -> TrainingConfig {
    serde_json::from_value(serde_json::json!({
        "targetVariable": "city",
        "featureColumns": ["age"],
        "modelKind": "random_forest",
        "balancingTechnique": "both",
        "testFraction": 0.2,
        "randomSeed": 42,
    }))
    .unwrap()
}

#[tokio::test]
async fn test_clean_end_to_end() {
    let fx = Fixture::new("echo cleaning\ncp scraped_data.csv clean_data.csv");
    fx.write_artifact("scraped_data.csv", RAW_CSV);

    let outcome = fx
        .workflow
        .clean(&cleaning("mean"), &AbortSignal::new())
        .await
        .expect("clean should succeed");

    assert_eq!(outcome.run.outcome, RunOutcome::Succeeded);
    assert_eq!(outcome.run.stdout, "cleaning\n");
    assert_eq!(outcome.input.rows, 2);
    assert_eq!(outcome.output.columns, ["name", "age", "city"]);
    assert_eq!(
        outcome.run.produced_artifact_path.as_deref(),
        Some(fx.artifacts().join("clean_data.csv").as_path())
    );

    let written = std::fs::read_to_string(fx.artifacts().join("clean_data.py")).unwrap();
    assert_eq!(written, outcome.script.text);
    assert!(written.contains("df = fill_nulls_with_mean(df, 'all')"));
}

#[tokio::test]
async fn test_stale_output_is_not_mistaken_for_success() {
    let fx = Fixture::new("exit 0");
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    fx.write_artifact("clean_data.csv", RAW_CSV);

    let err = fx
        .workflow
        .clean(&cleaning("zero"), &AbortSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ArtifactNotProduced { .. }), "{err:?}");
    assert!(!fx.artifacts().join("clean_data.csv").exists());
}

#[tokio::test]
async fn test_worker_failure_carries_stderr() {
    let fx = Fixture::new("echo 'KeyError: age' >&2\nexit 2");
    fx.write_artifact("scraped_data.csv", RAW_CSV);

    let err = fx
        .workflow
        .clean(&cleaning("median"), &AbortSignal::new())
        .await
        .unwrap_err();
    match err {
        WorkflowError::ProcessFailed {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, Some(2));
            assert_eq!(stderr, "KeyError: age\n");
        }
        other => panic!("expected ProcessFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dropped_columns_must_be_a_subset() {
    let fx = Fixture::new("printf 'name,city\\nAnn,Oslo\\n' > clean_data.csv");
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    let outcome = fx
        .workflow
        .clean(&cleaning("columns"), &AbortSignal::new())
        .await
        .expect("dropping a column is allowed");
    assert_eq!(outcome.output.columns, ["name", "city"]);

    let fx = Fixture::new("printf 'name,city\\nAnn,Oslo\\n' > clean_data.csv");
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    let err = fx
        .workflow
        .clean(&cleaning("mean"), &AbortSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::CorruptArtifact { .. }), "{err:?}");
}

#[tokio::test]
async fn test_malformed_output_is_corrupt() {
    let fx = Fixture::new("printf 'name,age,city\\nAnn,30\\n' > clean_data.csv");
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    let err = fx
        .workflow
        .clean(&cleaning("mean"), &AbortSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::CorruptArtifact { .. }), "{err:?}");
}

#[tokio::test]
async fn test_train_end_to_end() {
    let fx = Fixture::new(&format!(
        "cat > model_results.json <<'EOF'\n{RESULTS_JSON}\nEOF"
    ));
    fx.write_artifact("clean_data.csv", RAW_CSV);

    let outcome = fx
        .workflow
        .train(&training(), &AbortSignal::new())
        .await
        .expect("training should succeed");
    assert_eq!(outcome.report.dataset_info.target_classes, ["Oslo", "Rome"]);
    assert!(outcome.script.text.contains("SMOTE(random_state=42)"));

    let again = fx.workflow.model_results().await.unwrap();
    assert_eq!(again, outcome.report);
}

#[tokio::test]
async fn test_unparseable_results_are_corrupt() {
    let fx = Fixture::new("echo 'not json' > model_results.json");
    fx.write_artifact("clean_data.csv", RAW_CSV);
    let err = fx
        .workflow
        .train(&training(), &AbortSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::CorruptArtifact { .. }), "{err:?}");
}

#[tokio::test]
async fn test_train_rejects_unknown_feature() {
    let fx = Fixture::new("exit 0");
    fx.write_artifact("clean_data.csv", RAW_CSV);
    let mut config = training();
    config.feature_columns = vec!["age".to_owned(), "salary".to_owned()];

    let err = fx
        .workflow
        .train(&config, &AbortSignal::new())
        .await
        .unwrap_err();
    let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, ["featureColumns.1"]);
    assert!(!fx.artifacts().join("train_model.py").exists());
}

#[tokio::test]
async fn test_train_requires_cleaned_data() {
    let fx = Fixture::new("exit 0");
    let err = fx
        .workflow
        .train(&training(), &AbortSignal::new())
        .await
        .unwrap_err();
    assert!(err.is_precondition());
    assert!(matches!(err, WorkflowError::MissingPrecondition { .. }));
}

#[tokio::test]
async fn test_timeout() {
    let fx = Fixture::with_timeout("exec sleep 30", 1);
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    let err = fx
        .workflow
        .clean(&cleaning("mode"), &AbortSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Timeout { seconds: 1, .. }), "{err:?}");
}

#[tokio::test]
async fn test_extract_end_to_end() {
    let fx = Fixture::new("printf 'title,link\\nShirt,/p/1\\nHat,/p/2\\n' > scraped_data.csv");
    let outcome = fx
        .workflow
        .extract(&extraction(), &AbortSignal::new())
        .await
        .expect("extraction should succeed");
    assert_eq!(outcome.output.rows, 2);
    assert!(fx.artifacts().join("scraper.py").is_file());
}

#[tokio::test]
async fn test_runs_on_one_artifact_do_not_overlap() {
    let fx = Fixture::new(
        "echo start >> ../runs.log\nsleep 0.3\necho end >> ../runs.log\ncp scraped_data.csv clean_data.csv",
    );
    fx.write_artifact("scraped_data.csv", RAW_CSV);

    let config = cleaning("mean");
    let abort = AbortSignal::new();
    let (first, second) = tokio::join!(
        fx.workflow.clean(&config, &abort),
        fx.workflow.clean(&config, &abort)
    );
    first.unwrap();
    second.unwrap();

    let log = std::fs::read_to_string(fx.root().join("runs.log")).unwrap();
    assert_eq!(log, "start\nend\nstart\nend\n");
}

/// Interpreter that dispatches on the script it was given, logging when
/// each stage's worker starts and ends.
fn staged_worker() -> String {
    format!(
        r#"case "$1" in
  *scraper.py)
    echo extract-start >> ../runs.log
    sleep 0.3
    printf 'title,link\nShirt,/p/1\nHat,/p/2\n' > scraped_data.csv
    echo extract-end >> ../runs.log ;;
  *clean_data.py)
    echo clean-start >> ../runs.log
    sleep 0.3
    cp scraped_data.csv clean_data.csv
    echo clean-end >> ../runs.log ;;
  *train_model.py)
    echo train-start >> ../runs.log
    sleep 0.3
    cat > model_results.json <<'JSON'
{RESULTS_JSON}
JSON
    echo train-end >> ../runs.log ;;
esac"#
    )
}

/// Every `-start` line is directly followed by the matching `-end` line.
fn assert_runs_did_not_overlap(root: &Path, expected_runs: usize) {
    let log = std::fs::read_to_string(root.join("runs.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), expected_runs * 2, "{log}");
    for pair in lines.chunks(2) {
        let [start, end] = pair else {
            panic!("unpaired log line in {log}");
        };
        let stage = start.strip_suffix("-start").expect("start line");
        assert_eq!(*end, format!("{stage}-end"), "runs overlapped:\n{log}");
    }
}

fn extraction() -> ExtractionConfig {
    serde_json::from_value(serde_json::json!({
        "targetUrl": "https://shop.example.com/catalog",
        "container": "li.product",
        "pages": 1,
        "fields": [
            {"columnName": "title", "selector": "h2"},
            {"columnName": "link", "selector": "a", "source": "attribute", "attributeName": "href"}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_extract_and_clean_share_the_raw_csv() {
    let fx = Fixture::new(&staged_worker());
    fx.write_artifact("scraped_data.csv", RAW_CSV);

    let abort = AbortSignal::new();
    let cleaning_req = cleaning("mean");
    let extraction_req = extraction();
    let (cleaned, extracted) = tokio::join!(
        fx.workflow.clean(&cleaning_req, &abort),
        fx.workflow.extract(&extraction_req, &abort)
    );
    let cleaned = cleaned.expect("clean must not see the raw CSV disappear");
    extracted.expect("extract should succeed");

    assert_runs_did_not_overlap(fx.root(), 2);
    assert_eq!(cleaned.input.columns, cleaned.output.columns);
}

#[tokio::test]
async fn test_clean_and_train_share_the_cleaned_csv() {
    let fx = Fixture::new(&staged_worker());
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    fx.write_artifact("clean_data.csv", RAW_CSV);

    let abort = AbortSignal::new();
    let training_req = training();
    let cleaning_req = cleaning("mean");
    let (trained, cleaned) = tokio::join!(
        fx.workflow.train(&training_req, &abort),
        fx.workflow.clean(&cleaning_req, &abort)
    );
    trained.expect("train must not see the cleaned CSV disappear");
    cleaned.expect("clean should succeed");

    assert_runs_did_not_overlap(fx.root(), 2);
}

#[tokio::test]
async fn test_profile_waits_for_a_running_clean() {
    let fx = Fixture::new(&staged_worker());
    fx.write_artifact("scraped_data.csv", RAW_CSV);
    fx.write_artifact("clean_data.csv", "n\n1\n2\n3\n4\n5\n");

    let abort = AbortSignal::new();
    let request = ProfileRequest {
        source: DataSource::Cleaned,
        page: PageRequest::default(),
    };
    let cleaning_req = cleaning("zero");
    let (cleaned, profiled) = tokio::join!(fx.workflow.clean(&cleaning_req, &abort), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        commands::profile(&fx.workflow, request).await
    });
    cleaned.expect("clean should succeed");

    let response = profiled.expect("profile must read the finished output");
    assert_eq!(response.profile.total_rows, 2);
    assert_eq!(response.profile.columns.len(), 3);
}
