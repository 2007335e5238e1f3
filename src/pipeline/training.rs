//! Training script generation.
//!
//! The script trains a baseline classifier and then one extra model per
//! balancing block. Each block fits its own estimator into its own
//! variables and adds its own `models[...]` entry, so blocks never touch
//! the baseline's results.

use super::cleaning::ScriptFiles;
use super::quote::{py_float, py_str, py_str_list};
use super::spec::{BalancingBlock, TrainingPlan};

/// Evaluation helpers shared by every training script.
const EVALUATION_HELPERS: &str = r#"
def detect_imbalance(y, target_name):
    print("=" * 80)
    print("CLASS IMBALANCE DETECTION")
    print("=" * 80)

    class_counts = pd.Series(y).value_counts()
    class_percentages = pd.Series(y).value_counts(normalize=True) * 100

    print(f"\nTarget Variable: {target_name}")
    print(f"Total samples: {len(y)}")
    print(f"Number of classes: {len(class_counts)}")
    print()

    imbalance_detected = False
    imbalance_ratio = class_counts.max() / class_counts.min()

    print("Class Distribution:")
    for cls, count in class_counts.items():
        percentage = class_percentages[cls]
        print(f"  Class '{cls}': {count} samples ({percentage:.2f}%)")
        if percentage < 10:
            imbalance_detected = True

    print(f"\nImbalance Ratio: {imbalance_ratio:.2f}:1")
    if imbalance_ratio > 3:
        print("SIGNIFICANT IMBALANCE DETECTED - apply balancing techniques")
    elif imbalance_ratio > 1.5:
        print("MODERATE IMBALANCE DETECTED - consider balancing techniques")
    else:
        print("Classes are relatively balanced")

    return {
        'imbalance_detected': bool(imbalance_detected),
        'imbalance_ratio': float(imbalance_ratio),
        'class_distribution': {str(k): int(v) for k, v in class_counts.items()},
        'class_percentages': {str(k): float(v) for k, v in class_percentages.items()},
    }


def calculate_metrics(y_true, y_pred, label_encoder):
    labels = list(range(len(label_encoder.classes_)))
    return {
        'accuracy': float(accuracy_score(y_true, y_pred)),
        'precision': float(precision_score(y_true, y_pred, average='weighted', zero_division=0)),
        'recall': float(recall_score(y_true, y_pred, average='weighted', zero_division=0)),
        'f1_score': float(f1_score(y_true, y_pred, average='weighted', zero_division=0)),
        'confusion_matrix': confusion_matrix(y_true, y_pred, labels=labels).tolist(),
        'classification_report': classification_report(
            y_true, y_pred, labels=labels, output_dict=True, zero_division=0
        ),
    }


def print_metrics(model_name, metrics):
    print(f"\n{'=' * 60}")
    print(f" {model_name} - Evaluation Metrics")
    print(f"{'=' * 60}")
    print(f"  Accuracy:  {metrics['accuracy']:.4f}")
    print(f"  Precision: {metrics['precision']:.4f}")
    print(f"  Recall:    {metrics['recall']:.4f}")
    print(f"  F1-Score:  {metrics['f1_score']:.4f}")
    print()
    print("Confusion Matrix:")
    print(np.array(metrics['confusion_matrix']))
"#;

impl BalancingBlock {
    /// Key of this block's entry in the result document's `models`.
    pub fn model_key(&self) -> &'static str {
        match self {
            Self::Oversample => "smote_balanced",
            Self::ClassWeights => "class_weighted",
        }
    }

    /// Label stored as the entry's `balancing`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Oversample => "SMOTE",
            Self::ClassWeights => "Class Weights",
        }
    }

    fn render(&self, plan: &TrainingPlan) -> String {
        let class = plan.model.class_name();
        let seed = plan.random_seed;
        let key = self.model_key();
        let label = self.label();
        let model_type = plan.model.as_str();
        match self {
            Self::Oversample => format!(
                r#"
        # Oversample the minority classes (SMOTE)
        print("\nApplying SMOTE...")
        smote = SMOTE(random_state={seed})
        X_train_smote, y_train_smote = smote.fit_resample(X_train, y_train)
        print(f"  Original training set: {{X_train.shape[0]}} samples")
        print(f"  Balanced training set: {{X_train_smote.shape[0]}} samples")

        model_smote = {class}(random_state={seed})
        model_smote.fit(X_train_smote, y_train_smote)
        metrics_smote = calculate_metrics(y_test, model_smote.predict(X_test), le)
        print_metrics("SMOTE-Balanced Model", metrics_smote)
        results['models']['{key}'] = {{
            'model_type': '{model_type}',
            'balancing': '{label}',
            'metrics': metrics_smote,
        }}
"#
            ),
            Self::ClassWeights => format!(
                r#"
        # Reweight classes inversely to their frequency
        print("\nTraining model with class weights...")
        model_weighted = {class}(class_weight='balanced', random_state={seed})
        model_weighted.fit(X_train, y_train)
        metrics_weighted = calculate_metrics(y_test, model_weighted.predict(X_test), le)
        print_metrics("Class-Weighted Model", metrics_weighted)
        results['models']['{key}'] = {{
            'model_type': '{model_type}',
            'balancing': '{label}',
            'metrics': metrics_weighted,
        }}
"#
            ),
        }
    }
}

fn config_header(plan: &TrainingPlan) -> String {
    let features: Vec<String> = plan.features.iter().map(|f| py_str(f)).collect();
    format!(
        "# Configuration:\n\
         #   target variable: {target}\n\
         #   features: {features}\n\
         #   model: {model}\n\
         #   balancing: {balancing}\n\
         #   test fraction: {fraction}\n\
         #   random seed: {seed}\n",
        target = py_str(&plan.target),
        features = features.join(", "),
        model = plan.model.as_str(),
        balancing = plan.balancing.as_str(),
        fraction = py_float(plan.test_fraction),
        seed = plan.random_seed,
    )
}

/// Render the training script for `plan`.
///
/// The output depends only on the arguments; the training date is taken by
/// the script when it runs.
pub fn render_training_script(plan: &TrainingPlan, files: ScriptFiles<'_>) -> String {
    let blocks: String = plan
        .balancing
        .blocks()
        .iter()
        .map(|block| block.render(plan))
        .collect();

    let comparison: String = plan
        .balancing
        .blocks()
        .iter()
        .map(|block| {
            format!(
                "        print(f\"  {label}: {{results['models']['{key}']['metrics']['f1_score']:.4f}}\")\n",
                label = block.label(),
                key = block.model_key(),
            )
        })
        .collect();

    let smote_import = if plan.balancing.blocks().contains(&BalancingBlock::Oversample) {
        "from imblearn.over_sampling import SMOTE\n"
    } else {
        ""
    };

    format!(
        r#"# Model training script
# Classification with class-imbalance handling.
# Generated by pipewright; regenerated on every run.
#
{header}
import json
import sys
import warnings
from datetime import datetime

import numpy as np
import pandas as pd
{smote_import}from sklearn.metrics import (
    accuracy_score, precision_score, recall_score, f1_score,
    confusion_matrix, classification_report,
)
from sklearn.model_selection import train_test_split
from sklearn.preprocessing import LabelEncoder
{model_import}

warnings.filterwarnings('ignore')

{helpers}

def train_models(input_file: str, output_file: str, config: dict):
    start_time = datetime.now()

    try:
        print("Loading dataset...")
        df = pd.read_csv(input_file)

        target_col = config['target']
        feature_cols = config['features']

        df = df[df[target_col].notna()]

        le = LabelEncoder()
        y = le.fit_transform(df[target_col].astype(str))

        imbalance_info = detect_imbalance(y, target_col)

        X = df[feature_cols].copy()
        for col in X.columns:
            if X[col].dtype == 'object' or X[col].dtype.name == 'category':
                print(f"  Encoding '{{col}}'...")
                X[col] = LabelEncoder().fit_transform(X[col].fillna('missing').astype(str))
        X = X.fillna(0)

        print(f"\nFeature matrix shape: {{X.shape}}")

        X_train, X_test, y_train, y_test = train_test_split(
            X, y,
            test_size=config['test_size'],
            random_state=config['random_state'],
            stratify=y,
        )
        print(f"  Training set: {{X_train.shape[0]}} samples")
        print(f"  Test set: {{X_test.shape[0]}} samples")

        model_baseline = {model_class}(random_state=config['random_state'])
        model_baseline.fit(X_train, y_train)
        metrics_baseline = calculate_metrics(y_test, model_baseline.predict(X_test), le)
        print_metrics("Baseline Model", metrics_baseline)

        results = {{
            'configuration': config,
            'dataset_info': {{
                'total_samples': int(len(df)),
                'train_samples': int(len(X_train)),
                'test_samples': int(len(X_test)),
                'n_features': int(X.shape[1]),
                'feature_names': feature_cols,
                'target_classes': [str(c) for c in le.classes_],
            }},
            'imbalance_analysis': imbalance_info,
            'models': {{
                'baseline': {{
                    'model_type': config['model_type'],
                    'balancing': 'none',
                    'metrics': metrics_baseline,
                }},
            }},
            'training_date': datetime.now().isoformat(),
        }}
{blocks}
        with open(output_file, 'w', encoding='utf-8') as f:
            json.dump(results, f, indent=2, ensure_ascii=False)

        print("\nModel Comparison (F1-Score):")
        print(f"  Baseline: {{metrics_baseline['f1_score']:.4f}}")
{comparison}
        execution_time = (datetime.now() - start_time).total_seconds()
        print(f"\nTotal execution time: {{execution_time:.2f}} seconds")
        print(f"Results saved to: {{output_file}}")
        print("=" * 80)

    except Exception as e:
        print(f"\nError: {{e}}", file=sys.stderr)
        import traceback
        traceback.print_exc()
        sys.exit(1)


if __name__ == "__main__":
    INPUT_FILE = {input}
    OUTPUT_FILE = {output}

    CONFIG = {{
        'target': {target},
        'features': {features},
        'model_type': '{model_type}',
        'balancing': '{balancing}',
        'test_size': {test_size},
        'random_state': {seed},
    }}

    train_models(INPUT_FILE, OUTPUT_FILE, CONFIG)
"#,
        header = config_header(plan),
        model_import = plan.model.import_line(),
        helpers = EVALUATION_HELPERS,
        model_class = plan.model.class_name(),
        input = py_str(files.input),
        output = py_str(files.output),
        target = py_str(&plan.target),
        features = py_str_list(&plan.features),
        model_type = plan.model.as_str(),
        balancing = plan.balancing.as_str(),
        test_size = py_float(plan.test_fraction),
        seed = plan.random_seed,
    )
}
