//! Cleaning script generation.
//!
//! The script loads the raw CSV with pandas, applies the plan's steps as
//! calls into the `clean_utils` helper module and writes the cleaned CSV.
//! Only the helpers a plan uses are imported.

use super::quote::py_str;
use super::spec::{CleaningPlan, CleaningStep, ColumnTarget, Normalization, NullHandling};

/// Input and output file names as seen from the script's working directory.
#[derive(Debug, Clone, Copy)]
pub struct ScriptFiles<'a> {
    pub input: &'a str,
    pub output: &'a str,
}

fn target_literal(target: &ColumnTarget) -> String {
    match target {
        ColumnTarget::All => "'all'".to_owned(),
        ColumnTarget::Column(name) => py_str(name),
    }
}

impl CleaningStep {
    /// Name of the `clean_utils` function this step calls.
    pub fn helper(&self) -> &'static str {
        match self {
            Self::TrimWhitespace => "trim_whitespaces",
            Self::Deduplicate => "remove_duplicates",
            Self::HandleNulls { handling } => match handling {
                NullHandling::DropRows => "remove_rows_with_nulls",
                NullHandling::DropColumns => "remove_columns_with_nulls",
                NullHandling::Mean => "fill_nulls_with_mean",
                NullHandling::Median => "fill_nulls_with_median",
                NullHandling::Mode => "fill_nulls_with_mode",
                NullHandling::Zero => "fill_nulls_with_zero",
                NullHandling::Custom { .. } => "fill_nulls_with_custom",
                // Never emitted as a step
                NullHandling::None => "",
            },
            Self::Normalize { normalization } => match normalization {
                Normalization::MinMaxUnit => "normalize_min_max_0_1",
                Normalization::MinMaxSymmetric => "normalize_min_max_neg1_1",
                Normalization::ZScore => "normalize_z_score",
            },
        }
    }

    /// The helper call, e.g. `fill_nulls_with_mean(df, 'all')`.
    pub fn call(&self, target: &ColumnTarget) -> String {
        let helper = self.helper();
        let target = target_literal(target);
        match self {
            Self::TrimWhitespace | Self::Deduplicate => format!("{helper}(df)"),
            Self::HandleNulls { handling } => match handling {
                NullHandling::DropColumns => format!("{helper}(df)"),
                NullHandling::Custom { value } => {
                    format!("{helper}(df, {}, {target})", py_str(value))
                }
                _ => format!("{helper}(df, {target})"),
            },
            Self::Normalize { .. } => format!("{helper}(df, {target})"),
        }
    }

    fn describe(&self) -> (String, String) {
        match self {
            Self::TrimWhitespace => (
                "Trim whitespaces".to_owned(),
                "Trimming whitespaces...".to_owned(),
            ),
            Self::Deduplicate => (
                "Remove duplicate rows".to_owned(),
                "Removing duplicate rows...".to_owned(),
            ),
            Self::HandleNulls { handling } => (
                format!("Handle null values ({})", handling.name()),
                format!("Handling null values using strategy: {}", handling.name()),
            ),
            Self::Normalize { normalization } => (
                format!("Normalize data ({})", normalization.name()),
                format!("Normalizing data using: {}", normalization.name()),
            ),
        }
    }

    /// The indented block for this step inside `clean_data`.
    fn fragment(&self, target: &ColumnTarget) -> String {
        let (comment, message) = self.describe();
        format!(
            "        # {comment}\n        print({})\n        df = {}\n",
            py_str(&format!("\n{message}")),
            self.call(target)
        )
    }
}

fn config_header(plan: &CleaningPlan) -> String {
    let normalization = plan.normalization.map_or("disabled", |n| n.name());
    let custom = match &plan.null_handling {
        NullHandling::Custom { value } => format!("#   custom fill value: {}\n", py_str(value)),
        _ => String::new(),
    };
    format!(
        "# Configuration:\n\
         #   target column: {target}\n\
         #   null handling: {nulls}\n\
         {custom}\
         #   normalization: {normalization}\n\
         #   trim whitespace: {trim}\n\
         #   remove duplicates: {dedupe}\n",
        target = py_str(plan.target.label()),
        nulls = plan.null_handling.name(),
        trim = plan.trim_whitespace,
        dedupe = plan.dedupe,
    )
}

/// Render the cleaning script for `plan`.
///
/// The output depends only on the arguments.
pub fn render_cleaning_script(plan: &CleaningPlan, files: ScriptFiles<'_>) -> String {
    let steps = plan.steps();

    let mut imports: Vec<&str> = steps.iter().map(CleaningStep::helper).collect();
    imports.push("print_statistics");
    let imports: String = imports
        .iter()
        .map(|name| format!("    {name},\n"))
        .collect();

    let operations: String = if steps.is_empty() {
        "        # No cleaning operations configured\n".to_owned()
    } else {
        steps
            .iter()
            .map(|step| step.fragment(&plan.target))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"# Data cleaning script
# Generated by pipewright; regenerated on every run.
#
{header}
import sys
from datetime import datetime

import pandas as pd
from clean_utils import (
{imports})


def clean_data(input_file: str, output_file: str):
    start_time = datetime.now()

    try:
        print("=" * 70)
        print("Data Cleaning Script - Starting")
        print("=" * 70)
        print(f"Input file: {{input_file}}")
        print(f"Output file: {{output_file}}")
        print()

        print("Loading data...")
        df = pd.read_csv(input_file)
        print(f"Loaded {{len(df)}} rows, {{len(df.columns)}} columns")
        print(f"  Columns: {{', '.join(map(str, df.columns))}}")

        print_statistics(df, "Initial Data Statistics")

{operations}
        print("\nSaving cleaned data...")
        df.to_csv(output_file, index=False)

        print_statistics(df, "Final Data Statistics")

        execution_time = (datetime.now() - start_time).total_seconds()
        print("\n" + "=" * 70)
        print("Data cleaning completed successfully!")
        print(f"Execution time: {{execution_time:.2f}} seconds")
        print(f"Cleaned data saved to: {{output_file}}")
        print("=" * 70)

        return len(df), execution_time

    except FileNotFoundError:
        print(f"\nError: Input file '{{input_file}}' not found", file=sys.stderr)
        sys.exit(1)
    except pd.errors.EmptyDataError:
        print("\nError: Input file is empty", file=sys.stderr)
        sys.exit(1)
    except Exception as e:
        print(f"\nAn error occurred: {{e}}", file=sys.stderr)
        import traceback
        traceback.print_exc()
        sys.exit(1)


if __name__ == "__main__":
    INPUT_FILE = {input}
    OUTPUT_FILE = {output}

    clean_data(INPUT_FILE, OUTPUT_FILE)
"#,
        header = config_header(plan),
        input = py_str(files.input),
        output = py_str(files.output),
    )
}
