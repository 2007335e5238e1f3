//! Worker-script synthesis and stage execution.
//!
//! Requests arrive as JSON ([`CleaningConfig`], [`TrainingConfig`],
//! [`ExtractionConfig`]), are validated into plans, rendered into Python
//! scripts and run by the [`Workflow`] under a supervised interpreter.
//!
//! # Stages
//!
//! | stage   | input        | script          | output               |
//! |---------|--------------|-----------------|----------------------|
//! | extract | none         | `scraper.py`    | `scraped_data.csv`   |
//! | clean   | raw CSV      | `clean_data.py` | `clean_data.csv`     |
//! | train   | cleaned CSV  | `train_model.py`| `model_results.json` |
//!
//! Script rendering is pure: the same plan always yields the same text, and
//! every user-supplied value is embedded through [`quote::py_str`].
//!
//! # Example: preview a cleaning script
//!
//! ```
//! use pipewright::config::WorkflowConfig;
//! use pipewright::pipeline::{CleaningConfig, Workflow};
//!
//! let request: CleaningConfig = serde_json::from_str(
//!     r#"{"targetColumn": "all", "nullHandlingStrategy": "median"}"#,
//! )?;
//! let workflow = Workflow::new(WorkflowConfig::default());
//! let script = workflow.cleaning_script(&request)?;
//! assert!(script.contains("fill_nulls_with_median(df, 'all')"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cleaning;
pub mod executor;
pub mod extraction;
pub mod lock;
pub mod quote;
pub mod results;
pub mod spec;
pub mod training;
pub mod validation;

pub use cleaning::{ScriptFiles, render_cleaning_script};
pub use executor::{
    CleaningOutcome, ExtractionOutcome, GeneratedScript, Stage, TableShape, TrainingOutcome,
    Workflow,
};
pub use extraction::render_extraction_script;
pub use lock::{RunGuard, RunLocks};
pub use results::TrainingReport;
pub use spec::{
    Balancing, CleaningConfig, CleaningPlan, ExtractionConfig, ExtractionPlan, ModelKind,
    TrainingConfig, TrainingPlan, load_request,
};
pub use training::render_training_script;
pub use validation::{validate_cleaning, validate_extraction, validate_training};
