//! # Pipewright - dataset profiling and worker-script synthesis
//!
//! Pipewright drives a three-stage tabular workflow (extract, clean, train)
//! whose heavy lifting happens in generated Python scripts. The crate does
//! the parts that need to be exact:
//!
//! - streaming CSV profiling with type inference, distribution summaries,
//!   missingness statistics and pagination
//! - deterministic compilation of a stage request into a script
//! - supervising the interpreter that runs it, and checking what it wrote
//!
//! ## Quick Start
//!
//! ```no_run
//! use pipewright::config::WorkflowConfig;
//! use pipewright::pipeline::{CleaningConfig, Workflow, load_request};
//! use pipewright::runner::AbortSignal;
//!
//! # async fn example() -> Result<(), pipewright::error::WorkflowError> {
//! let workflow = Workflow::new(WorkflowConfig::load(None)?);
//!
//! let request: CleaningConfig = load_request("cleaning.json".as_ref())?;
//! let outcome = workflow.clean(&request, &AbortSignal::new()).await?;
//! println!("{} rows after cleaning", outcome.output.rows);
//!
//! let profile = workflow.profile(&workflow.config().cleaned_csv_path())?;
//! for column in &profile.columns {
//!     println!("{}: {}", column.name, column.inferred_type);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`reader`]: lazy CSV record streams
//! - [`analyser`]: column profiling and missingness statistics
//! - [`pager`]: page windows over a record set
//! - [`pipeline`]: request validation, script synthesis and stage execution
//! - [`runner`]: interpreter process supervision
//! - [`commands`]: serializable query surface used by the CLI
//! - [`config`], [`logging`], [`error`], [`utils`]: ambient plumbing

#![warn(clippy::all, rust_2018_idioms)]

pub mod analyser;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod pager;
pub mod pipeline;
pub mod reader;
pub mod runner;
pub mod utils;
