//! # Pipewright command-line entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Build the Tokio runtime
//!   └─> Run the command
//!         ├─> success: JSON (or script text) on stdout, exit 0
//!         └─> failure: CommandError JSON on stdout, exit 1
//! ```
//!
//! ```bash
//! pipewright profile --source raw --page 2
//! pipewright clean --config-file cleaning.json
//! pipewright script train --config-file training.json
//! ```

#![expect(clippy::print_stdout)] // Command output goes to stdout

mod cli;

use clap::Parser as _;
use pipewright::commands::CommandError;
use pipewright::error::WorkflowError;
use std::process::ExitCode;

fn print_error(err: &CommandError) {
    let text = serde_json::to_string_pretty(err).unwrap_or_else(|_| err.to_string());
    println!("{text}");
}

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            print_error(&CommandError::from(WorkflowError::Io(err)));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli::run(cli)) {
        Ok(cli::Output::Json(value)) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            println!("{text}");
            ExitCode::SUCCESS
        }
        Ok(cli::Output::Text(text)) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_error(&err);
            ExitCode::FAILURE
        }
    }
}
