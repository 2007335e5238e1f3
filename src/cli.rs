use clap::{Parser, Subcommand, ValueEnum};
use pipewright::commands::{self, CommandError, CommandResult, DataSource, ProfileRequest};
use pipewright::config::WorkflowConfig;
use pipewright::error::WorkflowError;
use pipewright::logging;
use pipewright::pager::PageRequest;
use pipewright::pipeline::{CleaningConfig, ExtractionConfig, TrainingConfig, Workflow, load_request};
use pipewright::runner::AbortSignal;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "pipewright",
    about = "Profile tabular data and run generated extraction, cleaning and training scripts"
)]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = "PIPEWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding generated scripts and artifacts
    #[arg(long, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    /// Interpreter used to run generated scripts
    #[arg(long, global = true)]
    pub interpreter: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Raw,
    Cleaned,
}

impl From<SourceArg> for DataSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Raw => Self::Raw,
            SourceArg::Cleaned => Self::Cleaned,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Extract,
    Clean,
    Train,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile a CSV artifact and show one page of it
    Profile {
        #[arg(long, value_enum, default_value = "cleaned")]
        source: SourceArg,

        /// 1-based page number
        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Generate and run the extraction script
    Extract {
        /// Extraction request (JSON)
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Generate and run the cleaning script over the raw CSV
    Clean {
        /// Cleaning request (JSON)
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Generate and run the training script over the cleaned CSV
    Train {
        /// Training request (JSON)
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Show the last training result document
    Results,
    /// Print a generated script without running it
    Script {
        #[arg(value_enum)]
        stage: StageArg,

        #[arg(long)]
        config_file: PathBuf,
    },
}

/// What a command prints on success.
pub enum Output {
    Json(Value),
    Text(String),
}

fn json<T: Serialize>(value: &T) -> CommandResult<Output> {
    serde_json::to_value(value)
        .map(Output::Json)
        .map_err(|e| CommandError::from(WorkflowError::Other(format!("Failed to encode output: {e}"))))
}

fn request<T: serde::de::DeserializeOwned>(path: &Path) -> CommandResult<T> {
    Ok(load_request(path)?)
}

fn load_config(cli: &Cli) -> CommandResult<WorkflowConfig> {
    let mut config = WorkflowConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.artifacts_dir {
        config.artifacts_dir.clone_from(dir);
    }
    if let Some(interpreter) = &cli.interpreter {
        config.interpreter.clone_from(interpreter);
    }
    Ok(config)
}

/// Abort the running stage on Ctrl-C.
fn abort_on_ctrl_c() -> AbortSignal {
    let signal = AbortSignal::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping worker");
            trigger.abort();
        }
    });
    signal
}

pub async fn run(cli: Cli) -> CommandResult<Output> {
    let config = load_config(&cli)?;
    logging::init(&config.logging).map_err(WorkflowError::from)?;
    let workflow = Workflow::new(config);

    match cli.command {
        Commands::Profile {
            source,
            page,
            page_size,
        } => {
            let response = commands::profile(
                &workflow,
                ProfileRequest {
                    source: source.into(),
                    page: PageRequest { page, page_size },
                },
            )
            .await?;
            json(&response)
        }
        Commands::Extract { config_file } => {
            let config: ExtractionConfig = request(&config_file)?;
            let outcome = commands::extract(&workflow, &config, &abort_on_ctrl_c()).await?;
            json(&outcome)
        }
        Commands::Clean { config_file } => {
            let config: CleaningConfig = request(&config_file)?;
            let outcome = commands::clean(&workflow, &config, &abort_on_ctrl_c()).await?;
            json(&outcome)
        }
        Commands::Train { config_file } => {
            let config: TrainingConfig = request(&config_file)?;
            let outcome = commands::train(&workflow, &config, &abort_on_ctrl_c()).await?;
            json(&outcome)
        }
        Commands::Results => json(&commands::model_results(&workflow).await?),
        Commands::Script { stage, config_file } => {
            let script = match stage {
                StageArg::Extract => workflow.extraction_script(&request(&config_file)?),
                StageArg::Clean => workflow.cleaning_script(&request(&config_file)?),
                StageArg::Train => workflow.training_script(&request(&config_file)?),
            }?;
            Ok(Output::Text(script))
        }
    }
}
