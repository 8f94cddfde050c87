//! Emotune CLI - fine-tune a BERT emotion classifier on GoEmotions
//!
//! Provides the `emotune` command: one invocation is one training run whose
//! weights, charts and summary land under `output_path`.

mod output;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use emotune_models::CandleEngine;
use emotune_training::{
    ConfigResolver, FineTuneRun, LabelMap, PlottersRenderer, RunSettings, StdoutProgressSink, TrainingError, usage,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Emotune - emotion classifier fine-tuning
#[derive(Parser, Debug)]
#[command(
    name = "emotune",
    author,
    version,
    about = "Fine-tune a BERT classifier on GoEmotions with a head, head+1 or full strategy"
)]
struct Args {
    /// Directory for weights, charts and results.json (default: .)
    output_path: Option<String>,

    /// Training strategy: head, full or head+1 (default: full)
    train_strategy: Option<String>,

    /// Number of epochs (default: 10)
    num_epochs: Option<String>,

    /// Download the base model from the hub instead of the local copy ("true" to enable)
    use_remote_model: Option<String>,

    /// Anything past the four run arguments; rejected.
    #[arg(hide = true, num_args = 0..)]
    extra: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Settings file (overrides EMOTUNE_CONFIG and ./emotune.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn positional(&self) -> Vec<&str> {
        [&self.output_path, &self.train_strategy, &self.num_epochs, &self.use_remote_model]
            .into_iter()
            .map_while(|arg| arg.as_deref())
            .chain(self.extra.iter().map(String::as_str))
            .collect()
    }
}

fn usage_error(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    eprintln!("{}", usage());
    std::process::exit(1);
}

/// Name of the pipeline stage an error came from.
fn stage(err: &TrainingError) -> &'static str {
    match err {
        TrainingError::InvalidArgument(_) | TrainingError::Config(_) => "configuration",
        TrainingError::StructuralMismatch(_) => "freezing parameters",
        TrainingError::TrainingFailure(_) => "training",
        TrainingError::Persistence(_) => "saving artifacts",
        TrainingError::Display(_) => "displaying samples",
        TrainingError::Io(_) | TrainingError::Json(_) | TrainingError::Other(_) => "run",
    }
}

fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit();
        }
        Err(err) => usage_error(err.to_string().trim_start_matches("error: ").trim_end()),
    };

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber =
        FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = RunSettings::discover_and_load(args.config.as_deref())
        .context("failed to load settings")?;
    let config = match ConfigResolver::new(settings).resolve(&args.positional()) {
        Ok(config) => config,
        Err(err) => usage_error(err),
    };
    tracing::info!(
        output = %config.output_path.display(),
        strategy = %config.strategy,
        epochs = config.num_epochs,
        remote = config.use_remote_model,
        "resolved run configuration"
    );

    let started = Instant::now();
    let labels = LabelMap::go_emotions();
    let engine =
        CandleEngine::from_config(&config, &labels).context("failed to load the model and dataset")?;

    let progress = StdoutProgressSink;
    let renderer = PlottersRenderer::default();
    let outcome = FineTuneRun::new(&config, &progress, &renderer)
        .with_labels(labels)
        .with_started_at(started)
        .execute(engine)
        .map_err(|err| {
            let stage = stage(&err);
            anyhow::Error::new(err).context(format!("{stage} failed"))
        })?;

    output::print_outcome(&config, &outcome);
    Ok(())
}
