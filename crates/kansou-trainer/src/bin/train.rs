use std::path::PathBuf;

use clap::Parser;
use kansou_core::CsvColumns;
use kansou_trainer::{RunOptions, TrainingConfig, run_training};
use tracing_subscriber::EnvFilter;

/// Fine-tune a sentiment classifier on a CSV of app reviews.
#[derive(Parser, Debug)]
#[command(name = "train", version, about)]
struct Args {
    /// CSV file with review text and 1-5 ratings
    #[arg(long, env = "KANSOU_DATA", default_value = "reviews.csv")]
    data: PathBuf,

    /// JSON training config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretrained model name or directory
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    max_length: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Where the best model state is written
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Write per-epoch metrics as JSON
    #[arg(long)]
    history: Option<PathBuf>,

    #[arg(long, default_value = "content")]
    text_column: String,

    #[arg(long, default_value = "score")]
    rating_column: String,

    /// Classify this review with the best model after training
    #[arg(long)]
    sample_text: Option<String>,
}

impl Args {
    fn training_config(&self) -> anyhow::Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_file(path)?,
            None => TrainingConfig::default(),
        };
        if let Some(model) = &self.model {
            config = config.with_model_name(model.clone());
        }
        if let Some(epochs) = self.epochs {
            config = config.with_epochs(epochs);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(max_length) = self.max_length {
            config = config.with_max_length(max_length);
        }
        if let Some(lr) = self.learning_rate {
            config = config.with_learning_rate(lr);
        }
        if let Some(path) = &self.checkpoint {
            config = config.with_checkpoint_path(path.clone());
        }
        Ok(config)
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let options = RunOptions {
        config: args.training_config()?,
        columns: CsvColumns::new(args.text_column.clone(), args.rating_column.clone()),
        data: args.data,
        history_path: args.history,
        sample_text: args.sample_text,
    };
    run_training(&options)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("Training failed: {e:#}");
        std::process::exit(1);
    }
}
