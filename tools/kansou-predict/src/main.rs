use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::Device;
use clap::Parser;
use kansou_core::{
    HfTextEncoder, NUM_CLASSES, PretrainedFiles, Sentiment, SentimentClassifier, TextEncoder,
    build_bert_classifier, predict_text,
};
use kansou_trainer::{TrainingConfig, restore, sidecar_path};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Classify reviews with a fine-tuned checkpoint.
///
/// Texts come from the arguments, or one per line on stdin. Each result is
/// printed as one JSON object per line.
#[derive(Parser, Debug)]
#[command(name = "kansou-predict", version, about)]
struct Args {
    /// Pretrained model name or directory the checkpoint was trained from
    #[arg(long)]
    model: Option<String>,

    /// Fine-tuned model state
    #[arg(long, default_value = "models/best_model_state.safetensors")]
    checkpoint: PathBuf,

    /// Token length; defaults to the one the checkpoint was trained with
    #[arg(long)]
    max_length: Option<usize>,

    /// Reviews to classify
    text: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PredictOutput {
    input: String,
    sentiment: Option<Sentiment>,
    confidence: Option<f32>,
    probabilities: Option<[f32; NUM_CLASSES]>,
    error: Option<String>,
}

struct Predictor {
    classifier: SentimentClassifier,
    encoder: HfTextEncoder,
    max_length: usize,
    device: Device,
}

impl Predictor {
    fn load(args: &Args) -> Result<Self> {
        let trained = trained_config(&args.checkpoint);
        let model_name = args
            .model
            .clone()
            .unwrap_or_else(|| trained.model_name.clone());
        let max_length = args.max_length.unwrap_or(trained.max_length);

        let files = PretrainedFiles::locate(&model_name)?;
        let encoder = HfTextEncoder::from_file(&files.tokenizer)?;
        let device = Device::cuda_if_available(0)?;
        let (classifier, mut varmap) = build_bert_classifier(&files, trained.dropout, &device)?;
        restore(&mut varmap, &args.checkpoint)?;

        info!(model = %model_name, max_length, "predictor ready");
        Ok(Self {
            classifier,
            encoder,
            max_length,
            device,
        })
    }

    fn predict(&self, text: &str) -> PredictOutput {
        let encoder: &dyn TextEncoder = &self.encoder;
        match predict_text(&self.classifier, encoder, text, self.max_length, &self.device) {
            Ok(p) => PredictOutput {
                input: text.to_string(),
                sentiment: Some(p.sentiment),
                confidence: Some(p.confidence()),
                probabilities: Some(p.probabilities),
                error: None,
            },
            Err(e) => PredictOutput {
                input: text.to_string(),
                sentiment: None,
                confidence: None,
                probabilities: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Config saved beside the checkpoint, or the defaults when there is none.
fn trained_config(checkpoint: &Path) -> TrainingConfig {
    let sidecar = sidecar_path(checkpoint);
    if !sidecar.is_file() {
        return TrainingConfig::default();
    }
    match TrainingConfig::from_file(&sidecar) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %sidecar.display(), "ignoring unreadable training config: {e:#}");
            TrainingConfig::default()
        }
    }
}

fn emit(out: &mut impl Write, output: &PredictOutput) -> Result<()> {
    let json = serde_json::to_string(output).context("Failed to serialize prediction")?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let predictor = Predictor::load(&args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if !args.text.is_empty() {
        for text in &args.text {
            emit(&mut out, &predictor.predict(text))?;
        }
        return Ok(());
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        emit(&mut out, &predictor.predict(line))?;
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("Prediction failed: {e:#}");
        std::process::exit(1);
    }
}
