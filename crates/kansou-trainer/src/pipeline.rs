//! End-to-end run: load, split, fine-tune, restore the best epoch and
//! report on the test split.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use candle_core::Device;
use kansou_core::data::log_class_distribution;
use kansou_core::{
    BatchLoader, CsvColumns, HfTextEncoder, PretrainedFiles, ReviewDataset, TextEncoder,
    load_bert_classifier, load_reviews, predict_text, split_dataset,
};
use tracing::info;

use crate::config::TrainingConfig;
use crate::history::TrainingHistory;
use crate::trainer::{EpochStats, PredictionSet, Trainer};

/// Inputs of one training run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data: PathBuf,
    pub columns: CsvColumns,
    pub config: TrainingConfig,
    /// Where the per-epoch history JSON goes, if anywhere.
    pub history_path: Option<PathBuf>,
    /// Review classified with the restored model at the end of the run.
    pub sample_text: Option<String>,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub history: TrainingHistory,
    pub test: EpochStats,
    pub predictions: PredictionSet,
}

pub fn run_training(options: &RunOptions) -> Result<RunOutcome> {
    let config = &options.config;
    config.validate()?;

    let records = load_reviews(&options.data, &options.columns)
        .with_context(|| format!("Failed to load reviews from {}", options.data.display()))?;
    log_class_distribution("all", &records);

    let split = split_dataset(records, &config.split())?;
    info!(
        train = split.train.len(),
        validation = split.validation.len(),
        test = split.test.len(),
        "split dataset"
    );
    log_class_distribution("train", &split.train);

    let files = PretrainedFiles::locate(&config.model_name)?;
    let encoder: Arc<dyn TextEncoder> = Arc::new(HfTextEncoder::from_file(&files.tokenizer)?);

    let train = ReviewDataset::new(split.train, encoder.clone(), config.max_length)?;
    let validation = ReviewDataset::new(split.validation, encoder.clone(), config.max_length)?;
    let test = ReviewDataset::new(split.test, encoder.clone(), config.max_length)?;

    let lengths = train.length_summary()?;
    info!(
        min = lengths.min,
        max = lengths.max,
        mean = lengths.mean,
        p95 = lengths.p95,
        truncated = lengths.truncated,
        max_length = config.max_length,
        "train token lengths"
    );

    let device = Device::cuda_if_available(0)?;
    let (classifier, varmap) = load_bert_classifier(&files, config.dropout, &device)?;
    let mut trainer = Trainer::new(classifier, varmap, config.clone(), device.clone())?;

    let history = trainer.fit(&train, &validation)?;
    if let Some(path) = &options.history_path {
        history.save(path)?;
    }
    if let Some(best) = history.best() {
        info!(
            epoch = best.epoch,
            val_accuracy = best.val_accuracy,
            "best validation epoch"
        );
    }

    trainer.restore(&config.checkpoint_path)?;
    let test_loader = BatchLoader::new(&test, config.batch_size)?.with_prefetch(config.prefetch);
    let test_stats = trainer.evaluate(&test_loader)?;
    info!(
        accuracy = test_stats.accuracy,
        loss = test_stats.loss,
        "test evaluation"
    );

    let predictions = trainer.predictions(&test_loader)?;
    println!("{}", predictions.report());
    println!("{}", predictions.confusion_matrix());

    if let Some(text) = &options.sample_text {
        let prediction = predict_text(
            trainer.classifier(),
            encoder.as_ref(),
            text,
            config.max_length,
            &device,
        )?;
        println!("Review text: {text}");
        println!("Sentiment  : {}", prediction.sentiment);
    }

    Ok(RunOutcome {
        history,
        test: test_stats,
        predictions,
    })
}
