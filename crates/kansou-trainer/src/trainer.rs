//! Fine-tuning loop for the sentiment classifier.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap, loss};
use kansou_core::{
    Batch, BatchLoader, ClassificationReport, ConfusionMatrix, NUM_CLASSES, ReviewDataset,
    Sentiment, SentimentClassifier, SentimentPrediction, accuracy,
};
use tracing::{debug, info};

use crate::clip::clip_grad_norm;
use crate::config::TrainingConfig;
use crate::history::{EpochMetrics, TrainingHistory};
use crate::schedule::LinearSchedule;

/// File written next to every checkpoint with the config that produced it.
pub const CONFIG_SIDECAR: &str = "training_config.json";

/// Accuracy and mean batch loss over one pass of a loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub accuracy: f64,
    pub loss: f64,
}

/// Model outputs over a whole loader, in loader order.
#[derive(Debug, Clone, Default)]
pub struct PredictionSet {
    pub texts: Vec<String>,
    pub predicted: Vec<Sentiment>,
    pub probabilities: Vec<[f32; NUM_CLASSES]>,
    pub labels: Vec<Sentiment>,
}

impl PredictionSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn report(&self) -> ClassificationReport {
        ClassificationReport::from_labels(&self.labels, &self.predicted)
    }

    pub fn confusion_matrix(&self) -> ConfusionMatrix {
        ConfusionMatrix::from_labels(&self.labels, &self.predicted)
    }
}

/// Owns the classifier, its parameters and the optimizer state.
pub struct Trainer {
    classifier: SentimentClassifier,
    varmap: VarMap,
    optimizer: AdamW,
    schedule: Option<LinearSchedule>,
    config: TrainingConfig,
    device: Device,
}

impl Trainer {
    /// AdamW over every var in `varmap`, no weight decay.
    pub fn new(
        classifier: SentimentClassifier,
        varmap: VarMap,
        config: TrainingConfig,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        let params = ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: 0.0,
            eps: 1e-6,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;
        Ok(Self {
            classifier,
            varmap,
            optimizer,
            schedule: None,
            config,
            device,
        })
    }

    pub fn classifier(&self) -> &SentimentClassifier {
        &self.classifier
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Follow `schedule`, advancing it once per optimizer step.
    ///
    /// Without a schedule the configured rate stays constant.
    pub fn set_schedule(&mut self, schedule: LinearSchedule) {
        self.optimizer.set_learning_rate(schedule.learning_rate());
        self.schedule = Some(schedule);
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    /// One pass over `loader` with dropout on and parameter updates.
    pub fn train_epoch(&mut self, loader: &BatchLoader<'_>) -> Result<EpochStats> {
        let vars = self.varmap.all_vars();
        let mut tally = Tally::default();

        loader.for_each(|batch| -> Result<()> {
            let tensors = batch.to_tensors(&self.device)?;
            let logits = self
                .classifier
                .logits(&tensors.input_ids, &tensors.attention_mask, true)?;
            let loss = loss::cross_entropy(&logits, &tensors.labels)?;

            let mut grads = loss.backward()?;
            let norm = clip_grad_norm(&mut grads, &vars, self.config.max_grad_norm)?;
            self.optimizer.step(&grads)?;
            if let Some(schedule) = self.schedule.as_mut() {
                self.optimizer.set_learning_rate(schedule.step());
            }

            tally.add(&logits, &tensors.labels, &loss, batch.len())?;
            debug!(grad_norm = norm, lr = self.optimizer.learning_rate(), "step");
            Ok(())
        })?;

        Ok(tally.finish())
    }

    /// One pass over `loader` in eval mode. Parameters are not touched.
    pub fn evaluate(&self, loader: &BatchLoader<'_>) -> Result<EpochStats> {
        let mut tally = Tally::default();
        loader.for_each(|batch| -> Result<()> {
            let tensors = batch.to_tensors(&self.device)?;
            let logits = self
                .classifier
                .logits(&tensors.input_ids, &tensors.attention_mask, false)?
                .detach();
            let loss = loss::cross_entropy(&logits, &tensors.labels)?;
            tally.add(&logits, &tensors.labels, &loss, batch.len())?;
            Ok(())
        })?;
        Ok(tally.finish())
    }

    /// Train for the configured number of epochs, checkpointing whenever
    /// validation accuracy strictly improves.
    pub fn fit(
        &mut self,
        train: &ReviewDataset,
        validation: &ReviewDataset,
    ) -> Result<TrainingHistory> {
        let train_loader =
            BatchLoader::new(train, self.config.batch_size)?.with_prefetch(self.config.prefetch);
        let val_loader = BatchLoader::new(validation, self.config.batch_size)?
            .with_prefetch(self.config.prefetch);

        let total_steps = train_loader.num_batches() * self.config.epochs;
        self.set_schedule(LinearSchedule::new(self.config.learning_rate, total_steps));
        info!(
            train = train.len(),
            validation = validation.len(),
            epochs = self.config.epochs,
            total_steps,
            "starting fine-tuning"
        );

        let mut history = TrainingHistory::new();
        for epoch in 1..=self.config.epochs {
            let train_stats = self.train_epoch(&train_loader)?;
            let val_stats = self.evaluate(&val_loader)?;

            info!(
                "Epoch {}/{} - train loss {:.4} acc {:.4} | val loss {:.4} acc {:.4}",
                epoch,
                self.config.epochs,
                train_stats.loss,
                train_stats.accuracy,
                val_stats.loss,
                val_stats.accuracy
            );

            let improved = history.record(EpochMetrics {
                epoch,
                train_accuracy: train_stats.accuracy,
                train_loss: train_stats.loss,
                val_accuracy: val_stats.accuracy,
                val_loss: val_stats.loss,
            });
            if improved {
                let path = self.config.checkpoint_path.clone();
                self.save_checkpoint(&path)?;
                info!(
                    epoch,
                    val_accuracy = val_stats.accuracy,
                    path = %path.display(),
                    "saved best model"
                );
            }
        }

        Ok(history)
    }

    /// Write every var to `path` plus the config sidecar beside it.
    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.varmap
            .save(path)
            .with_context(|| format!("Failed to save checkpoint {}", path.display()))?;

        let sidecar = sidecar_path(path);
        std::fs::write(&sidecar, serde_json::to_string_pretty(&self.config)?)
            .with_context(|| format!("Failed to write {}", sidecar.display()))?;
        Ok(())
    }

    /// Overwrite the current parameters with a saved checkpoint.
    pub fn restore(&mut self, path: &Path) -> Result<()> {
        restore(&mut self.varmap, path)
    }

    /// Eval-mode class probabilities for every example in `loader`.
    pub fn predictions(&self, loader: &BatchLoader<'_>) -> Result<PredictionSet> {
        let mut set = PredictionSet::default();
        loader.for_each(|batch: Batch| -> Result<()> {
            let tensors = batch.to_tensors(&self.device)?;
            let rows = self
                .classifier
                .probabilities(&tensors.input_ids, &tensors.attention_mask)?
                .to_vec2::<f32>()?;

            let labelled = batch.texts.into_iter().zip(batch.labels);
            for (row, (text, label)) in rows.into_iter().zip(labelled) {
                let probabilities: [f32; NUM_CLASSES] = row.try_into().map_err(|row: Vec<f32>| {
                    anyhow::anyhow!("expected {NUM_CLASSES} classes, got {}", row.len())
                })?;
                let prediction = SentimentPrediction::from_probabilities(probabilities);
                set.texts.push(text);
                set.predicted.push(prediction.sentiment);
                set.probabilities.push(probabilities);
                set.labels.push(label);
            }
            Ok(())
        })?;
        Ok(set)
    }
}

/// Load a checkpoint written by [`Trainer::save_checkpoint`] into `varmap`.
pub fn restore(varmap: &mut VarMap, path: &Path) -> Result<()> {
    varmap
        .load(path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
    info!(path = %path.display(), "restored model state");
    Ok(())
}

/// Config sidecar location for a checkpoint.
pub fn sidecar_path(checkpoint: &Path) -> PathBuf {
    checkpoint.with_file_name(CONFIG_SIDECAR)
}

#[derive(Default)]
struct Tally {
    correct: usize,
    total: usize,
    loss_sum: f64,
    batches: usize,
}

impl Tally {
    fn add(&mut self, logits: &Tensor, labels: &Tensor, loss: &Tensor, len: usize) -> Result<()> {
        let correct = logits
            .argmax(1)?
            .eq(labels)?
            .to_dtype(DType::F32)?
            .sum_all()?
            .to_scalar::<f32>()?;
        self.correct += correct as usize;
        self.total += len;
        self.loss_sum += loss.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        self.batches += 1;
        Ok(())
    }

    fn finish(self) -> EpochStats {
        EpochStats {
            accuracy: accuracy(self.correct, self.total),
            loss: if self.batches == 0 {
                0.0
            } else {
                self.loss_sum / self.batches as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use candle_nn::{Embedding, Module, VarBuilder};
    use kansou_core::{EncodedText, PooledEncoder, ReviewRecord, TextEncoder};

    use super::*;

    const WORDS: &[&str] = &["[pad]", "love", "great", "bad", "awful", "fine", "ok", "app"];

    /// Whitespace word lookup; unknown words map to the last id.
    struct WordEncoder;

    impl TextEncoder for WordEncoder {
        fn encode(&self, text: &str, max_length: usize) -> kansou_core::Result<EncodedText> {
            let ids: Vec<u32> = text
                .split_whitespace()
                .map(|w| {
                    WORDS
                        .iter()
                        .position(|v| *v == w.to_lowercase())
                        .unwrap_or(WORDS.len() - 1) as u32
                })
                .collect();
            Ok(EncodedText::padded(&ids, max_length, 0))
        }

        fn token_count(&self, text: &str) -> kansou_core::Result<usize> {
            Ok(text.split_whitespace().count())
        }

        fn pad_id(&self) -> u32 {
            0
        }
    }

    struct BagOfWords {
        embedding: Embedding,
        hidden: usize,
    }

    impl PooledEncoder for BagOfWords {
        fn forward_t(
            &self,
            input_ids: &Tensor,
            attention_mask: &Tensor,
            _train: bool,
        ) -> candle_core::Result<Tensor> {
            let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
            let summed = self.embedding.forward(input_ids)?.broadcast_mul(&mask)?.sum(1)?;
            summed.broadcast_div(&mask.sum(1)?.clamp(1f32, f32::MAX)?)
        }

        fn hidden_size(&self) -> usize {
            self.hidden
        }
    }

    fn build(device: &Device) -> (SentimentClassifier, VarMap) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let embedding = candle_nn::embedding(WORDS.len(), 8, vb.pp("encoder")).unwrap();
        let encoder = BagOfWords {
            embedding,
            hidden: 8,
        };
        let classifier = SentimentClassifier::new(Box::new(encoder), 0.0, vb).unwrap();
        (classifier, varmap)
    }

    fn dataset(n: usize) -> ReviewDataset {
        let rows = [
            ("love great app", 5),
            ("bad awful app", 1),
            ("fine ok app", 3),
            ("great love", 4),
            ("awful bad", 2),
            ("ok fine", 3),
        ];
        let records = (0..n)
            .map(|i| {
                let (text, score) = rows[i % rows.len()];
                ReviewRecord::new(text, score)
            })
            .collect();
        ReviewDataset::new(records, Arc::new(WordEncoder), 6).unwrap()
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kansou-trainer-{name}-{}", std::process::id()))
    }

    fn config(dir: &Path, epochs: usize) -> TrainingConfig {
        TrainingConfig::new()
            .with_epochs(epochs)
            .with_batch_size(4)
            .with_max_length(6)
            .with_learning_rate(0.05)
            .with_dropout(0.0)
            .with_prefetch(2)
            .with_checkpoint_path(dir.join("best.safetensors"))
    }

    #[test]
    fn training_reduces_loss() {
        let device = Device::Cpu;
        let dir = scratch("loss");
        let (classifier, varmap) = build(&device);
        let mut trainer = Trainer::new(classifier, varmap, config(&dir, 1), device).unwrap();

        let data = dataset(24);
        let loader = BatchLoader::new(&data, 4).unwrap();
        let before = trainer.evaluate(&loader).unwrap();
        for _ in 0..15 {
            trainer.train_epoch(&loader).unwrap();
        }
        let after = trainer.evaluate(&loader).unwrap();

        assert!(after.loss < before.loss, "{after:?} vs {before:?}");
        assert!(after.accuracy >= before.accuracy);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn schedule_reaches_zero_at_the_end_of_fit() {
        let device = Device::Cpu;
        let dir = scratch("schedule");
        let (classifier, varmap) = build(&device);
        let mut trainer = Trainer::new(classifier, varmap, config(&dir, 2), device).unwrap();
        assert_eq!(trainer.learning_rate(), 0.05);

        let data = dataset(12);
        trainer.fit(&data, &data).unwrap();
        assert_eq!(trainer.learning_rate(), 0.0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn checkpoint_holds_the_best_validation_epoch() {
        let device = Device::Cpu;
        let dir = scratch("best");
        let (classifier, varmap) = build(&device);
        let mut trainer = Trainer::new(classifier, varmap, config(&dir, 4), device).unwrap();

        let train = dataset(24);
        let validation = dataset(9);
        let history = trainer.fit(&train, &validation).unwrap();
        assert_eq!(history.len(), 4);
        let best = *history.best().unwrap();

        let checkpoint = trainer.config().checkpoint_path.clone();
        assert!(checkpoint.exists());
        assert!(sidecar_path(&checkpoint).exists());

        trainer.restore(&checkpoint).unwrap();
        let loader = BatchLoader::new(&validation, 4).unwrap();
        let restored = trainer.evaluate(&loader).unwrap();
        assert_eq!(restored.accuracy, best.val_accuracy);
        assert!((restored.loss - best.val_loss).abs() < 1e-5);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sidecar_round_trips_the_config() {
        let device = Device::Cpu;
        let dir = scratch("sidecar");
        let (classifier, varmap) = build(&device);
        let cfg = config(&dir, 1);
        let trainer = Trainer::new(classifier, varmap, cfg.clone(), device).unwrap();

        let path = dir.join("nested").join("model.safetensors");
        trainer.save_checkpoint(&path).unwrap();
        let saved = TrainingConfig::from_file(sidecar_path(&path)).unwrap();
        assert_eq!(saved, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn predictions_follow_loader_order() {
        let device = Device::Cpu;
        let dir = scratch("predictions");
        let (classifier, varmap) = build(&device);
        let trainer = Trainer::new(classifier, varmap, config(&dir, 1), device).unwrap();

        let data = dataset(7);
        let loader = BatchLoader::new(&data, 3).unwrap().with_prefetch(1);
        let set = trainer.predictions(&loader).unwrap();

        assert_eq!(set.len(), 7);
        let texts: Vec<&str> = data.records().iter().map(|r| r.content.as_str()).collect();
        assert_eq!(set.texts, texts);
        let labels: Vec<Sentiment> = data.records().iter().map(|r| r.sentiment).collect();
        assert_eq!(set.labels, labels);
        for row in &set.probabilities {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
        assert_eq!(set.confusion_matrix().total(), 7);
        assert_eq!(set.report().macro_avg.support, 7);
    }

    #[test]
    fn rejects_invalid_config() {
        let device = Device::Cpu;
        let (classifier, varmap) = build(&device);
        let result = Trainer::new(
            classifier,
            varmap,
            TrainingConfig::new().with_batch_size(0),
            device,
        );
        assert!(result.is_err());
    }
}
