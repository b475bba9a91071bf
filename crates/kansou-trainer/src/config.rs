use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use kansou_core::SplitConfig;
use serde::{Deserialize, Serialize};

/// Hyperparameters and paths for one fine-tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Pretrained model name or directory.
    pub model_name: String,
    /// Fixed token length of every encoded review.
    pub max_length: usize,
    pub batch_size: usize,
    pub epochs: usize,
    /// Initial AdamW learning rate, decayed linearly to 0.
    pub learning_rate: f64,
    /// Global gradient-norm ceiling.
    pub max_grad_norm: f64,
    /// Dropout before the classifier projection.
    pub dropout: f32,
    pub seed: u64,
    pub held_out_fraction: f64,
    pub test_share: f64,
    /// Batches encoded ahead of the training step (0 = inline).
    pub prefetch: usize,
    /// Where the best model state is written.
    pub checkpoint_path: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_name: "bert-base-cased".to_string(),
            max_length: 160,
            batch_size: 16,
            epochs: 10,
            learning_rate: 2e-5,
            max_grad_norm: 1.0,
            dropout: 0.3,
            seed: 42,
            held_out_fraction: 0.1,
            test_share: 0.5,
            prefetch: 4,
            checkpoint_path: PathBuf::from("models/best_model_state.safetensors"),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config; absent fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout.clamp(0.0, 1.0);
        self
    }

    pub fn with_prefetch(mut self, prefetch: usize) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            held_out_fraction: self.held_out_fraction,
            test_share: self.test_share,
            seed: self.seed,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            bail!("max_length must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.epochs == 0 {
            bail!("epochs must be positive");
        }
        if !(self.learning_rate > 0.0) {
            bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if !(self.max_grad_norm > 0.0) {
            bail!("max_grad_norm must be positive, got {}", self.max_grad_norm);
        }
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        self.split().validate()?;
        Ok(())
    }
}
