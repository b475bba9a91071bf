use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Accuracy and mean loss for one epoch, on train and validation data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number.
    pub epoch: usize,
    pub train_accuracy: f64,
    pub train_loss: f64,
    pub val_accuracy: f64,
    pub val_loss: f64,
}

/// Per-epoch metrics in training order, plus the best validation epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    epochs: Vec<EpochMetrics>,
    best: Option<usize>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an epoch. Returns `true` when its validation accuracy is
    /// strictly better than every earlier epoch, which is always the case
    /// for the first one.
    pub fn record(&mut self, metrics: EpochMetrics) -> bool {
        let improved = match self.best() {
            None => true,
            Some(best) => metrics.val_accuracy > best.val_accuracy,
        };
        self.epochs.push(metrics);
        if improved {
            self.best = Some(self.epochs.len() - 1);
        }
        improved
    }

    /// Epoch with the highest validation accuracy; the earliest on ties.
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.best.and_then(|i| self.epochs.get(i))
    }

    pub fn epochs(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Write the history as pretty JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write history {}", path.display()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read history {}", path.display()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(epoch: usize, val_accuracy: f64) -> EpochMetrics {
        EpochMetrics {
            epoch,
            train_accuracy: 0.5,
            train_loss: 1.0,
            val_accuracy,
            val_loss: 1.0,
        }
    }

    #[test]
    fn first_epoch_is_always_best() {
        let mut history = TrainingHistory::new();
        assert!(history.best().is_none());
        assert!(history.record(epoch(1, 0.0)));
        assert_eq!(history.best().unwrap().epoch, 1);
    }

    #[test]
    fn only_strict_improvements_count() {
        let mut history = TrainingHistory::new();
        assert!(history.record(epoch(1, 0.6)));
        assert!(!history.record(epoch(2, 0.6)));
        assert!(history.record(epoch(3, 0.7)));
        assert!(!history.record(epoch(4, 0.65)));

        assert_eq!(history.len(), 4);
        assert_eq!(history.best().unwrap().epoch, 3);
    }

    #[test]
    fn ties_keep_the_earliest_epoch() {
        let mut history = TrainingHistory::new();
        history.record(epoch(1, 0.8));
        history.record(epoch(2, 0.8));
        assert_eq!(history.best().unwrap().epoch, 1);
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("kansou-history-{}", std::process::id()));
        let path = dir.join("nested").join("history.json");

        let mut history = TrainingHistory::new();
        history.record(epoch(1, 0.4));
        history.record(epoch(2, 0.9));
        history.save(&path).unwrap();

        let loaded = TrainingHistory::load(&path).unwrap();
        assert_eq!(loaded, history);
        std::fs::remove_dir_all(&dir).ok();
    }
}
