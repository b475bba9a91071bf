//! # Kansou Trainer
//!
//! Fine-tunes a pretrained encoder plus sentiment head on labelled reviews:
//! AdamW with linear decay and gradient clipping, per-epoch validation,
//! best-model checkpointing and a final test report.

pub mod clip;
pub mod config;
pub mod history;
pub mod pipeline;
pub mod schedule;
pub mod trainer;

pub use clip::clip_grad_norm;
pub use config::TrainingConfig;
pub use history::{EpochMetrics, TrainingHistory};
pub use pipeline::{RunOptions, RunOutcome, run_training};
pub use schedule::LinearSchedule;
pub use trainer::{CONFIG_SIDECAR, EpochStats, PredictionSet, Trainer, restore, sidecar_path};
