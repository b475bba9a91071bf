//! # Kansou
//!
//! Fine-tune a pretrained transformer encoder to classify app reviews as
//! negative, neutral or positive.
//!
//! This crate re-exports [`kansou_core`] (data, model and metrics) and
//! [`kansou_trainer`] (training loop and run pipeline).
//!
//! ```rust
//! use kansou::Sentiment;
//!
//! assert_eq!(Sentiment::from_rating(2), Sentiment::Negative);
//! assert_eq!(Sentiment::from_rating(3), Sentiment::Neutral);
//! assert_eq!(Sentiment::from_rating(5).name(), "positive");
//! ```

pub use kansou_core::*;
pub use kansou_trainer::{
    EpochMetrics, EpochStats, LinearSchedule, PredictionSet, RunOptions, RunOutcome, Trainer,
    TrainingConfig, TrainingHistory, run_training,
};

pub mod trainer {
    pub use kansou_trainer::*;
}
