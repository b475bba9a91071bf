//! # Kansou Core
//!
//! Building blocks for fine-tuning a pretrained transformer encoder on
//! three-class app-review sentiment: the review data model, CSV loading and
//! seeded splitting, fixed-length encoding, batching, the classifier head on
//! top of the encoder's pooled output, single-text inference and evaluation
//! metrics.
//!
//! ## Quick Start
//!
//! ```rust
//! use kansou_core::{Sentiment, read_reviews, CsvColumns};
//!
//! let table = "content,score\nCrashes constantly,1\nIt's fine,3\nLove it,5\n";
//! let reviews = read_reviews(table.as_bytes(), &CsvColumns::default()).unwrap();
//!
//! let labels: Vec<Sentiment> = reviews.iter().map(|r| r.sentiment).collect();
//! assert_eq!(labels, [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive]);
//! ```
pub mod data;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export primary API
pub use data::{
    Batch, BatchLoader, CsvColumns, DatasetSplit, LengthSummary, ReviewDataset, SplitConfig,
    class_distribution, load_reviews, read_reviews, split_dataset,
};
pub use error::{KansouError, Result};
pub use inference::{SentimentPrediction, predict_text};
pub use metrics::{ClassificationReport, ConfusionMatrix, accuracy};
pub use model::{
    BertEncoder, ClassifierHead, HfTextEncoder, PooledEncoder, PretrainedFiles,
    SentimentClassifier, TextEncoder, build_bert_classifier, load_bert_classifier,
    load_pretrained_weights, resolve_model_dir,
};
pub use types::{EncodedExample, EncodedText, NUM_CLASSES, ReviewRecord, Sentiment};
