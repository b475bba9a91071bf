pub mod batch;
pub mod dataset;
pub mod loader;
pub mod split;

pub use batch::{Batch, BatchLoader, BatchTensors};
pub use dataset::{LengthSummary, ReviewDataset};
pub use loader::{CsvColumns, class_distribution, load_reviews, log_class_distribution, read_reviews};
pub use split::{DatasetSplit, SplitConfig, split_dataset};
