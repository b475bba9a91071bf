//! Evaluation metrics over predicted and true sentiment labels.

pub mod confusion;
pub mod report;

pub use confusion::ConfusionMatrix;
pub use report::{ClassScores, ClassificationReport};

/// `correct / total`, or 0 when there is nothing to score.
#[must_use]
pub fn accuracy(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}
