use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{NUM_CLASSES, Sentiment};

/// Counts of (true class, predicted class) pairs.
///
/// Row index is the true class, column index the predicted class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: [[usize; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    /// Tally parallel label slices. Extra entries in the longer slice are ignored.
    #[must_use]
    pub fn from_labels(truth: &[Sentiment], predicted: &[Sentiment]) -> Self {
        let mut matrix = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            matrix.record(t, p);
        }
        matrix
    }

    pub fn record(&mut self, truth: Sentiment, predicted: Sentiment) {
        self.counts[truth.index()][predicted.index()] += 1;
    }

    #[must_use]
    pub fn count(&self, truth: Sentiment, predicted: Sentiment) -> usize {
        self.counts[truth.index()][predicted.index()]
    }

    /// Number of examples whose true class is `class` (row sum).
    #[must_use]
    pub fn true_total(&self, class: Sentiment) -> usize {
        self.counts[class.index()].iter().sum()
    }

    /// Number of examples predicted as `class` (column sum).
    #[must_use]
    pub fn predicted_total(&self, class: Sentiment) -> usize {
        self.counts.iter().map(|row| row[class.index()]).sum()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    #[must_use]
    pub fn rows(&self) -> &[[usize; NUM_CLASSES]; NUM_CLASSES] {
        &self.counts
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .chain(Sentiment::ALL.iter().map(|s| s.name().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:>w$}", "true \\ pred", w = width.max(11))?;
        for class in Sentiment::ALL {
            write!(f, " {:>width$}", class.name())?;
        }
        writeln!(f)?;
        for class in Sentiment::ALL {
            write!(f, "{:>w$}", class.name(), w = width.max(11))?;
            for count in &self.counts[class.index()] {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
