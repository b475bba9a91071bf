use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::confusion::ConfusionMatrix;
use crate::types::{NUM_CLASSES, Sentiment};

/// Precision, recall and F1 for one class (or one average row).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class and averaged scores over a labelled prediction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: [ClassScores; NUM_CLASSES],
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    /// Build the report from parallel slices of true and predicted labels.
    ///
    /// Undefined ratios (no predictions or no support for a class) count as 0.
    #[must_use]
    pub fn from_labels(truth: &[Sentiment], predicted: &[Sentiment]) -> Self {
        Self::from_confusion(&ConfusionMatrix::from_labels(truth, predicted))
    }

    #[must_use]
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let total = matrix.total();
        let mut classes = [ClassScores::default(); NUM_CLASSES];

        for class in Sentiment::ALL {
            let k = class.index();
            let tp = matrix.count(class, class);
            let predicted = matrix.predicted_total(class);
            let support = matrix.true_total(class);

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            classes[k] = ClassScores {
                precision,
                recall,
                f1,
                support,
            };
        }

        let correct: usize = Sentiment::ALL.iter().map(|&c| matrix.count(c, c)).sum();

        // Averages span only classes seen in the truth or the predictions.
        let present =
            Sentiment::ALL.map(|c| matrix.true_total(c) + matrix.predicted_total(c) > 0);

        Self {
            classes,
            accuracy: ratio(correct, total),
            macro_avg: average(&classes, &present, |_| 1.0, total),
            weighted_avg: average(&classes, &present, |s| s.support as f64, total),
        }
    }

    #[must_use]
    pub fn class(&self, class: Sentiment) -> &ClassScores {
        &self.classes[class.index()]
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn average(
    classes: &[ClassScores],
    present: &[bool],
    weight: impl Fn(&ClassScores) -> f64,
    total: usize,
) -> ClassScores {
    let weights: Vec<f64> = classes
        .iter()
        .zip(present)
        .map(|(c, &p)| if p { weight(c) } else { 0.0 })
        .collect();
    let sum: f64 = weights.iter().sum();
    let mean = |pick: fn(&ClassScores) -> f64| {
        if sum == 0.0 {
            0.0
        } else {
            classes.iter().zip(&weights).map(|(c, w)| pick(c) * w).sum::<f64>() / sum
        }
    };
    ClassScores {
        precision: mean(|c| c.precision),
        recall: mean(|c| c.recall),
        f1: mean(|c| c.f1),
        support: total,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for class in Sentiment::ALL {
            let s = self.class(class);
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class.name(),
                s.precision,
                s.recall,
                s.f1,
                s.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, s) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, s.precision, s.recall, s.f1, s.support
            )?;
        }
        Ok(())
    }
}
