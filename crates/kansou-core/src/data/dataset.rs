//! Dataset adapter: review records encoded on access.

use std::sync::Arc;

use crate::error::{KansouError, Result};
use crate::model::TextEncoder;
use crate::types::{EncodedExample, ReviewRecord};

/// A partition of reviews paired with the tokenizer that encodes them.
///
/// Encoding is lazy: nothing is tokenized until [`ReviewDataset::get`].
#[derive(Clone)]
pub struct ReviewDataset {
    records: Vec<ReviewRecord>,
    encoder: Arc<dyn TextEncoder>,
    max_length: usize,
}

impl ReviewDataset {
    pub fn new(
        records: Vec<ReviewRecord>,
        encoder: Arc<dyn TextEncoder>,
        max_length: usize,
    ) -> Result<Self> {
        if max_length == 0 {
            return Err(KansouError::InvalidConfig(
                "max_length must be positive".into(),
            ));
        }
        Ok(Self {
            records,
            encoder,
            max_length,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    /// Encode the record at `index`. Panics if out of bounds, like slice indexing.
    pub fn get(&self, index: usize) -> Result<EncodedExample> {
        let record = &self.records[index];
        let encoding = self.encoder.encode(&record.content, self.max_length)?;
        Ok(EncodedExample {
            text: record.content.clone(),
            encoding,
            label: record.sentiment,
        })
    }

    /// Untruncated token-length statistics, used to pick `max_length`.
    pub fn length_summary(&self) -> Result<LengthSummary> {
        let counts = self
            .records
            .iter()
            .map(|r| self.encoder.token_count(&r.content))
            .collect::<Result<Vec<_>>>()?;
        Ok(LengthSummary::from_counts(counts, self.max_length))
    }
}

/// Distribution of token counts over a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthSummary {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub p95: usize,
    /// Records longer than the configured `max_length`.
    pub truncated: usize,
}

impl LengthSummary {
    fn from_counts(mut counts: Vec<usize>, max_length: usize) -> Self {
        if counts.is_empty() {
            return Self {
                min: 0,
                max: 0,
                mean: 0.0,
                p95: 0,
                truncated: 0,
            };
        }
        counts.sort_unstable();
        let n = counts.len();
        // Nearest-rank percentile.
        let rank = ((0.95 * n as f64).ceil() as usize).clamp(1, n);
        Self {
            min: counts[0],
            max: counts[n - 1],
            mean: counts.iter().sum::<usize>() as f64 / n as f64,
            p95: counts[rank - 1],
            truncated: counts.iter().filter(|&&c| c > max_length).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HfTextEncoder;
    use crate::testing::word_tokenizer;
    use crate::types::Sentiment;

    fn dataset(max_length: usize) -> ReviewDataset {
        let records = vec![
            ReviewRecord::new("i hate this app", 1),
            ReviewRecord::new("it is ok", 3),
            ReviewRecord::new("best app ever !", 5),
        ];
        ReviewDataset::new(records, Arc::new(HfTextEncoder::new(word_tokenizer())), max_length)
            .unwrap()
    }

    #[test]
    fn items_are_encoded_to_fixed_length() {
        let ds = dataset(6);
        for i in 0..ds.len() {
            let item = ds.get(i).unwrap();
            assert_eq!(item.encoding.input_ids.len(), 6);
            assert_eq!(item.encoding.attention_mask.len(), 6);
        }
    }

    #[test]
    fn items_keep_text_and_label() {
        let item = dataset(8).get(2).unwrap();
        assert_eq!(item.text, "best app ever !");
        assert_eq!(item.label, Sentiment::Positive);
    }

    #[test]
    fn zero_max_length_is_rejected() {
        let encoder = Arc::new(HfTextEncoder::new(word_tokenizer()));
        assert!(matches!(
            ReviewDataset::new(Vec::new(), encoder, 0),
            Err(KansouError::InvalidConfig(_))
        ));
    }

    #[test]
    fn length_summary_counts_special_tokens() {
        let summary = dataset(5).length_summary().unwrap();
        // 4+2, 3+2, 4+2 tokens
        assert_eq!(summary.min, 5);
        assert_eq!(summary.max, 6);
        assert_eq!(summary.p95, 6);
        assert_eq!(summary.truncated, 2);
        assert!((summary.mean - 17.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_summary() {
        let summary = LengthSummary::from_counts(Vec::new(), 10);
        assert_eq!(summary.max, 0);
        assert_eq!(summary.truncated, 0);
    }
}
