//! # Batch loading
//!
//! Groups encoded examples into fixed-width mini-batches, always in dataset
//! index order. With prefetching enabled a single producer thread encodes
//! batches ahead of the consumer through a bounded channel; the order seen
//! by the consumer does not change.

use std::sync::mpsc;
use std::thread;

use candle_core::{Device, Tensor};
use tracing::debug;

use crate::data::dataset::ReviewDataset;
use crate::error::{KansouError, Result};
use crate::types::{EncodedExample, Sentiment};

/// Encoded examples stacked row-major into `[len, seq_len]` arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub texts: Vec<String>,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels: Vec<Sentiment>,
    pub seq_len: usize,
}

/// Device tensors for one batch.
pub struct BatchTensors {
    /// `[batch, seq_len]`, `u32`.
    pub input_ids: Tensor,
    /// `[batch, seq_len]`, `u32`.
    pub attention_mask: Tensor,
    /// `[batch]`, `u32` class indices.
    pub labels: Tensor,
}

impl Batch {
    /// Stack examples. All encodings must share one length.
    pub fn from_examples(examples: Vec<EncodedExample>) -> Result<Self> {
        let seq_len = examples.first().map(|e| e.encoding.len()).unwrap_or(0);
        let mut batch = Self {
            texts: Vec::with_capacity(examples.len()),
            input_ids: Vec::with_capacity(examples.len() * seq_len),
            attention_mask: Vec::with_capacity(examples.len() * seq_len),
            labels: Vec::with_capacity(examples.len()),
            seq_len,
        };

        for example in examples {
            if example.encoding.len() != seq_len
                || example.encoding.attention_mask.len() != seq_len
            {
                return Err(KansouError::InvalidConfig(format!(
                    "ragged batch: expected sequence length {seq_len}, got {}",
                    example.encoding.len()
                )));
            }
            batch.input_ids.extend(example.encoding.input_ids);
            batch.attention_mask.extend(example.encoding.attention_mask);
            batch.labels.push(example.label);
            batch.texts.push(example.text);
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn to_tensors(&self, device: &Device) -> Result<BatchTensors> {
        let shape = (self.len(), self.seq_len);
        let labels: Vec<u32> = self.labels.iter().map(|l| l.index() as u32).collect();
        Ok(BatchTensors {
            input_ids: Tensor::from_slice(&self.input_ids, shape, device)?,
            attention_mask: Tensor::from_slice(&self.attention_mask, shape, device)?,
            labels: Tensor::from_vec(labels, self.len(), device)?,
        })
    }
}

/// Iterates a dataset in index order, `batch_size` examples at a time.
pub struct BatchLoader<'a> {
    dataset: &'a ReviewDataset,
    batch_size: usize,
    prefetch: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(dataset: &'a ReviewDataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(KansouError::InvalidConfig(
                "batch_size must be positive".into(),
            ));
        }
        Ok(Self {
            dataset,
            batch_size,
            prefetch: 0,
        })
    }

    /// Encode up to `depth` batches ahead on a background thread. 0 disables it.
    pub fn with_prefetch(mut self, depth: usize) -> Self {
        self.prefetch = depth;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_examples(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Encode batch `index`; the last batch may be shorter.
    pub fn batch(&self, index: usize) -> Result<Batch> {
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.dataset.len());
        let examples = (start..end)
            .map(|i| self.dataset.get(i))
            .collect::<Result<Vec<_>>>()?;
        Batch::from_examples(examples)
    }

    /// Feed every batch, in order, to `f`. Stops at the first error.
    pub fn for_each<E, F>(&self, mut f: F) -> std::result::Result<(), E>
    where
        E: From<KansouError>,
        F: FnMut(Batch) -> std::result::Result<(), E>,
    {
        if self.prefetch == 0 {
            for index in 0..self.num_batches() {
                f(self.batch(index)?)?;
            }
            return Ok(());
        }

        thread::scope(|scope| {
            let (tx, rx) = mpsc::sync_channel::<Result<Batch>>(self.prefetch);
            scope.spawn(move || {
                for index in 0..self.num_batches() {
                    let batch = self.batch(index);
                    let failed = batch.is_err();
                    // Receiver gone: the consumer stopped early.
                    if tx.send(batch).is_err() || failed {
                        debug!(index, "batch producer stopped");
                        return;
                    }
                }
            });

            for batch in rx {
                f(batch?)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::HfTextEncoder;
    use crate::testing::word_tokenizer;
    use crate::types::ReviewRecord;

    fn dataset(n: usize) -> ReviewDataset {
        let texts = ["i love this app", "bad", "it is ok", "crashes", "great app"];
        let records = (0..n)
            .map(|i| ReviewRecord::new(texts[i % texts.len()], (i % 5 + 1) as u8))
            .collect();
        ReviewDataset::new(records, Arc::new(HfTextEncoder::new(word_tokenizer())), 8).unwrap()
    }

    fn collect(loader: &BatchLoader<'_>) -> Vec<Batch> {
        let mut out = Vec::new();
        loader
            .for_each(|b| {
                out.push(b);
                Ok::<_, KansouError>(())
            })
            .unwrap();
        out
    }

    #[test]
    fn last_batch_may_be_short() {
        let ds = dataset(10);
        let loader = BatchLoader::new(&ds, 4).unwrap();
        assert_eq!(loader.num_batches(), 3);
        let sizes: Vec<usize> = collect(&loader).iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn prefetch_preserves_index_order() {
        let ds = dataset(23);
        let inline = collect(&BatchLoader::new(&ds, 3).unwrap());
        let prefetched = collect(&BatchLoader::new(&ds, 3).unwrap().with_prefetch(2));
        assert_eq!(inline, prefetched);

        let texts: Vec<&str> = prefetched
            .iter()
            .flat_map(|b| b.texts.iter().map(String::as_str))
            .collect();
        let expected: Vec<&str> = ds.records().iter().map(|r| r.content.as_str()).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn consumer_error_stops_iteration() {
        let ds = dataset(20);
        let loader = BatchLoader::new(&ds, 2).unwrap().with_prefetch(1);
        let mut seen = 0;
        let result = loader.for_each(|_| {
            seen += 1;
            if seen == 3 {
                Err(KansouError::InvalidConfig("stop".into()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(seen, 3);
    }

    #[test]
    fn tensors_have_batch_shape() {
        let ds = dataset(5);
        let loader = BatchLoader::new(&ds, 5).unwrap();
        let batch = loader.batch(0).unwrap();
        let tensors = batch.to_tensors(&Device::Cpu).unwrap();
        assert_eq!(tensors.input_ids.dims(), &[5, 8]);
        assert_eq!(tensors.attention_mask.dims(), &[5, 8]);
        assert_eq!(tensors.labels.to_vec1::<u32>().unwrap(), vec![0, 0, 1, 2, 2]);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let ds = dataset(1);
        assert!(BatchLoader::new(&ds, 0).is_err());
    }

    #[test]
    fn empty_dataset_yields_no_batches() {
        let ds = dataset(0);
        let loader = BatchLoader::new(&ds, 4).unwrap().with_prefetch(2);
        assert_eq!(loader.num_batches(), 0);
        assert!(collect(&loader).is_empty());
    }
}
