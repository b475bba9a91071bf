//! Seeded train / validation / test partitioning.

use serde::{Deserialize, Serialize};

use crate::error::{KansouError, Result};

/// How records are held out for validation and test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of all records held out from training.
    pub held_out_fraction: f64,
    /// Fraction of the held-out records that become the test partition.
    pub test_share: f64,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            held_out_fraction: 0.1,
            test_share: 0.5,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("held_out_fraction", self.held_out_fraction),
            ("test_share", self.test_share),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(KansouError::InvalidConfig(format!(
                    "{name} must be in (0, 1), got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// The three disjoint partitions of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
    pub test: Vec<T>,
}

impl<T> DatasetSplit<T> {
    /// Total number of records across all partitions.
    #[must_use]
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Shuffle `records` with `config.seed` and partition them.
///
/// The held-out count is `ceil(n * held_out_fraction)` and the test count
/// is `ceil(held_out * test_share)`; validation gets the remainder. The
/// same seed always yields the same partitions.
pub fn split_dataset<T>(records: Vec<T>, config: &SplitConfig) -> Result<DatasetSplit<T>> {
    config.validate()?;

    let total = records.len();
    let mut shuffled: Vec<Option<T>> = records.into_iter().map(Some).collect();
    let order = shuffled_indices(total, config.seed);

    let held_out = held_out_count(total, config.held_out_fraction);
    let test = held_out_count(held_out, config.test_share);
    let train_len = total - held_out;

    let mut take = |indices: &[usize]| -> Vec<T> {
        indices
            .iter()
            .filter_map(|&i| shuffled[i].take())
            .collect()
    };

    let train = take(&order[..train_len]);
    let validation = take(&order[train_len..total - test]);
    let test = take(&order[total - test..]);

    Ok(DatasetSplit {
        train,
        validation,
        test,
    })
}

fn held_out_count(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).ceil() as usize).min(n)
}

/// Fisher-Yates permutation of `0..n` driven by a seeded PCG.
fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = oorandom::Rand64::new(u128::from(seed));
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        indices.swap(i, j);
    }
    indices
}
