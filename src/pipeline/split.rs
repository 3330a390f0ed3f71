//! Stratified train/test partitioning.
//!
//! Each class is shuffled on its own with a seeded RNG and cut so that its
//! share of the test partition matches the configured fraction. Every class
//! keeps at least one example on each side, which requires two examples per
//! class.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{PolarityError, Result};
use crate::ml::label::{NUM_CLASSES, Sentiment};

/// Split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of each class held out for evaluation.
    pub test_fraction: f64,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Check that the test fraction lies strictly between 0 and 1.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PolarityError::invalid_config(format!(
                "split.test_fraction {} must lie in (0, 1)",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

/// Indices of the two partitions, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Training indices.
    pub train: Vec<usize>,
    /// Held-out indices.
    pub test: Vec<usize>,
}

/// Number of held-out examples for a class of `n` examples.
fn test_count(n: usize, fraction: f64) -> usize {
    let wanted = (n as f64 * fraction).round() as usize;
    wanted.clamp(1, n - 1)
}

/// Partition the positions of `labels` into train and test indices.
///
/// Fails with `InvalidTrainingSet` when a class has fewer than two examples.
pub fn stratified_split(labels: &[Sentiment], config: &SplitConfig) -> Result<Split> {
    config.validate()?;

    let mut by_class: [Vec<usize>; NUM_CLASSES] = Default::default();
    for (index, label) in labels.iter().enumerate() {
        by_class[label.index()].push(index);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (label, mut indices) in Sentiment::ALL.into_iter().zip(by_class) {
        if indices.len() < 2 {
            return Err(PolarityError::invalid_training_set(format!(
                "class {} has {} example(s), stratified split needs at least 2",
                label.as_str(),
                indices.len()
            )));
        }

        indices.shuffle(&mut rng);
        let n_test = test_count(indices.len(), config.test_fraction);
        debug!(
            "split class {}: {} train, {n_test} test",
            label.as_str(),
            indices.len() - n_test
        );
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}
