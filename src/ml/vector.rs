//! Sparse feature vectors.

use serde::{Deserialize, Serialize};

use crate::error::{PolarityError, Result};

/// A sparse real-valued vector.
///
/// Entries are kept sorted by index with no duplicates and no explicit
/// zeros, so two vectors with the same content compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dimension: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Create an all-zero vector of the given dimension.
    pub fn zeros(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    /// Create a vector from `(index, value)` pairs.
    ///
    /// Pairs are sorted, duplicate indices are summed and zeros dropped. An
    /// index outside `dimension` is an error.
    pub fn from_entries(dimension: usize, mut entries: Vec<(usize, f64)>) -> Result<Self> {
        if let Some(&(index, _)) = entries.iter().find(|(index, _)| *index >= dimension) {
            return Err(PolarityError::invalid_config(format!(
                "feature index {index} out of range for dimension {dimension}"
            )));
        }

        entries.sort_by_key(|&(index, _)| index);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (index, value) in entries {
            match merged.last_mut() {
                Some((last, acc)) if *last == index => *acc += value,
                _ => merged.push((index, value)),
            }
        }
        merged.retain(|&(_, value)| value != 0.0);

        Ok(Self {
            dimension,
            entries: merged,
        })
    }

    /// Get the dimensionality of this vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Whether every component is zero.
    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// The non-zero entries, sorted by index.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Iterate over the indices of non-zero components.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|&(index, _)| index)
    }

    /// Value of component `index` (zero when not stored).
    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    /// Calculate the L2 norm (magnitude) of this vector.
    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }

    /// Normalize this vector to unit length. A zero vector is left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, value) in &mut self.entries {
                *value /= norm;
            }
        }
    }

    /// Dot product with a dense vector of at least `dimension` components.
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.entries
            .iter()
            .map(|&(index, value)| value * dense[index])
            .sum()
    }

    /// Expand into a dense vector.
    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dimension];
        for &(index, value) in &self.entries {
            dense[index] = value;
        }
        dense
    }
}
