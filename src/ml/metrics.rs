//! Classification metrics.
//!
//! [`compute`] compares predicted labels against ground truth and returns
//! accuracy, support-weighted precision/recall/F1, per-class scores and the
//! confusion matrix (rows are actual classes, columns predicted classes, both
//! in [`Sentiment::ALL`] order). Undefined ratios (a class never predicted,
//! or absent from the ground truth) count as zero.
//!
//! # Examples
//!
//! ```
//! use polarity::ml::label::Sentiment::*;
//! use polarity::ml::metrics::compute;
//!
//! let metrics = compute(&[Positive, Negative, Neutral], &[Positive, Negative, Negative]).unwrap();
//! assert!((metrics.accuracy - 2.0 / 3.0).abs() < 1e-12);
//! assert_eq!(metrics.confusion_matrix[0][1], 1);
//! ```

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{PolarityError, Result};
use crate::ml::label::{NUM_CLASSES, Sentiment};

/// Scores of a single class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// The class.
    pub label: Sentiment,
    /// Fraction of predictions of this class that were correct.
    pub precision: f64,
    /// Fraction of this class's examples predicted as this class.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Number of examples of this class in the ground truth.
    pub support: usize,
}

/// Evaluation of a set of predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Support-weighted precision.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1.
    pub f1: f64,
    /// `confusion_matrix[actual][predicted]` counts.
    pub confusion_matrix: [[usize; NUM_CLASSES]; NUM_CLASSES],
    /// Per-class scores in class order.
    pub per_class: Vec<ClassMetrics>,
    /// Number of evaluated examples.
    pub support: usize,
}

/// Compute metrics for `predicted` against `actual`.
pub fn compute(predicted: &[Sentiment], actual: &[Sentiment]) -> Result<Metrics> {
    if predicted.len() != actual.len() {
        return Err(PolarityError::length_mismatch(format!(
            "{} predictions for {} ground-truth labels",
            predicted.len(),
            actual.len()
        )));
    }
    if actual.is_empty() {
        return Err(PolarityError::length_mismatch("no labels to evaluate"));
    }

    let mut confusion_matrix = [[0usize; NUM_CLASSES]; NUM_CLASSES];
    for (p, a) in predicted.iter().zip(actual) {
        confusion_matrix[a.index()][p.index()] += 1;
    }

    let total = actual.len();
    let correct: usize = (0..NUM_CLASSES).map(|k| confusion_matrix[k][k]).sum();

    let per_class: Vec<ClassMetrics> = Sentiment::ALL
        .iter()
        .map(|&label| {
            let k = label.index();
            let tp = confusion_matrix[k][k];
            let support: usize = confusion_matrix[k].iter().sum();
            let predicted_count: usize = confusion_matrix.iter().map(|row| row[k]).sum();
            let precision = ratio(tp, predicted_count);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    let weighted = |score: fn(&ClassMetrics) -> f64| -> f64 {
        per_class
            .iter()
            .map(|c| score(c) * c.support as f64)
            .sum::<f64>()
            / total as f64
    };

    Ok(Metrics {
        accuracy: correct as f64 / total as f64,
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
        confusion_matrix,
        support: total,
        per_class,
    })
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl Metrics {
    /// Unweighted mean of a per-class score.
    fn macro_average(&self, score: fn(&ClassMetrics) -> f64) -> f64 {
        self.per_class.iter().map(score).sum::<f64>() / self.per_class.len() as f64
    }

    /// Human-readable per-class report.
    pub fn classification_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        );
        let _ = writeln!(out);
        for c in &self.per_class {
            let _ = writeln!(
                out,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label.as_str(),
                c.precision,
                c.recall,
                c.f1,
                c.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        );
        let _ = writeln!(
            out,
            "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg",
            self.macro_average(|c| c.precision),
            self.macro_average(|c| c.recall),
            self.macro_average(|c| c.f1),
            self.support
        );
        let _ = writeln!(
            out,
            "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "weighted avg", self.precision, self.recall, self.f1, self.support
        );
        out
    }

    /// Confusion matrix as an aligned text table.
    pub fn confusion_table(&self) -> String {
        let mut out = format!("{:>10}", "actual");
        for label in Sentiment::ALL {
            let _ = write!(out, " {:>9}", label.as_str());
        }
        out.push('\n');
        for label in Sentiment::ALL {
            let _ = write!(out, "{:>10}", label.as_str());
            for count in self.confusion_matrix[label.index()] {
                let _ = write!(out, " {count:>9}");
            }
            out.push('\n');
        }
        out
    }
}
