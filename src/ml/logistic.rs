//! Multinomial logistic regression.
//!
//! One weight row and one bias per [`Sentiment`] class. Fitting hands a dense
//! copy of the training matrix to [`linfa_logistic::MultiLogisticRegression`],
//! which minimises the L2-regularised multinomial cross-entropy
//!
//! ```text
//! Σ_i −log softmax(W·x_i + b)_{y_i} + ‖W‖² / (2C)
//! ```
//!
//! with L-BFGS from all-zero weights, so a fit is fully deterministic. The
//! bias is not regularised. The fitted coefficients are copied out into
//! plain vectors, so prediction works directly on sparse features and a
//! fitted model can be persisted and shared across threads.

use linfa::Dataset;
use linfa::traits::Fit;
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PolarityError, Result};
use crate::ml::label::{NUM_CLASSES, Sentiment};
use crate::ml::vector::SparseVector;

/// Classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Inverse regularisation strength.
    pub c: f64,
    /// Maximum optimizer iterations.
    pub max_iter: usize,
    /// Gradient norm at which the optimizer stops.
    pub tol: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl ClassifierConfig {
    /// Check that the settings describe a usable classifier.
    pub fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(PolarityError::invalid_config(format!(
                "classifier.c {} must be positive",
                self.c
            )));
        }
        if self.max_iter == 0 {
            return Err(PolarityError::invalid_config(
                "classifier.max_iter must be positive",
            ));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(PolarityError::invalid_config(format!(
                "classifier.tol {} must be positive",
                self.tol
            )));
        }
        Ok(())
    }
}

/// Probability of each class, in [`Sentiment::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities([f64; NUM_CLASSES]);

impl ClassProbabilities {
    /// Wrap a probability simplex.
    pub fn new(probabilities: [f64; NUM_CLASSES]) -> Self {
        Self(probabilities)
    }

    /// Probability of `label`.
    pub fn get(&self, label: Sentiment) -> f64 {
        self.0[label.index()]
    }

    /// Probabilities in class order.
    pub fn as_array(&self) -> &[f64; NUM_CLASSES] {
        &self.0
    }

    /// `(label, probability)` pairs in class order.
    pub fn iter(&self) -> impl Iterator<Item = (Sentiment, f64)> + '_ {
        Sentiment::ALL.iter().copied().zip(self.0.iter().copied())
    }

    /// The most probable class; ties go to the lower class index.
    pub fn argmax(&self) -> (Sentiment, f64) {
        let mut best = (Sentiment::ALL[0], self.0[0]);
        for (label, p) in self.iter().skip(1) {
            if p > best.1 {
                best = (label, p);
            }
        }
        best
    }

    /// Sum of all probabilities (1.0 up to rounding).
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}


/// Summary of a classifier fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Objective value at the solution.
    pub final_loss: f64,
    /// Euclidean norm of the objective gradient at the solution.
    pub gradient_norm: f64,
    /// Whether the gradient norm reached the configured tolerance.
    pub converged: bool,
}

/// Multinomial logistic regression over sparse features.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ClassifierState", into = "ClassifierState")]
pub struct LogisticRegression {
    config: ClassifierConfig,
    /// Class order of the weight rows; empty until fitted.
    classes: Vec<Sentiment>,
    n_features: usize,
    /// `NUM_CLASSES × n_features`, row-major.
    weights: Vec<f64>,
    bias: Vec<f64>,
    report: Option<FitReport>,
}

/// Persisted form of a [`LogisticRegression`].
#[derive(Serialize, Deserialize)]
struct ClassifierState {
    config: ClassifierConfig,
    classes: Vec<Sentiment>,
    n_features: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
    report: Option<FitReport>,
}

impl From<LogisticRegression> for ClassifierState {
    fn from(model: LogisticRegression) -> Self {
        ClassifierState {
            config: model.config,
            classes: model.classes,
            n_features: model.n_features,
            weights: model.weights,
            bias: model.bias,
            report: model.report,
        }
    }
}

impl TryFrom<ClassifierState> for LogisticRegression {
    type Error = PolarityError;

    fn try_from(state: ClassifierState) -> Result<Self> {
        let mut model = LogisticRegression::new(state.config)?;
        if state.classes.is_empty() {
            if !state.weights.is_empty() || !state.bias.is_empty() {
                return Err(PolarityError::serialization(
                    "unfitted classifier state carries coefficients",
                ));
            }
            return Ok(model);
        }

        if state.classes != Sentiment::ALL {
            return Err(PolarityError::serialization(format!(
                "classifier state has classes {:?}, expected {:?}",
                state.classes,
                Sentiment::ALL
            )));
        }
        if state.n_features == 0 {
            return Err(PolarityError::serialization(
                "fitted classifier state has no features",
            ));
        }
        if state.weights.len() != NUM_CLASSES * state.n_features {
            return Err(PolarityError::serialization(format!(
                "classifier state has {} weights, expected {} ({} classes x {} features)",
                state.weights.len(),
                NUM_CLASSES * state.n_features,
                NUM_CLASSES,
                state.n_features
            )));
        }
        if state.bias.len() != NUM_CLASSES {
            return Err(PolarityError::serialization(format!(
                "classifier state has {} biases, expected {NUM_CLASSES}",
                state.bias.len()
            )));
        }
        if !state.weights.iter().chain(&state.bias).all(|v| v.is_finite()) {
            return Err(PolarityError::serialization(
                "classifier state has non-finite coefficients",
            ));
        }

        model.classes = state.classes;
        model.n_features = state.n_features;
        model.weights = state.weights;
        model.bias = state.bias;
        model.report = state.report;
        Ok(model)
    }
}

impl LogisticRegression {
    /// Create an unfitted classifier.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            classes: Vec::new(),
            n_features: 0,
            weights: Vec::new(),
            bias: Vec::new(),
            report: None,
        })
    }

    /// Get the classifier configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Fit the model on feature vectors and their labels.
    ///
    /// Every class must be represented; all vectors must share one
    /// dimension. Replaces any previously fitted weights.
    pub fn fit(&mut self, vectors: &[SparseVector], labels: &[Sentiment]) -> Result<FitReport> {
        if vectors.len() != labels.len() {
            return Err(PolarityError::invalid_training_set(format!(
                "{} feature vectors but {} labels",
                vectors.len(),
                labels.len()
            )));
        }
        let Some(first) = vectors.first() else {
            return Err(PolarityError::invalid_training_set("no training examples"));
        };
        let n_features = first.dimension();
        if let Some(v) = vectors.iter().find(|v| v.dimension() != n_features) {
            return Err(PolarityError::invalid_training_set(format!(
                "feature vectors have mixed dimensions {} and {}",
                n_features,
                v.dimension()
            )));
        }
        check_class_coverage(labels)?;

        let records = dense_records(vectors, n_features);
        let targets: Array1<usize> = labels.iter().map(|label| label.index()).collect();
        debug!(
            "fitting classifier on {} x {} records, C = {}",
            records.nrows(),
            records.ncols(),
            self.config.c
        );
        let dataset = Dataset::new(records, targets);
        let fitted = MultiLogisticRegression::<f64>::default()
            .alpha(1.0 / self.config.c)
            .max_iterations(self.config.max_iter as u64)
            .gradient_tolerance(self.config.tol)
            .fit(&dataset)
            .map_err(|e| {
                PolarityError::invalid_training_set(format!("classifier fit failed: {e}"))
            })?;

        let columns = class_columns(&fitted)?;
        let report = summarize(&fitted, &columns, dataset.records(), labels, &self.config);
        if report.converged {
            info!(
                "classifier converged, loss {:.6}, gradient norm {:.2e}",
                report.final_loss, report.gradient_norm
            );
        } else {
            warn!(
                "classifier stopped without converging after at most {} iterations, \
                 loss {:.6}, gradient norm {:.2e}",
                self.config.max_iter, report.final_loss, report.gradient_norm
            );
        }

        let params = fitted.params().to_owned();
        let intercept = fitted.intercept().to_owned();
        let mut weights = vec![0.0; NUM_CLASSES * n_features];
        let mut bias = vec![0.0; NUM_CLASSES];
        for (label, &column) in Sentiment::ALL.iter().zip(&columns) {
            let start = label.index() * n_features;
            let row = &mut weights[start..start + n_features];
            for (w, p) in row.iter_mut().zip(params.column(column)) {
                *w = *p;
            }
            bias[label.index()] = intercept[column];
        }

        self.weights = weights;
        self.bias = bias;
        self.n_features = n_features;
        self.classes = Sentiment::ALL.to_vec();
        self.report = Some(report);
        debug!("classifier fitted: {} features x {} classes", n_features, NUM_CLASSES);

        Ok(report)
    }

    /// Raw class scores `W·x + b`.
    pub fn decision_function(&self, vector: &SparseVector) -> Result<[f64; NUM_CLASSES]> {
        if !self.is_fitted() {
            return Err(PolarityError::not_fitted("classifier"));
        }
        if vector.dimension() != self.n_features {
            return Err(PolarityError::length_mismatch(format!(
                "feature vector has dimension {}, classifier expects {}",
                vector.dimension(),
                self.n_features
            )));
        }
        Ok(scores(&self.weights, &self.bias, self.n_features, vector))
    }

    /// Class probabilities for `vector`.
    pub fn predict_proba(&self, vector: &SparseVector) -> Result<ClassProbabilities> {
        let mut scores = self.decision_function(vector)?;
        softmax_in_place(&mut scores);
        Ok(ClassProbabilities(scores))
    }

    /// Most probable label together with the full probability simplex.
    pub fn predict(&self, vector: &SparseVector) -> Result<(Sentiment, ClassProbabilities)> {
        let probabilities = self.predict_proba(vector)?;
        Ok((probabilities.argmax().0, probabilities))
    }

    /// Whether the model has been fitted.
    pub fn is_fitted(&self) -> bool {
        !self.classes.is_empty()
    }

    /// Class order of the model.
    pub fn classes(&self) -> &[Sentiment] {
        &self.classes
    }

    /// Number of input features.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Weight row of `label`, or `None` before fitting.
    pub fn coefficients(&self, label: Sentiment) -> Option<&[f64]> {
        if !self.is_fitted() {
            return None;
        }
        let start = label.index() * self.n_features;
        Some(&self.weights[start..start + self.n_features])
    }

    /// Bias of `label`, or `None` before fitting.
    pub fn intercept(&self, label: Sentiment) -> Option<f64> {
        self.bias.get(label.index()).copied()
    }

    /// Report of the last fit.
    pub fn fit_report(&self) -> Option<FitReport> {
        self.report
    }
}

fn check_class_coverage(labels: &[Sentiment]) -> Result<()> {
    let mut counts = [0usize; NUM_CLASSES];
    for label in labels {
        counts[label.index()] += 1;
    }
    let missing: Vec<&str> = Sentiment::ALL
        .iter()
        .filter(|label| counts[label.index()] == 0)
        .map(|label| label.as_str())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PolarityError::invalid_training_set(format!(
            "no examples for class(es): {}",
            missing.join(", ")
        )))
    }
}

fn dense_records(vectors: &[SparseVector], n_features: usize) -> Array2<f64> {
    let mut records = Array2::zeros((vectors.len(), n_features));
    for (mut row, vector) in records.rows_mut().into_iter().zip(vectors) {
        for &(index, value) in vector.entries() {
            row[index] = value;
        }
    }
    records
}

/// Column of each [`Sentiment::ALL`] class in the fitted linfa model.
fn class_columns(
    fitted: &MultiFittedLogisticRegression<f64, usize>,
) -> Result<[usize; NUM_CLASSES]> {
    let mut columns = [0usize; NUM_CLASSES];
    for (slot, label) in columns.iter_mut().zip(Sentiment::ALL) {
        *slot = fitted
            .classes()
            .iter()
            .position(|&class| class == label.index())
            .ok_or_else(|| {
                PolarityError::invalid_training_set(format!(
                    "fitted model has no column for class {}",
                    label.as_str()
                ))
            })?;
    }
    Ok(columns)
}

/// Objective value and gradient norm of a fitted model on its training set.
fn summarize(
    fitted: &MultiFittedLogisticRegression<f64, usize>,
    columns: &[usize; NUM_CLASSES],
    records: &Array2<f64>,
    labels: &[Sentiment],
    config: &ClassifierConfig,
) -> FitReport {
    // Residuals P - Y, in the model's column order.
    let mut residuals = fitted.predict_probabilities(records);
    let mut loss = 0.0;
    for (mut row, label) in residuals.rows_mut().into_iter().zip(labels) {
        let column = columns[label.index()];
        loss -= row[column].max(f64::MIN_POSITIVE).ln();
        row[column] -= 1.0;
    }

    let params = fitted.params().to_owned();
    loss += params.iter().map(|w| w * w).sum::<f64>() / (2.0 * config.c);

    let mut weight_gradient = records.t().dot(&residuals);
    weight_gradient.scaled_add(1.0 / config.c, &params);
    let bias_gradient = residuals.sum_axis(Axis(0));
    let gradient_norm = weight_gradient
        .iter()
        .chain(bias_gradient.iter())
        .map(|g| g * g)
        .sum::<f64>()
        .sqrt();

    FitReport {
        final_loss: loss,
        gradient_norm,
        converged: gradient_norm <= config.tol,
    }
}

fn scores(
    weights: &[f64],
    bias: &[f64],
    n_features: usize,
    x: &SparseVector,
) -> [f64; NUM_CLASSES] {
    let mut z = [0.0; NUM_CLASSES];
    for (k, score) in z.iter_mut().enumerate() {
        let row = &weights[k * n_features..(k + 1) * n_features];
        *score = x.dot(row) + bias[k];
    }
    z
}

/// Numerically stable softmax.
fn softmax_in_place(z: &mut [f64; NUM_CLASSES]) {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in z.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in z.iter_mut() {
        *v /= sum;
    }
}
