//! Training orchestration.
//!
//! A [`Trainer`] runs one batch fit:
//!
//! 1. load the corpus and check that every class has at least two samples
//! 2. split it into stratified train/test partitions
//! 3. normalize every text
//! 4. fit the vectorizer on the training partition only
//! 5. fit the classifier on the training vectors
//! 6. evaluate on the held-out partition
//!
//! The result is an [`ArtifactSet`] held by the trainer until
//! [`Trainer::save`] writes it. Any failing stage aborts the run with an error
//! naming the stage.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::normalizer::Normalizer;
use crate::error::{PolarityError, Result};
use crate::ml::label::Sentiment;
use crate::ml::logistic::{FitReport, LogisticRegression};
use crate::ml::metrics::{self, Metrics};
use crate::ml::tfidf::TfIdfVectorizer;
use crate::pipeline::artifact::{ArtifactManifest, ArtifactSet};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::corpus::{self, Corpus, CorpusStats, RawSample};
use crate::pipeline::predictor::Predictor;
use crate::pipeline::split::stratified_split;
use crate::storage::Storage;

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// What the corpus loader kept and skipped.
    pub corpus: CorpusStats,
    /// Training partition size.
    pub train_size: usize,
    /// Held-out partition size.
    pub test_size: usize,
    /// Number of features learned.
    pub vocabulary_size: usize,
    /// Optimizer outcome.
    pub fit: FitReport,
    /// Held-out evaluation.
    pub metrics: Metrics,
}

impl TrainingReport {
    /// Per-class precision/recall/F1 table of the held-out evaluation.
    pub fn classification_report(&self) -> String {
        self.metrics.classification_report()
    }
}

/// Runs the training pipeline and holds its result.
#[derive(Debug)]
pub struct Trainer {
    config: PipelineConfig,
    normalizer: Normalizer,
    artifacts: Option<ArtifactSet>,
    report: Option<TrainingReport>,
}

impl Trainer {
    /// Create a trainer, validating `config`.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = Normalizer::new(config.normalizer.clone())?;
        Ok(Trainer {
            config,
            normalizer,
            artifacts: None,
            report: None,
        })
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train on samples already in memory.
    pub fn fit_samples(&mut self, samples: Vec<RawSample>) -> Result<TrainingReport> {
        self.fit_corpus(Corpus::from_samples(samples))
    }

    /// Train on a CSV or JSON corpus file.
    pub fn fit_path<P: AsRef<Path>>(&mut self, path: P) -> Result<TrainingReport> {
        let corpus = corpus::load(path, &self.config.corpus)?;
        self.fit_corpus(corpus)
    }

    /// Train on a loaded corpus, replacing any previous result.
    pub fn fit_corpus(&mut self, corpus: Corpus) -> Result<TrainingReport> {
        let (samples, stats) = corpus.into_parts();
        check_class_coverage(&stats)?;

        let labels: Vec<Sentiment> = samples.iter().map(|s| s.label).collect();
        let split = stratified_split(&labels, &self.config.split)
            .map_err(|e| e.with_context("stratified split"))?;
        info!(
            "split {} samples into {} train and {} test",
            samples.len(),
            split.train.len(),
            split.test.len()
        );

        let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        let normalized = self.normalizer.batch_normalize(&texts);
        let train_docs: Vec<&str> = split.train.iter().map(|&i| normalized[i].as_str()).collect();
        let test_docs: Vec<&str> = split.test.iter().map(|&i| normalized[i].as_str()).collect();
        let train_labels: Vec<Sentiment> = split.train.iter().map(|&i| labels[i]).collect();
        let test_labels: Vec<Sentiment> = split.test.iter().map(|&i| labels[i]).collect();

        let mut vectorizer = TfIdfVectorizer::new(self.config.vectorizer.clone())?;
        let train_vectors = vectorizer
            .fit_transform(&train_docs)
            .map_err(|e| e.with_context("vectorizer fit"))?;
        let test_vectors = vectorizer
            .transform_batch(&test_docs)
            .map_err(|e| e.with_context("vectorizer transform"))?;
        info!(
            "vocabulary of {} terms from {} training documents",
            vectorizer.vocabulary_size(),
            train_docs.len()
        );

        let mut classifier = LogisticRegression::new(self.config.classifier.clone())?;
        let fit = classifier
            .fit(&train_vectors, &train_labels)
            .map_err(|e| e.with_context("classifier fit"))?;

        let predicted = test_vectors
            .iter()
            .map(|vector| classifier.predict(vector).map(|(label, _)| label))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.with_context("evaluation"))?;
        let metrics = metrics::compute(&predicted, &test_labels)
            .map_err(|e| e.with_context("evaluation"))?;
        info!(
            "held-out accuracy {:.4}, weighted precision {:.4}, recall {:.4}, F1 {:.4}",
            metrics.accuracy, metrics.precision, metrics.recall, metrics.f1
        );

        let report = TrainingReport {
            corpus: stats,
            train_size: split.train.len(),
            test_size: split.test.len(),
            vocabulary_size: vectorizer.vocabulary_size(),
            fit,
            metrics: metrics.clone(),
        };
        let artifacts = ArtifactSet::new(self.config.normalizer.clone(), vectorizer, classifier)?
            .with_metrics(metrics);

        self.artifacts = Some(artifacts);
        self.report = Some(report.clone());
        Ok(report)
    }

    /// The fitted artifact set of the last successful run.
    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.artifacts.as_ref()
    }

    /// The report of the last successful run.
    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }

    /// Persist the fitted artifact set.
    pub fn save(&self, storage: &dyn Storage) -> Result<ArtifactManifest> {
        self.fitted()?
            .save(storage)
            .map_err(|e| e.with_context(format!("saving artifacts to {}", storage.location())))
    }

    /// A predictor serving the fitted artifact set, without a storage round trip.
    pub fn predictor(&self) -> Result<Predictor> {
        Predictor::from_artifacts(self.fitted()?.clone(), self.config.predictor.clone())
    }

    fn fitted(&self) -> Result<&ArtifactSet> {
        self.artifacts
            .as_ref()
            .ok_or_else(|| PolarityError::not_fitted("trainer has not completed a run"))
    }
}

/// Every class needs two samples: one for each side of the split.
fn check_class_coverage(stats: &CorpusStats) -> Result<()> {
    let missing: Vec<&str> = Sentiment::ALL
        .iter()
        .filter(|label| stats.count(**label) == 0)
        .map(|label| label.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(PolarityError::invalid_training_set(format!(
            "corpus has no {} samples ({} loaded)",
            missing.join("/"),
            stats.loaded
        )));
    }

    if let Some(label) = Sentiment::ALL.iter().find(|label| stats.count(**label) < 2) {
        return Err(PolarityError::invalid_training_set(format!(
            "corpus has a single {} sample, at least 2 per class are needed",
            label.as_str()
        )));
    }
    Ok(())
}

/// Load `data_path`, train with `config` and save the artifacts to `storage`.
pub fn full_pipeline<P: AsRef<Path>>(
    data_path: P,
    storage: &dyn Storage,
    config: PipelineConfig,
) -> Result<TrainingReport> {
    let mut trainer = Trainer::new(config)?;
    let report = trainer.fit_path(data_path)?;
    trainer.save(storage)?;
    Ok(report)
}
