//! Serving predictions from a fitted artifact set.
//!
//! A [`Predictor`] owns one loaded [`ArtifactSet`] and never refits it. All
//! state is immutable after construction, so one predictor can be shared
//! across threads and [`Predictor::predict_batch`] fans out with rayon.
//!
//! Text that carries no signal is never an error. If normalization leaves
//! nothing, the predictor answers `{neutral, 0.0}` without touching the
//! vectorizer or classifier. The same answer is given by default when the
//! normalized text shares no term with the vocabulary.

use std::path::Path;
use std::sync::Arc;

use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::normalizer::Normalizer;
use crate::error::{PolarityError, Result};
use crate::ml::label::Sentiment;
use crate::ml::logistic::ClassProbabilities;
use crate::pipeline::artifact::ArtifactSet;
use crate::storage::Storage;
use crate::storage::file::{FileStorage, FileStorageConfig};

/// Serving policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Answer `{neutral, 0.0}` for text with no known term instead of the
    /// classifier's bias-only guess.
    pub unknown_terms_as_neutral: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            unknown_terms_as_neutral: true,
        }
    }
}

/// Label and confidence for one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted sentiment.
    pub label: Sentiment,
    /// Probability of `label`, in `[0, 1]`.
    pub confidence: f64,
}

impl PredictionResult {
    /// Answer for text that carries no signal.
    pub const NO_SIGNAL: PredictionResult = PredictionResult {
        label: Sentiment::Neutral,
        confidence: 0.0,
    };

    /// Whether this is the no-signal answer.
    pub fn is_no_signal(&self) -> bool {
        *self == Self::NO_SIGNAL
    }
}

/// Read-only inference over a loaded artifact set.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifacts: Arc<ArtifactSet>,
    normalizer: Normalizer,
    config: PredictorConfig,
}

impl Predictor {
    /// Wrap an in-memory artifact set.
    pub fn from_artifacts(artifacts: ArtifactSet, config: PredictorConfig) -> Result<Self> {
        let normalizer = Normalizer::new(artifacts.normalizer_config().clone())?;
        Ok(Predictor {
            artifacts: Arc::new(artifacts),
            normalizer,
            config,
        })
    }

    /// Load the artifact set in `storage` with the default policy.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        Self::load_with_config(storage, PredictorConfig::default())
    }

    /// Load the artifact set in `storage`.
    pub fn load_with_config(storage: &dyn Storage, config: PredictorConfig) -> Result<Self> {
        Self::from_artifacts(ArtifactSet::load(storage)?, config)
    }

    /// Load the artifact set stored in `directory`.
    ///
    /// A missing directory is reported as `ArtifactNotFound` and is not
    /// created.
    pub fn open<P: AsRef<Path>>(directory: P, config: PredictorConfig) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(PolarityError::artifact_not_found(format!(
                "artifact directory {} does not exist",
                directory.display()
            )));
        }
        let storage = FileStorage::new(FileStorageConfig::new(directory))?;
        Self::load_with_config(&storage, config)
    }

    /// The loaded artifact set.
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// The serving policy.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predict the sentiment of `text`.
    pub fn predict_single(&self, text: &str) -> PredictionResult {
        match self.predict_proba(text) {
            Some(probabilities) => {
                let (label, confidence) = probabilities.argmax();
                PredictionResult { label, confidence }
            }
            None => PredictionResult::NO_SIGNAL,
        }
    }

    /// Predict a value that may be absent; `None` gets the no-signal answer.
    pub fn predict_optional(&self, text: Option<&str>) -> PredictionResult {
        text.map_or(PredictionResult::NO_SIGNAL, |t| self.predict_single(t))
    }

    /// Predict many texts in parallel, preserving input order.
    pub fn predict_batch<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<PredictionResult> {
        texts
            .par_iter()
            .map(|text| self.predict_single(text.as_ref()))
            .collect()
    }

    /// Full class distribution for `text`, or `None` when the text carries
    /// no signal.
    pub fn predict_proba(&self, text: &str) -> Option<ClassProbabilities> {
        let normalized = self.normalizer.normalize(text);
        if normalized.is_empty() {
            return None;
        }

        let vector = match self.artifacts.vectorizer().transform(&normalized) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("vectorization failed, answering no signal: {e}");
                return None;
            }
        };
        if vector.is_zero() && self.config.unknown_terms_as_neutral {
            return None;
        }

        match self.artifacts.classifier().predict_proba(&vector) {
            Ok(probabilities) => Some(probabilities),
            Err(e) => {
                warn!("classification failed, answering no signal: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::PipelineConfig;
    use crate::pipeline::corpus::RawSample;
    use crate::pipeline::trainer::Trainer;
    use crate::storage::memory::MemoryStorage;

    fn samples() -> Vec<RawSample> {
        let rows = [
            ("love great crew", Sentiment::Positive),
            ("love great service", Sentiment::Positive),
            ("love great seats", Sentiment::Positive),
            ("terrible delayed flight", Sentiment::Negative),
            ("terrible delayed bags", Sentiment::Negative),
            ("terrible delayed again", Sentiment::Negative),
            ("gate noon today", Sentiment::Neutral),
            ("gate noon tomorrow", Sentiment::Neutral),
            ("gate noon friday", Sentiment::Neutral),
        ];
        rows.iter().map(|(text, label)| RawSample::new(*text, *label)).collect()
    }

    fn predictor(config: PredictorConfig) -> Predictor {
        let mut trainer = Trainer::new(PipelineConfig::default()).unwrap();
        trainer.fit_samples(samples()).unwrap();
        Predictor::from_artifacts(trainer.artifacts().unwrap().clone(), config).unwrap()
    }

    #[test]
    fn test_known_text() {
        let predictor = predictor(PredictorConfig::default());

        let result = predictor.predict_single("Love it, GREAT!");
        assert_eq!(result.label, Sentiment::Positive);
        assert!(result.confidence > 1.0 / 3.0 && result.confidence <= 1.0);

        let probabilities = predictor.predict_proba("terrible, delayed").unwrap();
        assert!((probabilities.total() - 1.0).abs() < 1e-9);
        assert_eq!(probabilities.argmax().0, Sentiment::Negative);
        assert_eq!(
            predictor.predict_single("terrible, delayed").confidence,
            probabilities.get(Sentiment::Negative)
        );
    }

    #[test]
    fn test_no_signal_inputs() {
        let predictor = predictor(PredictorConfig::default());

        assert!(predictor.predict_single("").is_no_signal());
        assert!(predictor.predict_single("   ").is_no_signal());
        assert!(predictor.predict_single("@united http://t.co/x !!!").is_no_signal());
        assert!(predictor.predict_single("the and of").is_no_signal());
        assert!(predictor.predict_optional(None).is_no_signal());
        assert!(predictor.predict_proba("").is_none());
    }

    #[test]
    fn test_unknown_terms_policy() {
        let neutral = predictor(PredictorConfig::default());
        assert!(neutral.predict_single("zebra xylophone").is_no_signal());

        let biased = predictor(PredictorConfig {
            unknown_terms_as_neutral: false,
        });
        let result = biased.predict_single("zebra xylophone");
        assert!(result.confidence > 0.0);
        assert!(!result.is_no_signal());
    }

    #[test]
    fn test_batch_preserves_order() {
        let predictor = predictor(PredictorConfig::default());
        let texts = ["love great", "", "terrible delayed", "gate noon", "quit"];

        let batch = predictor.predict_batch(&texts);
        let singles: Vec<_> = texts.iter().map(|t| predictor.predict_single(t)).collect();
        assert_eq!(batch, singles);
        assert!(batch[1].is_no_signal());
        assert!(batch[4].is_no_signal());
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Predictor>();

        let predictor = predictor(PredictorConfig::default());
        let expected = predictor.predict_single("love great crew");
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| assert_eq!(predictor.predict_single("love great crew"), expected));
            }
        });
    }

    #[test]
    fn test_load_from_storage() {
        let mut trainer = Trainer::new(PipelineConfig::default()).unwrap();
        trainer.fit_samples(samples()).unwrap();
        let storage = MemoryStorage::default();
        trainer.save(&storage).unwrap();

        let loaded = Predictor::load(&storage).unwrap();
        let in_memory = trainer.predictor().unwrap();
        for text in ["love great", "terrible delayed bags", "gate noon", ""] {
            assert_eq!(loaded.predict_single(text), in_memory.predict_single(text));
        }
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("model");
        assert!(matches!(
            Predictor::open(&missing, PredictorConfig::default()),
            Err(PolarityError::ArtifactNotFound(_))
        ));
        assert!(!missing.exists());

        assert!(matches!(
            Predictor::open(dir.path(), PredictorConfig::default()),
            Err(PolarityError::ArtifactNotFound(_))
        ));
    }
}
