//! Pipeline configuration.
//!
//! Every knob of the pipeline lives in one [`PipelineConfig`]. All fields
//! default, so a JSON file only needs the settings it changes:
//!
//! ```
//! use polarity::pipeline::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(
//!     r#"{"vectorizer": {"max_features": 100}, "split": {"seed": 7}}"#,
//! ).unwrap();
//! assert_eq!(config.vectorizer.max_features, 100);
//! assert_eq!(config.split.seed, 7);
//! assert_eq!(config.split.test_fraction, 0.2);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::normalizer::NormalizerConfig;
use crate::error::{PolarityError, Result};
use crate::ml::logistic::ClassifierConfig;
use crate::ml::tfidf::VectorizerConfig;
use crate::pipeline::corpus::CorpusConfig;
use crate::pipeline::predictor::PredictorConfig;
use crate::pipeline::split::SplitConfig;

/// Configuration of a full training run and of the predictors it produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Text cleaning.
    pub normalizer: NormalizerConfig,
    /// Feature extraction.
    pub vectorizer: VectorizerConfig,
    /// Model fitting.
    pub classifier: ClassifierConfig,
    /// Train/test partitioning.
    pub split: SplitConfig,
    /// Corpus column names.
    pub corpus: CorpusConfig,
    /// Serving policy.
    pub predictor: PredictorConfig,
}

impl PipelineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PolarityError::invalid_config(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&json).map_err(|e| match e {
            PolarityError::Json(e) => {
                PolarityError::invalid_config(format!("{}: {e}", path.display()))
            }
            other => other,
        })
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.vectorizer.validate()?;
        self.classifier.validate()?;
        self.split.validate()?;
        self.corpus.validate()?;
        Ok(())
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
