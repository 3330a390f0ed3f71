//! Training and serving pipeline.
//!
//! ```text
//! corpus (CSV/JSON) → RawSample → stratified split → Normalizer
//!   → TfIdfVectorizer::fit (train only) → LogisticRegression::fit
//!   → metrics on the held-out partition → ArtifactSet → Storage
//! ```
//!
//! The [`Trainer`](trainer::Trainer) is the only writer of artifacts and the
//! [`Predictor`](predictor::Predictor) the only reader. A predictor owns its
//! loaded [`ArtifactSet`](artifact::ArtifactSet); several predictors with
//! different artifacts can live in one process.
//!
//! # Example
//!
//! ```
//! use polarity::ml::label::Sentiment;
//! use polarity::pipeline::config::PipelineConfig;
//! use polarity::pipeline::corpus::RawSample;
//! use polarity::pipeline::predictor::Predictor;
//! use polarity::pipeline::trainer::Trainer;
//! use polarity::storage::memory::MemoryStorage;
//!
//! # fn main() -> polarity::error::Result<()> {
//! let rows = [
//!     ("love great crew", Sentiment::Positive),
//!     ("love great service", Sentiment::Positive),
//!     ("love great seats", Sentiment::Positive),
//!     ("terrible delayed flight", Sentiment::Negative),
//!     ("terrible delayed bags", Sentiment::Negative),
//!     ("terrible delayed again", Sentiment::Negative),
//!     ("gate noon today", Sentiment::Neutral),
//!     ("gate noon tomorrow", Sentiment::Neutral),
//!     ("gate noon friday", Sentiment::Neutral),
//! ];
//! let samples: Vec<RawSample> = rows.iter().map(|(t, l)| RawSample::new(*t, *l)).collect();
//!
//! let mut trainer = Trainer::new(PipelineConfig::default())?;
//! trainer.fit_samples(samples)?;
//!
//! let storage = MemoryStorage::default();
//! trainer.save(&storage)?;
//!
//! let predictor = Predictor::load(&storage)?;
//! assert_eq!(predictor.predict_single("").label, Sentiment::Neutral);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod corpus;
pub mod predictor;
pub mod split;
pub mod trainer;

pub use artifact::{ArtifactManifest, ArtifactSet};
pub use config::PipelineConfig;
pub use predictor::{PredictionResult, Predictor};
pub use trainer::{Trainer, TrainingReport, full_pipeline};
