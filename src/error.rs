//! Error types for the Polarity library.
//!
//! All fallible operations return [`Result<T>`], whose error is the
//! [`PolarityError`] enum. The variants mirror the failure classes of the
//! pipeline: data problems in the training corpus, corpora that cannot be
//! fitted, serving before fitting, missing or damaged artifacts, and evaluator
//! misuse. Infrastructure errors (I/O, JSON, CSV, storage) are wrapped so that
//! callers can propagate everything with `?`.
//!
//! # Examples
//!
//! ```
//! use polarity::error::{PolarityError, Result};
//!
//! fn predict_before_fit() -> Result<()> {
//!     Err(PolarityError::not_fitted("vectorizer"))
//! }
//!
//! let err = predict_before_fit().unwrap_err();
//! assert_eq!(err.to_string(), "Not fitted: vectorizer");
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Polarity operations.
#[derive(Error, Debug)]
pub enum PolarityError {
    /// I/O errors (corpus files, artifact files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed training data (missing columns, unreadable rows)
    #[error("Data error: {0}")]
    Data(String),

    /// The corpus cannot produce a vocabulary
    #[error("Not fittable: {0}")]
    NotFittable(String),

    /// The labelled training set cannot train the classifier
    #[error("Invalid training set: {0}")]
    InvalidTrainingSet(String),

    /// A component was used before being fitted or loaded
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// A persisted artifact is missing
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// A persisted artifact exists but cannot be decoded or verified
    #[error("Artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    /// Evaluator inputs differ in length or are empty
    #[error("Length mismatch: {0}")]
    LengthMismatch(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Analysis-related errors (invalid filter patterns, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Invalid configuration values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binary encoding/decoding errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for operations that may fail with PolarityError.
pub type Result<T> = std::result::Result<T, PolarityError>;

impl PolarityError {
    /// Create a new data error.
    pub fn data<S: Into<String>>(msg: S) -> Self {
        PolarityError::Data(msg.into())
    }

    /// Create a new not-fittable error.
    pub fn not_fittable<S: Into<String>>(msg: S) -> Self {
        PolarityError::NotFittable(msg.into())
    }

    /// Create a new invalid-training-set error.
    pub fn invalid_training_set<S: Into<String>>(msg: S) -> Self {
        PolarityError::InvalidTrainingSet(msg.into())
    }

    /// Create a new not-fitted error naming the offending component.
    pub fn not_fitted<S: Into<String>>(component: S) -> Self {
        PolarityError::NotFitted(component.into())
    }

    /// Create a new artifact-not-found error.
    pub fn artifact_not_found<S: Into<String>>(msg: S) -> Self {
        PolarityError::ArtifactNotFound(msg.into())
    }

    /// Create a new artifact-corrupt error.
    pub fn artifact_corrupt<S: Into<String>>(msg: S) -> Self {
        PolarityError::ArtifactCorrupt(msg.into())
    }

    /// Create a new length-mismatch error.
    pub fn length_mismatch<S: Into<String>>(msg: S) -> Self {
        PolarityError::LengthMismatch(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PolarityError::Storage(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        PolarityError::Analysis(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PolarityError::InvalidConfig(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        PolarityError::SerializationError(msg.into())
    }

    /// Prefix the message with the pipeline stage or path it arose in.
    ///
    /// Wrapped infrastructure errors are returned unchanged.
    pub fn with_context<S: AsRef<str>>(self, context: S) -> Self {
        let context = context.as_ref();
        let prefix = |msg: String| format!("{context}: {msg}");
        match self {
            PolarityError::Data(msg) => PolarityError::Data(prefix(msg)),
            PolarityError::NotFittable(msg) => PolarityError::NotFittable(prefix(msg)),
            PolarityError::InvalidTrainingSet(msg) => {
                PolarityError::InvalidTrainingSet(prefix(msg))
            }
            PolarityError::NotFitted(msg) => PolarityError::NotFitted(prefix(msg)),
            PolarityError::ArtifactNotFound(msg) => PolarityError::ArtifactNotFound(prefix(msg)),
            PolarityError::ArtifactCorrupt(msg) => PolarityError::ArtifactCorrupt(prefix(msg)),
            PolarityError::LengthMismatch(msg) => PolarityError::LengthMismatch(prefix(msg)),
            PolarityError::Storage(msg) => PolarityError::Storage(prefix(msg)),
            PolarityError::Analysis(msg) => PolarityError::Analysis(prefix(msg)),
            PolarityError::InvalidConfig(msg) => PolarityError::InvalidConfig(prefix(msg)),
            PolarityError::SerializationError(msg) => {
                PolarityError::SerializationError(prefix(msg))
            }
            other => other,
        }
    }
}
