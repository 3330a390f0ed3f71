//! # Polarity
//!
//! Three-class sentiment classification for short social-media text.
//!
//! ## Features
//!
//! - Tweet-aware text normalization (mentions, URLs, punctuation, stop words)
//! - TF-IDF features over unigrams and bigrams
//! - Multinomial logistic regression fitted with `linfa-logistic`
//! - Stratified evaluation with a classification report
//! - Checksummed, versioned artifacts behind a pluggable storage backend
//! - Thread-safe batch prediction

pub mod analysis;
pub mod cli;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod storage;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
