//! Machine learning components of the sentiment pipeline.
//!
//! - [`label`]: the closed three-way [`Sentiment`](label::Sentiment) label set
//!   and its fixed class ordering.
//! - [`vector`]: sparse feature vectors.
//! - [`tfidf`]: the TF-IDF vectorizer over word n-grams.
//! - [`logistic`]: multinomial logistic regression, fitted with `linfa-logistic`.
//! - [`metrics`]: accuracy, weighted precision/recall/F1 and confusion matrix.

pub mod label;
pub mod logistic;
pub mod metrics;
pub mod tfidf;
pub mod vector;
