//! TF-IDF vectorizer for text feature extraction.
//!
//! The vectorizer is fitted once on a corpus of normalized documents. Fitting
//! freezes a vocabulary of unigram/bigram terms and their inverse document
//! frequencies; afterwards [`TfIdfVectorizer::transform`] maps any text into
//! the same feature space without touching that state, so a fitted
//! vectorizer can be shared between threads.
//!
//! # Examples
//!
//! ```
//! use polarity::ml::tfidf::{TfIdfVectorizer, VectorizerConfig};
//!
//! let config = VectorizerConfig {
//!     min_doc_freq: 1,
//!     max_doc_freq: 1.0,
//!     ..VectorizerConfig::default()
//! };
//! let mut vectorizer = TfIdfVectorizer::new(config).unwrap();
//! vectorizer.fit(&["great flight", "late flight"]).unwrap();
//!
//! assert!(vectorizer.index_of("great flight").is_some());
//! let features = vectorizer.transform("great crew").unwrap();
//! assert!((features.norm() - 1.0).abs() < 1e-9);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token_filter::length::LengthFilter;
use crate::analysis::token_filter::stop::StopFilter;
use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use crate::error::{PolarityError, Result};
use crate::ml::vector::SparseVector;

/// Vectorizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Maximum vocabulary size; the most frequent terms are kept.
    pub max_features: usize,
    /// Inclusive range of n-gram lengths.
    pub ngram_range: (usize, usize),
    /// Minimum number of documents a term must occur in.
    pub min_doc_freq: usize,
    /// Maximum fraction of documents a term may occur in.
    pub max_doc_freq: f64,
    /// Tokens shorter than this many characters are ignored.
    pub min_token_len: usize,
    /// Extra stop words removed before n-grams are built, on top of
    /// whatever the normalizer already dropped.
    pub stop_words: Option<Vec<String>>,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            ngram_range: (1, 2),
            min_doc_freq: 2,
            max_doc_freq: 0.8,
            min_token_len: 2,
            stop_words: None,
        }
    }
}

impl VectorizerConfig {
    /// Check that the settings describe a usable vectorizer.
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(PolarityError::invalid_config(
                "vectorizer.max_features must be positive",
            ));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(PolarityError::invalid_config(format!(
                "vectorizer.ngram_range ({min_n}, {max_n}) is not a valid range"
            )));
        }
        if !(self.max_doc_freq > 0.0 && self.max_doc_freq <= 1.0) {
            return Err(PolarityError::invalid_config(format!(
                "vectorizer.max_doc_freq {} must lie in (0, 1]",
                self.max_doc_freq
            )));
        }
        Ok(())
    }
}

/// TF-IDF vectorizer over word n-grams.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "VectorizerState", into = "VectorizerState")]
pub struct TfIdfVectorizer {
    config: VectorizerConfig,
    /// Term -> feature index.
    vocabulary: HashMap<String, usize>,
    /// Terms in feature index order.
    terms: Vec<String>,
    /// Inverse document frequency per feature index.
    idf: Vec<f64>,
    /// Number of documents seen during fitting.
    n_documents: usize,
    analyzer: Arc<PipelineAnalyzer>,
}

/// Persisted form of a [`TfIdfVectorizer`].
#[derive(Serialize, Deserialize)]
struct VectorizerState {
    config: VectorizerConfig,
    n_documents: usize,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl From<TfIdfVectorizer> for VectorizerState {
    fn from(vectorizer: TfIdfVectorizer) -> Self {
        VectorizerState {
            config: vectorizer.config,
            n_documents: vectorizer.n_documents,
            terms: vectorizer.terms,
            idf: vectorizer.idf,
        }
    }
}

impl TryFrom<VectorizerState> for TfIdfVectorizer {
    type Error = PolarityError;

    fn try_from(state: VectorizerState) -> Result<Self> {
        if state.terms.len() != state.idf.len() {
            return Err(PolarityError::serialization(format!(
                "vectorizer state has {} terms but {} idf weights",
                state.terms.len(),
                state.idf.len()
            )));
        }
        let mut vectorizer = TfIdfVectorizer::new(state.config)?;
        vectorizer.vocabulary = index_terms(&state.terms);
        if vectorizer.vocabulary.len() != state.terms.len() {
            return Err(PolarityError::serialization(
                "vectorizer state contains duplicate terms",
            ));
        }
        vectorizer.terms = state.terms;
        vectorizer.idf = state.idf;
        vectorizer.n_documents = state.n_documents;
        Ok(vectorizer)
    }
}

impl std::fmt::Debug for TfIdfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfIdfVectorizer")
            .field("vocabulary_size", &self.vocabulary.len())
            .field("n_documents", &self.n_documents)
            .field("ngram_range", &self.config.ngram_range)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

/// Per-term statistics gathered while fitting.
#[derive(Default)]
struct TermStats {
    doc_freq: usize,
    total_freq: usize,
}

impl TfIdfVectorizer {
    /// Create an unfitted vectorizer.
    pub fn new(config: VectorizerConfig) -> Result<Self> {
        config.validate()?;
        let mut analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(LengthFilter::min(config.min_token_len)));
        if let Some(words) = &config.stop_words {
            analyzer = analyzer.add_filter(Arc::new(StopFilter::from_words(words.iter().cloned())));
        }
        let analyzer = analyzer.with_name("tfidf_terms");

        Ok(Self {
            config,
            vocabulary: HashMap::new(),
            terms: Vec::new(),
            idf: Vec::new(),
            n_documents: 0,
            analyzer: Arc::new(analyzer),
        })
    }

    /// Get the vectorizer configuration.
    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    /// Fit the vectorizer on normalized training documents.
    ///
    /// Replaces any previously fitted state.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        if documents.is_empty() {
            return Err(PolarityError::not_fittable("training corpus is empty"));
        }

        let n_documents = documents.len();
        let max_count = self.config.max_doc_freq * n_documents as f64;
        if max_count < self.config.min_doc_freq as f64 {
            return Err(PolarityError::not_fittable(format!(
                "max_doc_freq {} of {} documents admits fewer documents than min_doc_freq {}",
                self.config.max_doc_freq, n_documents, self.config.min_doc_freq
            )));
        }

        let mut stats: AHashMap<String, TermStats> = AHashMap::new();
        for document in documents {
            let terms = self.extract_terms(document.as_ref())?;
            let mut seen: AHashSet<&str> = AHashSet::with_capacity(terms.len());
            for term in &terms {
                let first = seen.insert(term.as_str());
                let entry = stats.entry(term.clone()).or_default();
                entry.total_freq += 1;
                if first {
                    entry.doc_freq += 1;
                }
            }
        }
        let candidates = stats.len();

        let mut qualifying: Vec<(String, TermStats)> = stats
            .into_iter()
            .filter(|(_, s)| {
                s.doc_freq >= self.config.min_doc_freq && (s.doc_freq as f64) <= max_count
            })
            .collect();

        // Most frequent first; lexical order makes ties deterministic.
        qualifying.sort_by(|(term_a, a), (term_b, b)| match b.total_freq.cmp(&a.total_freq) {
            Ordering::Equal => term_a.cmp(term_b),
            other => other,
        });
        qualifying.truncate(self.config.max_features);
        qualifying.sort_by(|(a, _), (b, _)| a.cmp(b));

        if qualifying.is_empty() {
            return Err(PolarityError::not_fittable(format!(
                "no term of {candidates} candidates satisfies the document frequency bounds"
            )));
        }

        let n = n_documents as f64;
        let mut terms = Vec::with_capacity(qualifying.len());
        let mut idf = Vec::with_capacity(qualifying.len());
        for (term, s) in qualifying {
            // IDF = ln((N + 1) / (df + 1)) + 1
            idf.push(((n + 1.0) / (s.doc_freq as f64 + 1.0)).ln() + 1.0);
            terms.push(term);
        }

        debug!(
            "vectorizer fitted on {} documents: {} candidate terms, {} retained",
            n_documents,
            candidates,
            terms.len()
        );

        self.vocabulary = index_terms(&terms);
        self.terms = terms;
        self.idf = idf;
        self.n_documents = n_documents;
        Ok(())
    }

    /// Transform a document into an L2-normalized TF-IDF vector.
    ///
    /// Terms outside the vocabulary contribute nothing; a document without
    /// any known term yields the all-zero vector.
    pub fn transform(&self, document: &str) -> Result<SparseVector> {
        if !self.is_fitted() {
            return Err(PolarityError::not_fitted("vectorizer"));
        }

        let mut counts: AHashMap<usize, f64> = AHashMap::new();
        for term in self.extract_terms(document)? {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let entries = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let mut vector = SparseVector::from_entries(self.terms.len(), entries)?;
        vector.normalize();
        Ok(vector)
    }

    /// Transform many documents in parallel, preserving order.
    pub fn transform_batch<S: AsRef<str> + Sync>(
        &self,
        documents: &[S],
    ) -> Result<Vec<SparseVector>> {
        documents
            .par_iter()
            .map(|document| self.transform(document.as_ref()))
            .collect()
    }

    /// Fit on `documents`, then transform them.
    pub fn fit_transform<S: AsRef<str> + Sync>(
        &mut self,
        documents: &[S],
    ) -> Result<Vec<SparseVector>> {
        self.fit(documents)?;
        self.transform_batch(documents)
    }

    /// Whether the vectorizer has been fitted.
    pub fn is_fitted(&self) -> bool {
        !self.terms.is_empty()
    }

    /// Get the size of the vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    /// Feature index of `term`, if it is in the vocabulary.
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    /// Vocabulary terms in feature index order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Inverse document frequency of feature `index`.
    pub fn idf(&self, index: usize) -> Option<f64> {
        self.idf.get(index).copied()
    }

    /// Number of documents the vectorizer was fitted on.
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Extract the unigram..n-gram terms of a document.
    fn extract_terms(&self, document: &str) -> Result<Vec<String>> {
        let tokens: Vec<String> = self.analyzer.analyze(document)?.map(|t| t.text).collect();
        let (min_n, max_n) = self.config.ngram_range;

        let mut terms = Vec::new();
        for n in min_n..=max_n.min(tokens.len()) {
            terms.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        Ok(terms)
    }
}

fn index_terms(terms: &[String]) -> HashMap<String, usize> {
    terms
        .iter()
        .enumerate()
        .map(|(index, term)| (term.clone(), index))
        .collect()
}
