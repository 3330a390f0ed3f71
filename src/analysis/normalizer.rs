//! Deterministic text normalization for social-media style text.
//!
//! The [`Normalizer`] is a [`PipelineAnalyzer`] with a fixed chain:
//!
//! ```text
//! strip URLs → strip @mentions → unwrap #hashtags → lowercase
//!   → decode HTML entities → drop non-alphanumerics
//!   → split on whitespace → (optional) drop stop words
//! ```
//!
//! Tokens are rejoined with single spaces. The result is a pure function of
//! the input: no state survives between calls. Empty input, or input with
//! nothing left after cleaning, yields the empty string, which downstream
//! components treat as "no signal".
//!
//! # Examples
//!
//! ```
//! use polarity::analysis::normalizer::Normalizer;
//!
//! let normalizer = Normalizer::default();
//! assert_eq!(
//!     normalizer.normalize("Check http://a.co/x out! #Great @friend"),
//!     "check great"
//! );
//! assert_eq!(normalizer.normalize(""), "");
//! ```

use std::sync::{Arc, LazyLock};

use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::char_filter::html_entity::HtmlEntityCharFilter;
use crate::analysis::char_filter::lowercase::LowercaseCharFilter;
use crate::analysis::char_filter::pattern_replace::PatternReplaceCharFilter;
use crate::analysis::token_filter::Filter;
use crate::analysis::token_filter::stop::StopFilter;
use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use crate::error::Result;

const URL_PATTERN: &str = r"https?://\S+|www\.\S+";
const MENTION_PATTERN: &str = r"@\w+";
const HASHTAG_PATTERN: &str = r"#(\w+)";
const NON_ALPHANUMERIC_PATTERN: &str = r"[^a-zA-Z0-9\s]";

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(|| {
    Normalizer::new(NormalizerConfig::default()).expect("built-in normalizer patterns are valid")
});

/// Normalizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Drop stop words after tokenization.
    pub remove_stop_words: bool,
    /// Custom stop word list; `None` selects the built-in English list.
    pub stop_words: Option<Vec<String>>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            remove_stop_words: true,
            stop_words: None,
        }
    }
}

/// Text normalizer: cleans raw text into space-separated lowercase tokens.
#[derive(Clone)]
pub struct Normalizer {
    analyzer: PipelineAnalyzer,
    stop_filter: Arc<StopFilter>,
    config: NormalizerConfig,
}

impl Normalizer {
    /// Build a normalizer from its configuration.
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        let analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_char_filter(Arc::new(
                PatternReplaceCharFilter::remove(URL_PATTERN)?.with_name("url"),
            ))
            .add_char_filter(Arc::new(
                PatternReplaceCharFilter::remove(MENTION_PATTERN)?.with_name("mention"),
            ))
            .add_char_filter(Arc::new(
                PatternReplaceCharFilter::new(HASHTAG_PATTERN, "$1")?.with_name("hashtag"),
            ))
            .add_char_filter(Arc::new(LowercaseCharFilter::new()))
            .add_char_filter(Arc::new(HtmlEntityCharFilter::new()?))
            .add_char_filter(Arc::new(
                PatternReplaceCharFilter::remove(NON_ALPHANUMERIC_PATTERN)?
                    .with_name("non_alphanumeric"),
            ))
            .with_name("normalizer");

        let stop_filter = match &config.stop_words {
            Some(words) => StopFilter::with_stop_words(words.iter().cloned().collect()),
            None => StopFilter::new(),
        };

        Ok(Self {
            analyzer,
            stop_filter: Arc::new(stop_filter),
            config,
        })
    }

    /// Get the configuration this normalizer was built from.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize `text` using the configured stop-word setting.
    pub fn normalize(&self, text: &str) -> String {
        self.normalize_with(text, self.config.remove_stop_words)
    }

    /// Normalize `text`, overriding the stop-word setting for this call.
    pub fn normalize_with(&self, text: &str, remove_stop_words: bool) -> String {
        self.tokens_with(text, remove_stop_words).join(" ")
    }

    /// Normalize a value that may be absent; `None` yields the empty string.
    pub fn normalize_opt(&self, text: Option<&str>) -> String {
        text.map(|t| self.normalize(t)).unwrap_or_default()
    }

    /// Normalize `text` and return the individual tokens.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.tokens_with(text, self.config.remove_stop_words)
    }

    /// Normalize many texts in parallel, preserving input order.
    pub fn batch_normalize<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<String> {
        texts.par_iter().map(|t| self.normalize(t.as_ref())).collect()
    }

    fn tokens_with(&self, text: &str, remove_stop_words: bool) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        match self.run(text, remove_stop_words) {
            Ok(tokens) => tokens,
            Err(e) => {
                // An analysis error degrades to "no signal".
                warn!("normalization failed, treating input as empty: {e}");
                Vec::new()
            }
        }
    }

    fn run(&self, text: &str, remove_stop_words: bool) -> Result<Vec<String>> {
        let mut tokens = self.analyzer.analyze(text)?;
        if remove_stop_words {
            tokens = self.stop_filter.filter(tokens)?;
        }
        Ok(tokens.map(|token| token.text).collect())
    }

    /// Whether `word` is in this normalizer's stop word set.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_filter.is_stop_word(word)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        DEFAULT_NORMALIZER.clone()
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("analyzer", &self.analyzer)
            .field("stop_words", &self.stop_filter.len())
            .field("remove_stop_words", &self.config.remove_stop_words)
            .finish()
    }
}

/// Normalize `text` with the default configuration.
pub fn normalize(text: &str) -> String {
    DEFAULT_NORMALIZER.normalize(text)
}
