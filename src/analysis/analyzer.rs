//! Core analyzer trait definition.
//!
//! Analyzers combine char filters, a tokenizer and token filters into one
//! text processing pipeline:
//!
//! ```text
//! Raw Text → Char Filters → Tokenizer → Filter 1 → ... → Filter N → Tokens
//! ```
//!
//! The only implementation shipped is
//! [`PipelineAnalyzer`](pipeline::PipelineAnalyzer); the normalizer and the
//! vectorizer each assemble one.

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for analyzers that convert text into processed tokens.
///
/// The trait requires `Send + Sync` so that a fitted pipeline can serve
/// predictions from many threads at once.
pub trait Analyzer: Send + Sync {
    /// Analyze the given text and return a stream of tokens.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &str;
}

pub mod pipeline;
