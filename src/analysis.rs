//! Text analysis module for Polarity.
//!
//! This module provides the text processing building blocks (char filters,
//! tokenizers, token filters and the analyzers combining them) and the
//! [`Normalizer`](normalizer::Normalizer) built from them.

pub mod analyzer;
pub mod char_filter;
pub mod normalizer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
