//! Whitespace tokenizer implementation.

use super::Tokenizer;

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// A tokenizer that splits text on runs of whitespace.
///
/// Leading and trailing whitespace never produce tokens, so joining the
/// output with single spaces collapses and trims the input.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    /// Create a new whitespace tokenizer.
    pub fn new() -> Self {
        WhitespaceTokenizer
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;

        for (offset, ch) in text.char_indices() {
            match (ch.is_whitespace(), start) {
                (true, Some(begin)) => {
                    tokens.push(Token::with_offsets(
                        &text[begin..offset],
                        tokens.len(),
                        begin,
                        offset,
                    ));
                    start = None;
                }
                (false, None) => start = Some(offset),
                _ => {}
            }
        }

        if let Some(begin) = start {
            tokens.push(Token::with_offsets(
                &text[begin..],
                tokens.len(),
                begin,
                text.len(),
            ));
        }

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}
