//! Length filter implementation.
//!
//! Drops tokens whose character count falls outside a range. The vectorizer
//! uses it to ignore single-character tokens.
//!
//! # Examples
//!
//! ```
//! use polarity::analysis::token_filter::Filter;
//! use polarity::analysis::token_filter::length::LengthFilter;
//! use polarity::analysis::token::Token;
//!
//! let filter = LengthFilter::min(2);
//! let tokens = vec![Token::new("a", 0), Token::new("plane", 1)];
//! let result: Vec<_> = filter.filter(Box::new(tokens.into_iter()))
//!     .unwrap()
//!     .collect();
//!
//! assert_eq!(result.len(), 1);
//! assert_eq!(result[0].text, "plane");
//! ```

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// A filter that keeps tokens whose length (in chars) lies in `[min, max]`.
#[derive(Clone, Debug)]
pub struct LengthFilter {
    min: usize,
    max: usize,
}

impl LengthFilter {
    /// Create a filter keeping tokens of `min..=max` characters.
    pub fn new(min: usize, max: usize) -> Self {
        LengthFilter { min, max }
    }

    /// Create a filter with only a lower bound.
    pub fn min(min: usize) -> Self {
        Self::new(min, usize::MAX)
    }

    fn accepts(&self, token: &Token) -> bool {
        let len = token.text.chars().count();
        len >= self.min && len <= self.max
    }
}

impl Filter for LengthFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let filtered: Vec<Token> = tokens.filter(|token| self.accepts(token)).collect();
        Ok(Box::new(filtered.into_iter()))
    }

    fn name(&self) -> &'static str {
        "length"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        let filter = LengthFilter::new(2, 4);
        let tokens = vec![
            Token::new("a", 0),
            Token::new("ok", 1),
            Token::new("fine", 2),
            Token::new("great", 3),
        ];

        let result: Vec<Token> = filter.filter(Box::new(tokens.into_iter())).unwrap().collect();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "ok");
        assert_eq!(result[1].text, "fine");
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let filter = LengthFilter::min(2);
        let tokens = vec![Token::new("é", 0)];
        assert_eq!(filter.filter(Box::new(tokens.into_iter())).unwrap().count(), 0);
    }
}
