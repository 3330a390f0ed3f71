//! Token filter implementations for token transformation.
//!
//! Filters receive the token stream produced by a tokenizer and return a new
//! stream, removing or marking tokens along the way.
//!
//! # Available Filters
//!
//! - [`stop::StopFilter`] - Removes stop words
//! - [`length::LengthFilter`] - Removes tokens shorter or longer than a bound
//!
//! # Examples
//!
//! ```
//! use polarity::analysis::token_filter::Filter;
//! use polarity::analysis::token_filter::stop::StopFilter;
//! use polarity::analysis::token::Token;
//!
//! let filter = StopFilter::new();
//! let tokens = vec![Token::new("the", 0), Token::new("flight", 1)];
//! let filtered: Vec<_> = filter.filter(Box::new(tokens.into_iter()))
//!     .unwrap()
//!     .collect();
//!
//! assert_eq!(filtered.len(), 1);
//! assert_eq!(filtered[0].text, "flight");
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for filters that transform token streams.
pub trait Filter: Send + Sync {
    /// Apply this filter to a token stream.
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    /// Get the name of this filter (for debugging and configuration).
    fn name(&self) -> &'static str;
}

pub mod length;
pub mod stop;
