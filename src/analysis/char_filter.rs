//! Char filter implementations for text normalization.
//!
//! Char filters rewrite the raw text before it reaches the tokenizer. The
//! normalizer relies on them for everything that must happen on the whole
//! string in a fixed order: stripping URLs and mentions, unwrapping hashtags,
//! lowercasing, decoding HTML entities and dropping punctuation.
//!
//! # Available Filters
//!
//! - [`pattern_replace::PatternReplaceCharFilter`] - Regex-based replacement
//! - [`lowercase::LowercaseCharFilter`] - Lowercases the whole text
//! - [`html_entity::HtmlEntityCharFilter`] - Decodes a fixed set of HTML entities
//!
//! # Examples
//!
//! ```
//! use polarity::analysis::char_filter::CharFilter;
//! use polarity::analysis::char_filter::pattern_replace::PatternReplaceCharFilter;
//!
//! let filter = PatternReplaceCharFilter::new(r"#(\w+)", "$1").unwrap();
//! assert_eq!(filter.filter("so #Great"), "so Great");
//! ```

/// Trait for character filters that transform text before tokenization.
pub trait CharFilter: Send + Sync {
    /// Apply this filter to the input text and return the rewritten text.
    fn filter(&self, input: &str) -> String;

    /// Get the name of this char filter.
    fn name(&self) -> &'static str;
}

pub mod html_entity;
pub mod lowercase;
pub mod pattern_replace;
