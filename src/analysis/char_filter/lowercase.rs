use super::CharFilter;

/// A char filter that lowercases the whole text.
///
/// Lowercasing happens on the raw string (not per token) so that it runs
/// before entity decoding and punctuation removal.
#[derive(Clone, Debug, Default)]
pub struct LowercaseCharFilter;

impl LowercaseCharFilter {
    /// Create a new lowercase char filter.
    pub fn new() -> Self {
        LowercaseCharFilter
    }
}

impl CharFilter for LowercaseCharFilter {
    fn filter(&self, input: &str) -> String {
        input.to_lowercase()
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
