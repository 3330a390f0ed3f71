use regex::{Captures, Regex};

use super::CharFilter;
use crate::error::{PolarityError, Result};

/// A char filter that replaces every match of a regex pattern.
///
/// The replacement may reference capture groups (`$1`, `${name}`), which is
/// how hashtags are unwrapped to their bare word.
#[derive(Clone, Debug)]
pub struct PatternReplaceCharFilter {
    pattern: Regex,
    replacement: String,
    name: &'static str,
}

impl PatternReplaceCharFilter {
    /// Create a new pattern replace char filter.
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| PolarityError::analysis(format!("Invalid regex pattern: {e}")))?;

        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
            name: "pattern_replace",
        })
    }

    /// Create a filter that deletes every match of the pattern.
    pub fn remove(pattern: &str) -> Result<Self> {
        Self::new(pattern, "")
    }

    /// Give the filter a more specific name for debugging output.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Get the regex pattern used by this filter.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl CharFilter for PatternReplaceCharFilter {
    fn filter(&self, input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        let mut last_match_end = 0;

        for caps in self.pattern.captures_iter(input) {
            let Some(m) = caps.get(0) else { continue };

            // Append unchanged part
            output.push_str(&input[last_match_end..m.start()]);
            expand_into(&caps, &self.replacement, &mut output);
            last_match_end = m.end();
        }

        output.push_str(&input[last_match_end..]);
        output
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

fn expand_into(caps: &Captures<'_>, replacement: &str, output: &mut String) {
    if replacement.contains('$') {
        caps.expand(replacement, output);
    } else {
        output.push_str(replacement);
    }
}
