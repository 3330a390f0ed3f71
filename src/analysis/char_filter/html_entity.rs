use regex::Regex;

use super::CharFilter;
use crate::error::{PolarityError, Result};

/// Named entities decoded by [`HtmlEntityCharFilter`], applied in this order.
///
/// The order is significant: `&amp;lt;` first becomes `&lt;` and then `<`.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// A char filter that decodes a fixed set of HTML entities.
///
/// Named entities are replaced one after another; numeric entities
/// (`&#39;`) are removed outright since the characters they encode are
/// dropped by the punctuation filter anyway.
#[derive(Clone, Debug)]
pub struct HtmlEntityCharFilter {
    numeric: Regex,
}

impl HtmlEntityCharFilter {
    /// Create a new HTML entity char filter.
    pub fn new() -> Result<Self> {
        let numeric = Regex::new(r"&#\d+;")
            .map_err(|e| PolarityError::analysis(format!("Invalid regex pattern: {e}")))?;
        Ok(Self { numeric })
    }
}

impl CharFilter for HtmlEntityCharFilter {
    fn filter(&self, input: &str) -> String {
        let mut text = input.to_string();
        for (entity, decoded) in NAMED_ENTITIES {
            if text.contains(entity) {
                text = text.replace(entity, decoded);
            }
        }
        self.numeric.replace_all(&text, "").into_owned()
    }

    fn name(&self) -> &'static str {
        "html_entity"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entities() {
        let filter = HtmlEntityCharFilter::new().unwrap();
        assert_eq!(
            filter.filter("fish &amp; chips &lt;3 &quot;yum&quot;"),
            "fish & chips <3 \"yum\""
        );
    }

    #[test]
    fn test_numeric_entities_removed() {
        let filter = HtmlEntityCharFilter::new().unwrap();
        assert_eq!(filter.filter("don&#39;t"), "dont");
    }

    #[test]
    fn test_sequential_decoding() {
        let filter = HtmlEntityCharFilter::new().unwrap();
        assert_eq!(filter.filter("&amp;lt;"), "<");
        assert_eq!(filter.filter("&amp;#39;"), "");
    }
}
