//! Search-box syntax: `[tag]` segments are tag filters, the rest is free
//! text.
//!
//! ```
//! use tagmark::query_syntax::ParsedQuery;
//!
//! let parsed = ParsedQuery::parse("[python][golang] search text");
//! assert_eq!(parsed.tags, vec!["python", "golang"]);
//! assert_eq!(parsed.text, "search text");
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// A bracketed segment, matched non-greedily so `[a][b]` yields two
/// segments. Unterminated brackets do not match and stay in the text.
static TAG_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(.*?)\]").expect("tag segment pattern is valid")
});

/// Contents of every `[...]` segment, trimmed, in order of appearance.
pub fn extract_tags(search: &str) -> Vec<String> {
    TAG_SEGMENT
        .captures_iter(search)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// The search string with every `[...]` segment removed, trimmed.
pub fn remove_tags(search: &str) -> String {
    TAG_SEGMENT.replace_all(search, "").trim().to_string()
}

/// A raw search string split into tag filters and free text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedQuery {
    /// Distinct, non-blank tag tokens in order of first appearance.
    pub tags: Vec<String>,
    /// Remaining free text; empty when the query held only tags.
    pub text: String,
}

impl ParsedQuery {
    pub fn parse(raw: &str) -> Self {
        let mut tags: Vec<String> = Vec::new();
        for tag in extract_tags(raw) {
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Self {
            tags,
            text: remove_tags(raw),
        }
    }

    /// True when the query neither filters nor searches.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.text.is_empty()
    }
}
