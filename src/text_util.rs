use tantivy::tokenizer::{
    AsciiFoldingFilter,
    LowerCaser,
    RawTokenizer,
    TextAnalyzer,
    TokenStream,
};

/// Schemes accepted as-is by [`normalize_url`].
const KNOWN_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Derive the slug of a tag title.
///
/// Latin diacritics are folded (`Café` becomes `cafe`), then letters and
/// digits of any script are kept, lowercased. Runs of whitespace, `-`, `_`,
/// `.` and `/` collapse into a single `-`; other characters are dropped.
/// Leading and trailing separators are trimmed, so a title made only of
/// punctuation yields an empty slug.
pub fn slugify(title: &str) -> String {
    let folded = fold_title(title);
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if (c.is_whitespace() || matches!(c, '-' | '_' | '.' | '/'))
            && !out.is_empty()
            && !out.ends_with('-')
        {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Run the whole title through Tantivy's ASCII folding as a single token.
fn fold_title(title: &str) -> String {
    let mut analyzer = TextAnalyzer::builder(RawTokenizer::default())
        .filter(AsciiFoldingFilter)
        .filter(LowerCaser)
        .build();
    let mut stream = analyzer.token_stream(title);
    let mut folded = String::with_capacity(title.len());
    while stream.advance() {
        folded.push_str(&stream.token().text);
    }
    folded
}

/// Prefix `http://` to a URL that does not already carry a web scheme.
///
/// Returns `None` for blank input.
pub fn normalize_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if KNOWN_SCHEMES.iter().any(|s| url.starts_with(s)) {
        Some(url.to_string())
    } else {
        Some(format!("http://{url}"))
    }
}

/// Split a comma-separated tag list as typed in a form or on the command
/// line. Blank entries are dropped.
pub fn split_tag_list(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_joins() {
        assert_eq!(slugify("Python"), "python");
        assert_eq!(slugify("Machine Learning"), "machine-learning");
        assert_eq!(slugify("  web -- dev  "), "web-dev");
        assert_eq!(slugify("snake_case"), "snake-case");
    }

    #[test]
    fn slugify_drops_punctuation() {
        assert_eq!(slugify("C++"), "c");
        assert_eq!(slugify("node.js"), "node-js");
        assert_eq!(slugify("what?!"), "what");
    }

    #[test]
    fn slugify_folds_latin_diacritics() {
        assert_eq!(slugify("Café"), "cafe");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("ÉCOLE"), "ecole");
    }

    #[test]
    fn slugify_keeps_other_scripts() {
        assert_eq!(slugify("日本語"), "日本語");
        assert_eq!(slugify("Русский язык"), "русский-язык");
        assert_eq!(slugify("rust 中文"), "rust-中文");
    }

    #[test]
    fn slugify_empty_when_nothing_usable() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("???"), "");
        assert_eq!(slugify(" - "), "");
    }

    #[test]
    fn slugify_is_deterministic() {
        assert_eq!(slugify("Go Lang"), slugify("Go Lang"));
        assert_eq!(slugify("golang"), slugify("GOLANG"));
    }

    #[test]
    fn normalize_url_adds_scheme() {
        assert_eq!(
            normalize_url("example.com").as_deref(),
            Some("http://example.com")
        );
        assert_eq!(
            normalize_url("https://example.com").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_url("  http://example.com/a ").as_deref(),
            Some("http://example.com/a")
        );
    }

    #[test]
    fn normalize_url_rejects_blank() {
        assert_eq!(normalize_url(""), None);
        assert_eq!(normalize_url("   "), None);
    }

    #[test]
    fn split_tag_list_trims_and_skips_blanks() {
        assert_eq!(split_tag_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_tag_list("").is_empty());
        assert!(split_tag_list(" , ").is_empty());
    }
}
