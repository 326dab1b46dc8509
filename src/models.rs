use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text_util::slugify;

pub type BookmarkId = u64;
pub type TagId = u64;

/// A tag as stored: display title plus the slug used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub title: String,
    pub slug: String,
}

/// A bookmark with its tags resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

impl Bookmark {
    /// Tag slugs joined by a single space, as stored in the search index.
    pub fn tag_slugs(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.slug.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Input for inserting a bookmark.
#[derive(Debug, Clone, Default)]
pub struct NewBookmark {
    pub url: String,
    pub title: String,
    /// Tag titles as typed by the user.
    pub tags: Vec<String>,
    /// Defaults to the insertion time.
    pub created_at: Option<DateTime<Utc>>,
}

/// Replacement values for an existing bookmark.
///
/// The tag list replaces the previous associations wholesale.
#[derive(Debug, Clone, Default)]
pub struct BookmarkUpdate {
    pub url: String,
    pub title: String,
    pub tags: Vec<String>,
}

/// Normalize a user-supplied tag list: trim, drop blanks, and keep the
/// first occurrence of each distinct title.
///
/// Titles without a usable slug are dropped with a warning; callers that
/// face the user reject them first via [`unusable_tag_titles`].
pub fn normalize_tag_titles(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let title = tag.trim();
        if title.is_empty() {
            continue;
        }
        if slugify(title).is_empty() {
            tracing::warn!(tag = title, "dropping tag without a usable slug");
            continue;
        }
        if !out.iter().any(|t| t == title) {
            out.push(title.to_string());
        }
    }
    out
}

/// Non-blank titles in `tags` whose slug would be empty.
pub fn unusable_tag_titles(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && slugify(t).is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: TagId, title: &str) -> Tag {
        Tag {
            id,
            title: title.to_string(),
            slug: slugify(title),
        }
    }

    #[test]
    fn tag_slugs_are_space_joined() {
        let bm = Bookmark {
            id: 1,
            url: "http://example.com".into(),
            title: "Example".into(),
            created_at: Utc::now(),
            tags: vec![tag(1, "Python"), tag(2, "Machine Learning")],
        };
        assert_eq!(bm.tag_slugs(), "python machine-learning");
    }

    #[test]
    fn tag_slugs_empty_without_tags() {
        let bm = Bookmark {
            id: 1,
            url: String::new(),
            title: String::new(),
            created_at: Utc::now(),
            tags: vec![],
        };
        assert_eq!(bm.tag_slugs(), "");
    }

    #[test]
    fn normalize_drops_blanks_and_duplicates() {
        let input = vec![
            " rust ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "rust".to_string(),
            "go".to_string(),
            "!!!".to_string(),
        ];
        assert_eq!(normalize_tag_titles(&input), vec!["rust", "go"]);
    }

    #[test]
    fn non_ascii_titles_survive_normalization() {
        let input = vec![
            "日本語".to_string(),
            "русский".to_string(),
            "Café".to_string(),
        ];
        assert_eq!(normalize_tag_titles(&input), input);
        assert!(unusable_tag_titles(&input).is_empty());
    }

    #[test]
    fn unusable_titles_are_listed() {
        let input = vec!["rust".to_string(), " !!! ".to_string(), "".to_string()];
        assert_eq!(unusable_tag_titles(&input), vec!["!!!"]);
    }
}
