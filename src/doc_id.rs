//! Mapping between bookmark ids and search-index document keys.
//!
//! The index addresses documents by the bookmark id rendered in base 10.
//! The mapping must round-trip for every id the store can assign.

use crate::models::BookmarkId;

/// Render a bookmark id as the key of its search document.
pub fn document_key(id: BookmarkId) -> String {
    id.to_string()
}

/// Parse a document key back into a bookmark id.
///
/// Returns `None` for anything that is not a canonical base-10 `u64`
/// (leading `+`, whitespace or zero padding are rejected so that every id
/// has exactly one key).
pub fn parse_document_key(key: &str) -> Option<BookmarkId> {
    if key.is_empty()
        || !key.bytes().all(|b| b.is_ascii_digit())
        || (key.len() > 1 && key.starts_with('0'))
    {
        return None;
    }
    key.parse().ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn renders_base_ten() {
        assert_eq!(document_key(42), "42");
        assert_eq!(document_key(0), "0");
    }

    #[test]
    fn rejects_non_canonical_keys() {
        assert_eq!(parse_document_key(""), None);
        assert_eq!(parse_document_key("+7"), None);
        assert_eq!(parse_document_key(" 7"), None);
        assert_eq!(parse_document_key("007"), None);
        assert_eq!(parse_document_key("abc"), None);
        assert_eq!(parse_document_key("18446744073709551616"), None);
    }

    #[test]
    fn extremes_round_trip() {
        assert_eq!(parse_document_key(&document_key(u64::MAX)), Some(u64::MAX));
        assert_eq!(parse_document_key(&document_key(1)), Some(1));
    }

    proptest! {
        #[test]
        fn key_round_trip_is_lossless(id in any::<u64>()) {
            prop_assert_eq!(parse_document_key(&document_key(id)), Some(id));
        }
    }
}
