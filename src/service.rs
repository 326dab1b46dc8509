//! Write path over both stores.
//!
//! Every mutation lands in the record store first and is then mirrored into
//! the search index. The two writes are not atomic; a failure in between
//! leaves the index behind until the next [`Indexer::reindex_all`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    doc_id::{document_key, parse_document_key},
    error::{Error, Result},
    indexer::Indexer,
    models::{Bookmark, BookmarkId, BookmarkUpdate, NewBookmark, unusable_tag_titles},
    record_store::BookmarkStore,
    search::SearchEngine,
    tantivy_index::SearchIndex,
    text_util::normalize_url,
};

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Settings key holding the configured page size.
pub const PAGE_SIZE_SETTING: &str = "page_size";

/// Agreement between the record store and the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub bookmarks: usize,
    pub tags: usize,
    pub indexed_documents: usize,
    /// Bookmarks with no search document.
    pub missing_from_index: Vec<BookmarkId>,
    /// Document keys with no bookmark behind them.
    pub stale_in_index: Vec<String>,
    pub in_sync: bool,
}

pub struct BookmarkService<'a> {
    store: &'a BookmarkStore,
    index: &'a SearchIndex,
}

impl<'a> BookmarkService<'a> {
    pub fn new(store: &'a BookmarkStore, index: &'a SearchIndex) -> Self {
        Self { store, index }
    }

    pub fn indexer(&self) -> Indexer<'a> {
        Indexer::new(self.store, self.index)
    }

    pub fn engine(&self) -> SearchEngine<'a> {
        SearchEngine::new(self.store, self.index)
    }

    /// Store a new bookmark and index it.
    pub fn add(&self, new: NewBookmark) -> Result<Bookmark> {
        let url = require_url(&new.url)?;
        require_usable_tags(&new.tags)?;
        let new = NewBookmark {
            url,
            title: new.title.trim().to_string(),
            ..new
        };

        let id = self.store.insert_bookmark(&new)?;
        let bookmark = self.fetch(id)?;
        self.indexer().index_bookmark(&bookmark)?;

        tracing::info!(id, url = %bookmark.url, "added bookmark");
        Ok(bookmark)
    }

    /// Replace a bookmark's URL, title and tags, then re-index it.
    pub fn edit(&self, id: BookmarkId, update: BookmarkUpdate) -> Result<Bookmark> {
        require_usable_tags(&update.tags)?;
        let update = BookmarkUpdate {
            url: require_url(&update.url)?,
            title: update.title.trim().to_string(),
            tags: update.tags,
        };

        if !self.store.update_bookmark(id, &update)? {
            return Err(not_found(id));
        }
        let bookmark = self.fetch(id)?;
        self.indexer().index_bookmark(&bookmark)?;

        tracing::info!(id, "updated bookmark");
        Ok(bookmark)
    }

    /// Delete a bookmark. The index document is removed even when the store
    /// had no such bookmark, so stale documents can be cleaned up by id.
    pub fn delete(&self, id: BookmarkId) -> Result<bool> {
        let removed = self.store.delete_bookmark(id)?;
        self.indexer().remove_bookmark(id)?;
        if removed {
            tracing::info!(id, "deleted bookmark");
        }
        Ok(removed)
    }

    pub fn get(&self, id: BookmarkId) -> Result<Bookmark> {
        self.fetch(id)
    }

    /// Compare the ids in the store with the keys in the index.
    pub fn status(&self) -> Result<Status> {
        let stored: BTreeSet<BookmarkId> =
            self.store.list_bookmark_ids()?.into_iter().collect();
        let keys = self.index.document_keys()?;

        let indexed: BTreeSet<BookmarkId> =
            keys.iter().filter_map(|k| parse_document_key(k)).collect();
        let missing_from_index: Vec<BookmarkId> =
            stored.difference(&indexed).copied().collect();
        let stale_in_index: Vec<String> = keys
            .iter()
            .filter(|k| {
                parse_document_key(k).is_none_or(|id| !stored.contains(&id))
            })
            .cloned()
            .collect();

        let in_sync = missing_from_index.is_empty() && stale_in_index.is_empty();
        Ok(Status {
            bookmarks: stored.len(),
            tags: self.store.list_tags()?.len(),
            indexed_documents: keys.len(),
            missing_from_index,
            stale_in_index,
            in_sync,
        })
    }

    /// Wipe every bookmark, tag and index document. Settings are kept.
    pub fn reset(&self) -> Result<()> {
        self.store.clear()?;
        self.indexer().clear()?;
        tracing::info!("reset bookmark store and search index");
        Ok(())
    }

    /// Page size configured in the store, or [`DEFAULT_PAGE_SIZE`].
    pub fn default_page_size(&self) -> Result<usize> {
        let Some(raw) = self.store.get_setting(PAGE_SIZE_SETTING)? else {
            return Ok(DEFAULT_PAGE_SIZE);
        };
        match raw.parse::<usize>() {
            Ok(size) if size > 0 => Ok(size),
            _ => {
                tracing::warn!(
                    value = %raw,
                    "ignoring invalid page_size setting, using {DEFAULT_PAGE_SIZE}"
                );
                Ok(DEFAULT_PAGE_SIZE)
            }
        }
    }

    pub fn set_default_page_size(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::InvalidInput("page size must be at least 1".into()));
        }
        self.store.set_setting(PAGE_SIZE_SETTING, &size.to_string())
    }

    /// Drop the configured page size. Returns whether one was set.
    pub fn clear_default_page_size(&self) -> Result<bool> {
        self.store.remove_setting(PAGE_SIZE_SETTING)
    }

    fn fetch(&self, id: BookmarkId) -> Result<Bookmark> {
        self.store.get_bookmark(id)?.ok_or_else(|| not_found(id))
    }
}

fn require_url(url: &str) -> Result<String> {
    normalize_url(url).ok_or_else(|| Error::InvalidInput("URL is empty".into()))
}

fn require_usable_tags(tags: &[String]) -> Result<()> {
    let unusable = unusable_tag_titles(tags);
    if unusable.is_empty() {
        return Ok(());
    }
    Err(Error::InvalidInput(format!(
        "tags need at least one letter or digit: {}",
        unusable.join(", ")
    )))
}

fn not_found(id: BookmarkId) -> Error {
    Error::NotFound {
        kind: "bookmark",
        name: document_key(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, BookmarkStore, SearchIndex) {
        let tmp = tempfile::tempdir().unwrap();
        let store = BookmarkStore::open(&tmp.path().join("bookmarks.redb")).unwrap();
        let index = SearchIndex::open_in_ram().unwrap();
        (tmp, store, index)
    }

    fn new_bookmark(url: &str, title: &str, tags: &[&str]) -> NewBookmark {
        NewBookmark {
            url: url.to_string(),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: None,
        }
    }

    #[test]
    fn add_normalizes_and_indexes() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);

        let bm = service
            .add(new_bookmark("example.com", "  Example  ", &["Web Dev"]))
            .unwrap();
        assert_eq!(bm.url, "http://example.com");
        assert_eq!(bm.title, "Example");
        assert_eq!(bm.tags[0].slug, "web-dev");

        let doc = index.get_document(&bm.id.to_string()).unwrap().unwrap();
        assert_eq!(doc.tags, "web-dev");
        assert_eq!(service.engine().search("[web-dev]", 1, 10).unwrap().total, 1);
    }

    #[test]
    fn add_rejects_blank_url() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        let err = service.add(new_bookmark("   ", "Nothing", &[])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.count_bookmarks(None).unwrap(), 0);
    }

    #[test]
    fn add_keeps_non_ascii_tags() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);

        let bm = service
            .add(new_bookmark("http://t.jp", "Tokyo", &["日本語", "русский", "Café"]))
            .unwrap();
        let slugs: Vec<_> = bm.tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["日本語", "русский", "cafe"]);
        assert_eq!(service.engine().search("[日本語]", 1, 10).unwrap().total, 1);
    }

    #[test]
    fn add_rejects_tags_without_slug() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);

        let err = service
            .add(new_bookmark("http://a.org", "A", &["rust", "!!!"]))
            .unwrap_err();
        match err {
            Error::InvalidInput(msg) => assert!(msg.contains("!!!")),
            other => panic!("expected invalid input, got {other:?}"),
        }
        assert_eq!(store.count_bookmarks(None).unwrap(), 0);

        let bm = service.add(new_bookmark("http://a.org", "A", &["rust"])).unwrap();
        let err = service
            .edit(
                bm.id,
                BookmarkUpdate {
                    url: "http://a.org".into(),
                    title: "A".into(),
                    tags: vec!["???".into()],
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(service.get(bm.id).unwrap().tags[0].slug, "rust");
    }

    #[test]
    fn edit_replaces_tags_in_index() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        let bm = service
            .add(new_bookmark("http://a.org", "A", &["old"]))
            .unwrap();

        let edited = service
            .edit(
                bm.id,
                BookmarkUpdate {
                    url: "https://a.org".into(),
                    title: "A2".into(),
                    tags: vec!["new".into()],
                },
            )
            .unwrap();
        assert_eq!(edited.url, "https://a.org");
        assert_eq!(edited.created_at, bm.created_at);

        let engine = service.engine();
        assert_eq!(engine.search("[old]", 1, 10).unwrap().total, 0);
        assert_eq!(engine.search("[new]", 1, 10).unwrap().total, 1);
    }

    #[test]
    fn edit_missing_is_not_found() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        let err = service
            .edit(
                42,
                BookmarkUpdate {
                    url: "http://x".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "bookmark", .. }));
    }

    #[test]
    fn delete_removes_from_search() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        let keep = service.add(new_bookmark("http://k", "Keep", &["t"])).unwrap();
        let gone = service.add(new_bookmark("http://g", "Gone", &["t"])).unwrap();

        assert!(service.delete(gone.id).unwrap());
        assert!(!service.delete(gone.id).unwrap());

        let page = service.engine().search("[t]", 1, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.bookmarks[0].id, keep.id);
        assert!(matches!(service.get(gone.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn delete_removes_title_matches() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        service.add(new_bookmark("http://k", "Keeper", &[])).unwrap();
        let gone = service
            .add(new_bookmark("http://g", "Zanzibar", &[]))
            .unwrap();

        let before = service.engine().search("Zanzibar", 1, 10).unwrap();
        assert_eq!(before.total, 1);
        assert_eq!(before.bookmarks[0].id, gone.id);

        assert!(service.delete(gone.id).unwrap());
        let after = service.engine().search("Zanzibar", 1, 10).unwrap();
        assert_eq!(after.total, 0);
        assert!(after.bookmarks.is_empty());
    }

    #[test]
    fn status_reports_drift() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        let a = service.add(new_bookmark("http://a", "A", &["x"])).unwrap();
        service.add(new_bookmark("http://b", "B", &["x", "y"])).unwrap();

        let status = service.status().unwrap();
        assert_eq!(status.bookmarks, 2);
        assert_eq!(status.tags, 2);
        assert_eq!(status.indexed_documents, 2);
        assert!(status.in_sync);

        // Store-only write: the index misses it.
        let c = store.insert_bookmark(&new_bookmark("http://c", "C", &[])).unwrap();
        // Store-only delete: the index keeps a stale document.
        store.delete_bookmark(a.id).unwrap();

        let status = service.status().unwrap();
        assert!(!status.in_sync);
        assert_eq!(status.missing_from_index, vec![c]);
        assert_eq!(status.stale_in_index, vec![a.id.to_string()]);

        service.indexer().reindex_all().unwrap();
        assert!(service.status().unwrap().in_sync);
    }

    #[test]
    fn reset_keeps_settings() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        service.add(new_bookmark("http://a", "A", &["x"])).unwrap();
        service.set_default_page_size(5).unwrap();

        service.reset().unwrap();
        let status = service.status().unwrap();
        assert_eq!(status.bookmarks, 0);
        assert_eq!(status.tags, 0);
        assert_eq!(status.indexed_documents, 0);
        assert_eq!(service.default_page_size().unwrap(), 5);

        let again = service.add(new_bookmark("http://b", "B", &[])).unwrap();
        assert_eq!(again.id, 1);
    }

    #[test]
    fn page_size_setting() {
        let (_tmp, store, index) = setup();
        let service = BookmarkService::new(&store, &index);
        assert_eq!(service.default_page_size().unwrap(), DEFAULT_PAGE_SIZE);

        service.set_default_page_size(10).unwrap();
        assert_eq!(service.default_page_size().unwrap(), 10);
        assert!(service.set_default_page_size(0).is_err());

        store.set_setting(PAGE_SIZE_SETTING, "lots").unwrap();
        assert_eq!(service.default_page_size().unwrap(), DEFAULT_PAGE_SIZE);

        assert!(service.clear_default_page_size().unwrap());
        assert!(!service.clear_default_page_size().unwrap());
    }
}
