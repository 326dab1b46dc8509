//! Keeps the search index in step with the record store.
//!
//! The index is a projection of the store: every document can be rebuilt
//! from a bookmark and its tags. Single-bookmark hooks run after each store
//! write; [`Indexer::reindex_all`] rebuilds the projection from scratch when
//! the two have drifted (a crash between the two writes, a lost index
//! directory, a bulk load that skipped indexing).

use rayon::prelude::*;

use crate::{
    doc_id::document_key,
    error::Result,
    models::{Bookmark, BookmarkId},
    record_store::BookmarkStore,
    tantivy_index::{SearchDocument, SearchIndex},
};

/// Memory budget handed to every index writer.
pub const WRITER_MEMORY_BUDGET: usize = 15_000_000;

/// Build the search document of a bookmark whose tags are resolved.
pub fn search_document(bookmark: &Bookmark) -> SearchDocument {
    SearchDocument {
        key: document_key(bookmark.id),
        title: bookmark.title.clone(),
        url: bookmark.url.clone(),
        tags: bookmark.tag_slugs(),
    }
}

pub struct Indexer<'a> {
    store: &'a BookmarkStore,
    index: &'a SearchIndex,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a BookmarkStore, index: &'a SearchIndex) -> Self {
        Self { store, index }
    }

    /// Upsert the document of one bookmark and commit.
    pub fn index_bookmark(&self, bookmark: &Bookmark) -> Result<()> {
        let mut writer = self.index.writer(WRITER_MEMORY_BUDGET)?;
        self.index
            .upsert_document(&writer, &search_document(bookmark))?;
        writer.commit()?;
        tracing::debug!(id = bookmark.id, "indexed bookmark");
        Ok(())
    }

    /// Re-derive the document of `id` from the store.
    ///
    /// A bookmark missing from the store has its document removed instead.
    /// Returns whether a document was written.
    pub fn sync_bookmark(&self, id: BookmarkId) -> Result<bool> {
        match self.store.get_bookmark(id)? {
            Some(bookmark) => {
                self.index_bookmark(&bookmark)?;
                Ok(true)
            }
            None => {
                self.remove_bookmark(id)?;
                Ok(false)
            }
        }
    }

    /// Deletion hook: drop the document of a bookmark and commit.
    pub fn remove_bookmark(&self, id: BookmarkId) -> Result<()> {
        let mut writer = self.index.writer(WRITER_MEMORY_BUDGET)?;
        self.index.delete_document(&writer, &document_key(id));
        writer.commit()?;
        tracing::debug!(id, "removed bookmark from index");
        Ok(())
    }

    /// Rebuild the whole index from the store.
    ///
    /// Existing documents are dropped and every bookmark is re-added; both
    /// become visible in a single commit, so a failed pass leaves the
    /// previous index in place. Returns the number of documents written.
    pub fn reindex_all(&self) -> Result<usize> {
        let bookmarks = self.store.all_bookmarks()?;
        let documents: Vec<SearchDocument> =
            bookmarks.par_iter().map(search_document).collect();

        let mut writer = self.index.writer(WRITER_MEMORY_BUDGET)?;
        self.index.clear(&writer)?;
        for document in &documents {
            self.index.upsert_document(&writer, document)?;
        }
        writer.commit()?;

        tracing::info!(documents = documents.len(), "reindexed all bookmarks");
        Ok(documents.len())
    }

    /// Drop every document without touching the store.
    pub fn clear(&self) -> Result<()> {
        let mut writer = self.index.writer(WRITER_MEMORY_BUDGET)?;
        self.index.clear(&writer)?;
        writer.commit()?;
        Ok(())
    }
}
