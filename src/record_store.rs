//! Canonical storage of bookmarks, tags and their associations.
//!
//! Backed by a single redb database. Every mutation runs in one write
//! transaction, so a bookmark row, its date-index entry and its tag
//! associations always change together.

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, Utc};
use redb::{
    Database,
    MultimapTableDefinition,
    ReadOnlyMultimapTable,
    ReadOnlyTable,
    ReadTransaction,
    ReadableDatabase,
    ReadableMultimapTable,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    models::{
        Bookmark,
        BookmarkId,
        BookmarkUpdate,
        NewBookmark,
        Tag,
        TagId,
        normalize_tag_titles,
    },
    text_util::slugify,
};

const BOOKMARKS: TableDefinition<u64, &[u8]> = TableDefinition::new("bookmarks");
/// `(created_at in microseconds, id)`, for newest-first listing.
const BOOKMARKS_BY_DATE: TableDefinition<(i64, u64), ()> =
    TableDefinition::new("bookmarks_by_date");
const TAGS: TableDefinition<u64, &[u8]> = TableDefinition::new("tags");
/// Unique tag titles. Get-or-create goes through this table.
const TAG_TITLES: TableDefinition<&str, u64> = TableDefinition::new("tag_titles");
const TAG_SLUGS: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("tag_slugs");
const BOOKMARK_TAGS: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("bookmark_tags");
const TAG_BOOKMARKS: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("tag_bookmarks");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

const BOOKMARK_SEQ: &str = "bookmark";
const TAG_SEQ: &str = "tag";

#[derive(Debug, Serialize, Deserialize)]
struct BookmarkRow {
    url: String,
    title: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagRow {
    title: String,
    slug: String,
}

pub struct BookmarkStore {
    db: Database,
}

impl BookmarkStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        let store = Self { db };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Ensure all tables exist by opening them in a write transaction.
    fn ensure_tables(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.open_table(BOOKMARKS)?;
        txn.open_table(BOOKMARKS_BY_DATE)?;
        txn.open_table(TAGS)?;
        txn.open_table(TAG_TITLES)?;
        txn.open_multimap_table(TAG_SLUGS)?;
        txn.open_multimap_table(BOOKMARK_TAGS)?;
        txn.open_multimap_table(TAG_BOOKMARKS)?;
        txn.open_table(SEQUENCES)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;
        Ok(())
    }

    // -- Bookmarks --

    pub fn insert_bookmark(&self, new: &NewBookmark) -> Result<BookmarkId> {
        let created_at = new.created_at.unwrap_or_else(Utc::now);
        let row = BookmarkRow {
            url: new.url.clone(),
            title: new.title.clone(),
            created_at,
        };
        let bytes = serde_json::to_vec(&row)?;

        let txn = self.db.begin_write()?;
        let id = next_id(&txn, BOOKMARK_SEQ)?;
        {
            let mut table = txn.open_table(BOOKMARKS)?;
            table.insert(id, bytes.as_slice())?;
        }
        {
            let mut by_date = txn.open_table(BOOKMARKS_BY_DATE)?;
            by_date.insert((created_at.timestamp_micros(), id), ())?;
        }
        replace_tags(&txn, id, &new.tags)?;
        txn.commit()?;

        tracing::debug!(id, url = %new.url, "inserted bookmark");
        Ok(id)
    }

    /// Replace title, URL and tag set of a bookmark. The creation time is
    /// kept. Returns `false` if no such bookmark exists.
    pub fn update_bookmark(
        &self,
        id: BookmarkId,
        update: &BookmarkUpdate,
    ) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let existing = {
            let table = txn.open_table(BOOKMARKS)?;
            table.get(id)?.map(|v| v.value().to_vec())
        };
        let Some(existing) = existing else {
            txn.abort()?;
            return Ok(false);
        };
        let old: BookmarkRow = serde_json::from_slice(&existing)?;
        let row = BookmarkRow {
            url: update.url.clone(),
            title: update.title.clone(),
            created_at: old.created_at,
        };
        let bytes = serde_json::to_vec(&row)?;
        {
            let mut table = txn.open_table(BOOKMARKS)?;
            table.insert(id, bytes.as_slice())?;
        }
        replace_tags(&txn, id, &update.tags)?;
        txn.commit()?;

        tracing::debug!(id, "updated bookmark");
        Ok(true)
    }

    /// Delete a bookmark and its tag associations. Tags themselves are kept.
    pub fn delete_bookmark(&self, id: BookmarkId) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(BOOKMARKS)?;
            table.remove(id)?.map(|v| v.value().to_vec())
        };
        let Some(removed) = removed else {
            txn.abort()?;
            return Ok(false);
        };
        let row: BookmarkRow = serde_json::from_slice(&removed)?;
        {
            let mut by_date = txn.open_table(BOOKMARKS_BY_DATE)?;
            by_date.remove((row.created_at.timestamp_micros(), id))?;
        }
        replace_tags(&txn, id, &[])?;
        txn.commit()?;

        tracing::debug!(id, "deleted bookmark");
        Ok(true)
    }

    pub fn get_bookmark(&self, id: BookmarkId) -> Result<Option<Bookmark>> {
        let txn = self.db.begin_read()?;
        let reader = Reader::open(&txn)?;
        reader.bookmark(id)
    }

    /// Page through bookmarks, newest first.
    ///
    /// With `tag_slug`, only bookmarks associated with a tag carrying that
    /// exact slug are returned.
    pub fn list_bookmarks(
        &self,
        offset: usize,
        limit: usize,
        tag_slug: Option<&str>,
    ) -> Result<Vec<Bookmark>> {
        let txn = self.db.begin_read()?;
        let reader = Reader::open(&txn)?;

        let Some(slug) = tag_slug else {
            let by_date = txn.open_table(BOOKMARKS_BY_DATE)?;
            let mut result = Vec::new();
            for entry in by_date.iter()?.rev().skip(offset).take(limit) {
                let (key, _) = entry?;
                let (_, id) = key.value();
                if let Some(bm) = reader.bookmark(id)? {
                    result.push(bm);
                }
            }
            return Ok(result);
        };

        let mut matching = Vec::new();
        for id in reader.bookmark_ids_for_slug(slug)? {
            if let Some(bm) = reader.bookmark(id)? {
                matching.push(bm);
            }
        }
        matching.sort_by(|a, b| {
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        });
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    pub fn count_bookmarks(&self, tag_slug: Option<&str>) -> Result<usize> {
        let txn = self.db.begin_read()?;
        match tag_slug {
            None => {
                let table = txn.open_table(BOOKMARKS)?;
                Ok(table.len()? as usize)
            }
            Some(slug) => {
                let reader = Reader::open(&txn)?;
                Ok(reader.bookmark_ids_for_slug(slug)?.len())
            }
        }
    }

    /// Every bookmark with its tags, in id order, read from one snapshot.
    pub fn all_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let txn = self.db.begin_read()?;
        let reader = Reader::open(&txn)?;
        let mut result = Vec::new();
        for entry in reader.bookmarks.iter()? {
            let (k, v) = entry?;
            let id = k.value();
            let tags = reader.tags_of(id)?;
            result.push(decode_bookmark(id, v.value(), tags)?);
        }
        Ok(result)
    }

    pub fn list_bookmark_ids(&self) -> Result<Vec<BookmarkId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BOOKMARKS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _v) = entry?;
            result.push(k.value());
        }
        Ok(result)
    }

    // -- Tags --

    pub fn tags_for_bookmark(&self, id: BookmarkId) -> Result<Vec<Tag>> {
        let txn = self.db.begin_read()?;
        let reader = Reader::open(&txn)?;
        reader.tags_of(id)
    }

    /// Find the tag with this title, creating it if needed.
    pub fn get_or_create_tag(&self, title: &str) -> Result<Tag> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("tag title is empty".into()));
        }
        let txn = self.db.begin_write()?;
        let tag = get_or_create_tag_in(&txn, title)?;
        txn.commit()?;
        Ok(tag)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TAGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push(decode_tag(k.value(), v.value())?);
        }
        Ok(result)
    }

    // -- Maintenance --

    /// Drop every bookmark, tag and association. Settings survive.
    pub fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(BOOKMARKS)?;
        txn.delete_table(BOOKMARKS_BY_DATE)?;
        txn.delete_table(TAGS)?;
        txn.delete_table(TAG_TITLES)?;
        txn.delete_multimap_table(TAG_SLUGS)?;
        txn.delete_multimap_table(BOOKMARK_TAGS)?;
        txn.delete_multimap_table(TAG_BOOKMARKS)?;
        txn.delete_table(SEQUENCES)?;
        txn.commit()?;
        self.ensure_tables()
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }
}

impl std::fmt::Debug for BookmarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkStore").finish_non_exhaustive()
    }
}

/// Tables needed to materialize bookmarks within one read snapshot.
struct Reader {
    bookmarks: ReadOnlyTable<u64, &'static [u8]>,
    tags: ReadOnlyTable<u64, &'static [u8]>,
    tag_slugs: ReadOnlyMultimapTable<&'static str, u64>,
    bookmark_tags: ReadOnlyMultimapTable<u64, u64>,
    tag_bookmarks: ReadOnlyMultimapTable<u64, u64>,
}

impl Reader {
    fn open(txn: &ReadTransaction) -> Result<Self> {
        Ok(Self {
            bookmarks: txn.open_table(BOOKMARKS)?,
            tags: txn.open_table(TAGS)?,
            tag_slugs: txn.open_multimap_table(TAG_SLUGS)?,
            bookmark_tags: txn.open_multimap_table(BOOKMARK_TAGS)?,
            tag_bookmarks: txn.open_multimap_table(TAG_BOOKMARKS)?,
        })
    }

    fn bookmark(&self, id: BookmarkId) -> Result<Option<Bookmark>> {
        let Some(bytes) = self.bookmarks.get(id)?.map(|v| v.value().to_vec())
        else {
            return Ok(None);
        };
        let tags = self.tags_of(id)?;
        decode_bookmark(id, &bytes, tags).map(Some)
    }

    fn tags_of(&self, id: BookmarkId) -> Result<Vec<Tag>> {
        let mut result = Vec::new();
        for tag_id in self.bookmark_tags.get(id)? {
            let tag_id = tag_id?.value();
            if let Some(bytes) = self.tags.get(tag_id)? {
                result.push(decode_tag(tag_id, bytes.value())?);
            }
        }
        Ok(result)
    }

    fn bookmark_ids_for_slug(&self, slug: &str) -> Result<BTreeSet<BookmarkId>> {
        let mut ids = BTreeSet::new();
        for tag_id in self.tag_slugs.get(slug)? {
            let tag_id = tag_id?.value();
            for bookmark_id in self.tag_bookmarks.get(tag_id)? {
                ids.insert(bookmark_id?.value());
            }
        }
        Ok(ids)
    }
}

fn next_id(txn: &WriteTransaction, sequence: &str) -> Result<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let next = table.get(sequence)?.map(|v| v.value()).unwrap_or(0) + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

/// Find-or-insert against the unique title table, inside the caller's
/// write transaction.
fn get_or_create_tag_in(txn: &WriteTransaction, title: &str) -> Result<Tag> {
    let existing = {
        let titles = txn.open_table(TAG_TITLES)?;
        titles.get(title)?.map(|v| v.value())
    };
    if let Some(id) = existing {
        let tags = txn.open_table(TAGS)?;
        let bytes = tags.get(id)?.map(|v| v.value().to_vec()).ok_or_else(
            || Error::NotFound {
                kind: "tag",
                name: id.to_string(),
            },
        )?;
        return decode_tag(id, &bytes);
    }

    let id = next_id(txn, TAG_SEQ)?;
    let row = TagRow {
        title: title.to_string(),
        slug: slugify(title),
    };
    let bytes = serde_json::to_vec(&row)?;
    {
        let mut tags = txn.open_table(TAGS)?;
        tags.insert(id, bytes.as_slice())?;
    }
    {
        let mut titles = txn.open_table(TAG_TITLES)?;
        titles.insert(title, id)?;
    }
    {
        let mut slugs = txn.open_multimap_table(TAG_SLUGS)?;
        slugs.insert(row.slug.as_str(), id)?;
    }
    tracing::debug!(id, title, slug = %row.slug, "created tag");

    Ok(Tag {
        id,
        title: row.title,
        slug: row.slug,
    })
}

/// Drop every association of `bookmark_id`, then associate `titles`.
fn replace_tags(
    txn: &WriteTransaction,
    bookmark_id: BookmarkId,
    titles: &[String],
) -> Result<()> {
    let old: Vec<TagId> = {
        let mut bookmark_tags = txn.open_multimap_table(BOOKMARK_TAGS)?;
        let mut ids = Vec::new();
        for tag_id in bookmark_tags.remove_all(bookmark_id)? {
            ids.push(tag_id?.value());
        }
        ids
    };
    {
        let mut tag_bookmarks = txn.open_multimap_table(TAG_BOOKMARKS)?;
        for tag_id in old {
            tag_bookmarks.remove(tag_id, bookmark_id)?;
        }
    }

    for title in normalize_tag_titles(titles) {
        let tag = get_or_create_tag_in(txn, &title)?;
        {
            let mut bookmark_tags = txn.open_multimap_table(BOOKMARK_TAGS)?;
            bookmark_tags.insert(bookmark_id, tag.id)?;
        }
        {
            let mut tag_bookmarks = txn.open_multimap_table(TAG_BOOKMARKS)?;
            tag_bookmarks.insert(tag.id, bookmark_id)?;
        }
    }
    Ok(())
}

fn decode_bookmark(
    id: BookmarkId,
    bytes: &[u8],
    tags: Vec<Tag>,
) -> Result<Bookmark> {
    let row: BookmarkRow = serde_json::from_slice(bytes)?;
    Ok(Bookmark {
        id,
        url: row.url,
        title: row.title,
        created_at: row.created_at,
        tags,
    })
}

fn decode_tag(id: TagId, bytes: &[u8]) -> Result<Tag> {
    let row: TagRow = serde_json::from_slice(bytes)?;
    Ok(Tag {
        id,
        title: row.title,
        slug: row.slug,
    })
}
