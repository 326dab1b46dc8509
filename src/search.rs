use serde::Serialize;
use tantivy::{
    Term,
    query::{
        AllQuery,
        BooleanQuery,
        EmptyQuery,
        FuzzyTermQuery,
        Occur,
        Query,
        RegexQuery,
        TermQuery,
    },
    schema::IndexRecordOption,
};

use crate::{
    doc_id::parse_document_key,
    error::{Error, Result},
    models::Bookmark,
    query_syntax::ParsedQuery,
    record_store::BookmarkStore,
    tantivy_index::SearchIndex,
    text_util::slugify,
};

/// Edit distance of the fuzzy free-text clause.
pub const FUZZY_DISTANCE: u8 = 1;

/// Characters a substring match may extend over on either side.
const WORD_CHARS: &str = "[a-z0-9_]*";

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    /// Number of matching documents across all pages.
    pub total: usize,
    /// Resolved bookmarks, in index rank order.
    pub bookmarks: Vec<Bookmark>,
    /// Document keys on this page with no bookmark behind them: deleted
    /// bookmarks and keys that are not valid ids.
    pub stale_hits: Vec<String>,
}

/// One page of the plain, newest-first listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub total: usize,
    pub bookmarks: Vec<Bookmark>,
}

/// Offset of a 1-based page.
pub fn page_offset(page: usize, page_size: usize) -> Result<usize> {
    if page == 0 {
        return Err(Error::InvalidInput("page numbers start at 1".into()));
    }
    (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| Error::InvalidInput(format!("page {page} is out of range")))
}

/// Compose the index query for a parsed search string.
///
/// Tag filters are required term clauses on the slug field. Every free-text
/// word adds a fuzzy clause and a substring clause over the combined text
/// field as alternatives. When tags are present the free-text clauses only
/// rank the filtered set; without tags at least one of them must match.
/// A query with neither matches everything.
pub fn build_query(
    index: &SearchIndex,
    parsed: &ParsedQuery,
) -> Result<Box<dyn Query>> {
    if parsed.is_empty() {
        return Ok(Box::new(AllQuery));
    }

    let f = index.fields();
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

    for tag in &parsed.tags {
        let term = Term::from_field_text(f.tags, &slugify(tag));
        clauses.push((
            Occur::Must,
            Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
        ));
    }

    let words = index.analyze_words(&parsed.text);
    for word in &words {
        let fuzzy = FuzzyTermQuery::new(
            Term::from_field_text(f.text, word),
            FUZZY_DISTANCE,
            true,
        );
        clauses.push((Occur::Should, Box::new(fuzzy)));

        let pattern = format!("{WORD_CHARS}{}{WORD_CHARS}", regex::escape(word));
        let substring = RegexQuery::from_pattern(&pattern, f.text)?;
        clauses.push((Occur::Should, Box::new(substring)));
    }

    // Free text made only of separators cannot match any term.
    if clauses.is_empty() {
        return Ok(Box::new(EmptyQuery));
    }
    Ok(Box::new(BooleanQuery::new(clauses)))
}

/// Read side: tag-aware search through the index and plain listing
/// straight from the store.
pub struct SearchEngine<'a> {
    store: &'a BookmarkStore,
    index: &'a SearchIndex,
}

impl<'a> SearchEngine<'a> {
    pub fn new(store: &'a BookmarkStore, index: &'a SearchIndex) -> Self {
        Self { store, index }
    }

    /// Run a raw search string and resolve one page of hits.
    pub fn search(
        &self,
        raw_query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        let offset = page_offset(page, page_size)?;
        let parsed = ParsedQuery::parse(raw_query);
        let query = build_query(self.index, &parsed)?;

        let index_page = self.index.execute(query.as_ref(), offset, page_size)?;
        tracing::debug!(
            query = raw_query,
            tags = ?parsed.tags,
            text = %parsed.text,
            total = index_page.total,
            hits = index_page.hits.len(),
            "search executed"
        );

        let mut bookmarks = Vec::with_capacity(index_page.hits.len());
        let mut stale_hits = Vec::new();
        for hit in &index_page.hits {
            tracing::trace!(key = %hit.key, score = hit.score, "hit");
            let bookmark = match parse_document_key(&hit.key) {
                Some(id) => self.store.get_bookmark(id)?,
                None => None,
            };
            match bookmark {
                Some(bookmark) => bookmarks.push(bookmark),
                None => stale_hits.push(hit.key.clone()),
            }
        }

        if !stale_hits.is_empty() {
            tracing::warn!(
                keys = ?stale_hits,
                "search index references deleted bookmarks; run `tagmark reindex`"
            );
        }

        Ok(SearchPage {
            total: index_page.total,
            bookmarks,
            stale_hits,
        })
    }

    /// Newest-first listing, optionally restricted to one tag slug.
    pub fn list(
        &self,
        page: usize,
        page_size: usize,
        tag_slug: Option<&str>,
    ) -> Result<ListPage> {
        let offset = page_offset(page, page_size)?;
        let bookmarks = self.store.list_bookmarks(offset, page_size, tag_slug)?;
        let total = self.store.count_bookmarks(tag_slug)?;
        Ok(ListPage { total, bookmarks })
    }
}

/// Render bookmarks for terminal output.
pub fn format_human(
    bookmarks: &[Bookmark],
    total: usize,
    page: usize,
    page_size: usize,
) -> String {
    if bookmarks.is_empty() {
        return if total == 0 {
            "No bookmarks found.\n".to_string()
        } else {
            format!("No bookmarks on page {page} ({total} in total).\n")
        };
    }

    let mut out = String::new();
    for bm in bookmarks {
        out.push_str(&format!("{:>5}  {}\n", bm.id, bm.title));
        out.push_str(&format!("       {}\n", bm.url));
        let mut meta = bm.created_at.format("%Y-%m-%d").to_string();
        if !bm.tags.is_empty() {
            let tags: Vec<String> =
                bm.tags.iter().map(|t| format!("[{}]", t.slug)).collect();
            meta.push_str("  ");
            meta.push_str(&tags.join(""));
        }
        out.push_str(&format!("       {meta}\n"));
    }

    let pages = if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    };
    out.push_str(&format!("\npage {page}/{pages}, {total} bookmark(s)\n"));
    out
}

/// Render a page as JSON.
pub fn format_json<T: Serialize>(page: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(page)?)
}
