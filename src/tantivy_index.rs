use std::path::Path;

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    collector::{Count, DocSetCollector, TopDocs},
    doc,
    query::{AllQuery, Query},
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
        TokenStream,
        WhitespaceTokenizer,
    },
};

use crate::error::Result;

/// Field names used in the schema.
pub mod fields {
    pub const KEY: &str = "id";
    pub const TITLE: &str = "title";
    pub const URL: &str = "url";
    pub const TAGS: &str = "tags";
    pub const TEXT: &str = "text";
}

/// Tokenizer names registered on every opened index.
pub mod tokenizers {
    /// Natural-language titles: lowercased, English stemming.
    pub const EN_STEM: &str = "en_stem";
    /// Tag slugs: one token per slug.
    pub const SLUGS: &str = "slugs";
    /// Combined free text: lowercased words, no stemming.
    pub const WORDS: &str = "words";
}

/// Manages the Tantivy index holding one search document per bookmark.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
    pub key: Field,
    pub title: Field,
    pub url: Field,
    pub tags: Field,
    pub text: Field,
}

/// The indexed projection of a bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDocument {
    /// Bookmark id in base 10.
    pub key: String,
    pub title: String,
    pub url: String,
    /// Tag slugs joined by a single space.
    pub tags: String,
}

impl SearchDocument {
    /// Everything free-text clauses may match against.
    fn combined_text(&self) -> String {
        format!("{} {} {}", self.title, self.url, self.tags)
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub score: f32,
    /// Document key as stored, not yet validated.
    pub key: String,
}

/// A page of hits plus the number of documents matching overall.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPage {
    pub total: usize,
    pub hits: Vec<IndexHit>,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::KEY, STRING | STORED);

    let title_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(tokenizers::EN_STEM)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    builder.add_text_field(fields::TITLE, title_opts);

    builder.add_text_field(fields::URL, TEXT | STORED);

    let tags_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(tokenizers::SLUGS)
                .set_index_option(IndexRecordOption::WithFreqs),
        )
        .set_stored();
    builder.add_text_field(fields::TAGS, tags_opts);

    let text_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(tokenizers::WORDS)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    builder.add_text_field(fields::TEXT, text_opts);

    builder.build()
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register(tokenizers::EN_STEM, en_stem);

    let slugs = TextAnalyzer::builder(WhitespaceTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(tokenizers::SLUGS, slugs);

    index.tokenizers().register(tokenizers::WORDS, words_analyzer());
}

fn words_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    Ok(SchemaFields {
        key: schema.get_field(fields::KEY)?,
        title: schema.get_field(fields::TITLE)?,
        url: schema.get_field(fields::URL)?,
        tags: schema.get_field(fields::TAGS)?,
        text: schema.get_field(fields::TEXT)?,
    })
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index)
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizers(&index);
        let fields = resolve_fields(&index.schema())?;
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Get the resolved field handles.
    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Add a document, replacing any existing document with the same key.
    pub fn upsert_document(
        &self,
        writer: &IndexWriter,
        document: &SearchDocument,
    ) -> Result<()> {
        let f = self.fields;

        self.delete_document(writer, &document.key);

        writer.add_document(doc!(
            f.key => document.key.as_str(),
            f.title => document.title.as_str(),
            f.url => document.url.as_str(),
            f.tags => document.tags.as_str(),
            f.text => document.combined_text(),
        ))?;

        Ok(())
    }

    /// Delete a single document by key.
    pub fn delete_document(&self, writer: &IndexWriter, key: &str) {
        let term = tantivy::Term::from_field_text(self.fields.key, key);
        writer.delete_term(term);
    }

    /// Delete every document. Takes effect on the next commit.
    pub fn clear(&self, writer: &IndexWriter) -> Result<()> {
        writer.delete_all_documents()?;
        Ok(())
    }

    /// Split free text into the terms stored in the combined text field.
    pub fn analyze_words(&self, text: &str) -> Vec<String> {
        let mut analyzer = words_analyzer();
        let mut stream = analyzer.token_stream(text);
        let mut words = Vec::new();
        while stream.advance() {
            words.push(stream.token().text.clone());
        }
        words
    }

    /// Run a query and return one page of hits together with the total
    /// number of matching documents.
    pub fn execute(
        &self,
        query: &dyn Query,
        offset: usize,
        limit: usize,
    ) -> Result<IndexPage> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        // TopDocs rejects a zero limit and sizes its heap from
        // `offset + limit`, so both are bounded by the live document count.
        let num_docs = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if limit == 0 || offset >= num_docs {
            let total = searcher.search(query, &Count)?;
            return Ok(IndexPage {
                total,
                hits: Vec::new(),
            });
        }
        let limit = limit.min(num_docs - offset);

        let collector = (Count, TopDocs::with_limit(limit).and_offset(offset));
        let (total, top_docs) = searcher.search(query, &collector)?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            hits.push(IndexHit {
                score,
                key: extract_text(&doc, self.fields.key),
            });
        }

        Ok(IndexPage { total, hits })
    }

    /// Fetch the stored fields of a document by key.
    pub fn get_document(&self, key: &str) -> Result<Option<SearchDocument>> {
        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let query = tantivy::query::TermQuery::new(
            tantivy::Term::from_field_text(f.key, key),
            IndexRecordOption::Basic,
        );
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;

        let Some((_, doc_address)) = top_docs.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(doc_address)?;
        Ok(Some(SearchDocument {
            key: extract_text(&doc, f.key),
            title: extract_text(&doc, f.title),
            url: extract_text(&doc, f.url),
            tags: extract_text(&doc, f.tags),
        }))
    }

    /// Keys of every live document.
    pub fn document_keys(&self) -> Result<Vec<String>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&AllQuery, &DocSetCollector)?;

        let mut keys = Vec::with_capacity(addresses.len());
        for doc_address in addresses {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            keys.push(extract_text(&doc, self.fields.key));
        }
        keys.sort();
        Ok(keys)
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
