//! tagmark - a bookmark store with tag-aware full-text search.
//!
//! Bookmarks and tags live in a [redb](https://github.com/cberner/redb)
//! database; a [Tantivy](https://github.com/quickwit-oss/tantivy) index holds
//! one search document per bookmark. Search strings mix tag filters and free
//! text: `[rust][web] async` requires both tags and ranks by the words.
//!
//! # Quick start
//!
//! ```no_run
//! use tagmark::{BookmarkService, BookmarkStore, DataDir, SearchIndex};
//! use tagmark::models::NewBookmark;
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let store = BookmarkStore::open(&data_dir.bookmarks_db()).unwrap();
//! let index = SearchIndex::open(&data_dir.tantivy_dir().unwrap()).unwrap();
//! let service = BookmarkService::new(&store, &index);
//!
//! service
//!     .add(NewBookmark {
//!         url: "https://www.rust-lang.org".to_string(),
//!         title: "Rust".to_string(),
//!         tags: vec!["rust".to_string(), "lang".to_string()],
//!         created_at: None,
//!     })
//!     .unwrap();
//!
//! let page = service.engine().search("[rust] language", 1, 10).unwrap();
//! for bm in &page.bookmarks {
//!     println!("{} {}", bm.title, bm.url);
//! }
//! ```

pub mod cli;
pub mod data_dir;
pub mod doc_id;
pub mod error;
pub mod indexer;
pub mod models;
pub mod query_syntax;
pub mod record_store;
pub mod search;
pub mod service;
pub mod tantivy_index;
pub mod text_util;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use models::{Bookmark, BookmarkId, NewBookmark, Tag};
pub use query_syntax::ParsedQuery;
pub use record_store::BookmarkStore;
pub use search::{ListPage, SearchEngine, SearchPage};
pub use service::{BookmarkService, Status};
pub use tantivy_index::SearchIndex;
