//! docseek - index local documents and search them with BM25.
//!
//! Files of many formats (PDF, office documents, HTML, plain text, images
//! through OCR) are turned into text by [`Extractor`], stored in a
//! [Tantivy](https://github.com/quickwit-oss/tantivy) index by
//! [`SearchIndex`], and queried with snippets rebuilt from the source files.
//!
//! # Quick start
//!
//! ```no_run
//! use docseek::{Config, Extractor, IndexDir, SearchIndex};
//! use docseek::ingestion::{self, IndexOptions};
//! use docseek::search::{self, SearchParams};
//! use docseek::enrich;
//!
//! let config = Config::from_env().unwrap();
//! let dir = IndexDir::resolve(None, true).unwrap();
//! let index = SearchIndex::open_or_create(dir.root()).unwrap();
//! let extractor = Extractor::new(config.extract.clone());
//!
//! ingestion::index_path(
//!     "docs".as_ref(),
//!     &index,
//!     &extractor,
//!     &IndexOptions::default(),
//!     |_| {},
//! )
//! .unwrap();
//!
//! let hits = search::execute_search(&SearchParams::new("invoice"), &index).unwrap();
//! let preview = enrich::preview_extractor(&config.extract, &config.snippet);
//! for r in enrich::enrich_results(hits, "invoice", &preview, &config.snippet) {
//!     println!("{} (score: {:.3}) {:?}", r.path, r.score, r.matched_pages);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod doc_id;
pub mod document;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod index_dir;
pub mod ingestion;
pub mod search;
pub mod snippet;
pub mod tantivy_index;
pub mod walker;

pub use config::Config;
pub use doc_id::DocumentId;
pub use document::DocumentRecord;
pub use error::{Error, Result};
pub use extract::Extractor;
pub use index_dir::IndexDir;
pub use tantivy_index::SearchIndex;
