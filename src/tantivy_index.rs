use std::path::{Path, PathBuf};

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    TantivyError,
    collector::TopDocs,
    directory::MmapDirectory,
    doc,
    query::{AllQuery, Query, QueryParser},
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};
use tracing::{debug, warn};

use crate::{
    document::{DocumentRecord, Metadata, format_timestamp},
    error::{Error, Result},
};

/// Memory budget handed to the Tantivy writer.
const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Field names used in the schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const PATH: &str = "path";
    pub const FILE_NAME: &str = "file_name";
    pub const CONTENT: &str = "content";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const SIZE: &str = "size";
    pub const LAST_MODIFIED: &str = "last_modified";
    pub const LAST_MODIFIED_DISPLAY: &str = "last_modified_display";
    pub const INDEXED_AT: &str = "indexed_at";
    pub const INDEXED_AT_DISPLAY: &str = "indexed_at_display";
    pub const PAGE_COUNT: &str = "page_count";
    pub const METADATA: &str = "metadata";
}

/// Tantivy full-text index of extracted documents.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
    location: PathBuf,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub id: Field,
    pub path: Field,
    pub file_name: Field,
    pub content: Field,
    pub content_type: Field,
    pub size: Field,
    pub last_modified: Field,
    pub last_modified_display: Field,
    pub indexed_at: Field,
    pub indexed_at_display: Field,
    pub page_count: Field,
    pub metadata: Field,
}

impl SchemaFields {
    /// Look every field up in `schema`. An index written with a different
    /// schema is reported as missing fields.
    fn resolve(schema: &Schema) -> std::result::Result<Self, String> {
        let f = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| format!("schema has no `{name}` field"))
        };
        Ok(Self {
            id: f(fields::ID)?,
            path: f(fields::PATH)?,
            file_name: f(fields::FILE_NAME)?,
            content: f(fields::CONTENT)?,
            content_type: f(fields::CONTENT_TYPE)?,
            size: f(fields::SIZE)?,
            last_modified: f(fields::LAST_MODIFIED)?,
            last_modified_display: f(fields::LAST_MODIFIED_DISPLAY)?,
            indexed_at: f(fields::INDEXED_AT)?,
            indexed_at_display: f(fields::INDEXED_AT_DISPLAY)?,
            page_count: f(fields::PAGE_COUNT)?,
            metadata: f(fields::METADATA)?,
        })
    }
}

/// A stored document as returned by [`SearchIndex::search`] and
/// [`SearchIndex::list_all`].
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub score: f32,
    pub id: String,
    pub path: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// Seconds since the epoch.
    pub last_modified: i64,
    pub last_modified_display: String,
    pub indexed_at_display: String,
    pub page_count: u64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub total_documents: u64,
    /// Deleted documents still occupying segments until the next merge.
    pub deleted_documents: u64,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::ID, STRING | STORED);
    builder.add_text_field(fields::PATH, STRING | STORED);

    let analyzed = TextFieldIndexing::default()
        .set_tokenizer("en_stem")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    builder.add_text_field(
        fields::FILE_NAME,
        TextOptions::default()
            .set_indexing_options(analyzed.clone())
            .set_stored(),
    );
    // Content is not stored: snippets are rebuilt from the source file.
    builder.add_text_field(
        fields::CONTENT,
        TextOptions::default().set_indexing_options(analyzed),
    );

    builder.add_text_field(fields::CONTENT_TYPE, STRING | STORED);
    builder.add_u64_field(fields::SIZE, STORED);
    builder.add_i64_field(fields::LAST_MODIFIED, STORED | FAST);
    builder.add_text_field(fields::LAST_MODIFIED_DISPLAY, STORED);
    builder.add_i64_field(fields::INDEXED_AT, STORED | FAST);
    builder.add_text_field(fields::INDEXED_AT_DISPLAY, STORED);
    builder.add_u64_field(fields::PAGE_COUNT, STORED);
    builder.add_text_field(fields::METADATA, STORED);

    builder.build()
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

impl SearchIndex {
    /// Open the index in `dir`, creating the directory and an empty index
    /// when needed.
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mmap_dir = MmapDirectory::open(dir)
            .map_err(|e| Error::index_unavailable(dir, e))?;
        let exists = Index::exists(&mmap_dir)
            .map_err(|e| Error::index_unavailable(dir, e))?;

        let index = if exists {
            Index::open(mmap_dir)
                .map_err(|e| Error::index_unavailable(dir, e))?
        } else {
            debug!(dir = %dir.display(), "creating new index");
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index, dir.to_path_buf())
    }

    /// Open an index that must already exist.
    pub fn open_existing(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::index_unavailable(
                dir,
                "index directory does not exist; run `docseek index` first",
            ));
        }
        let mmap_dir = MmapDirectory::open(dir)
            .map_err(|e| Error::index_unavailable(dir, e))?;
        let exists = Index::exists(&mmap_dir)
            .map_err(|e| Error::index_unavailable(dir, e))?;
        if !exists {
            return Err(Error::index_unavailable(dir, "no index found"));
        }
        let index = Index::open(mmap_dir)
            .map_err(|e| Error::index_unavailable(dir, format!("corrupt index: {e}")))?;

        Self::from_index(index, dir.to_path_buf())
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::from_index(index, PathBuf::from(":memory:"))
    }

    fn from_index(index: Index, location: PathBuf) -> Result<Self> {
        let fields = SchemaFields::resolve(&index.schema())
            .map_err(|reason| Error::index_unavailable(&location, reason))?;
        register_tokenizers(&index);
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
            location,
        })
    }

    /// Directory holding the index.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Take the index write lock for a batch of changes.
    ///
    /// Fails immediately with [`Error::IndexUnavailable`] when another
    /// writer holds the lock.
    pub fn begin_write(&self) -> Result<IndexSession<'_>> {
        let writer = match self.index.writer(WRITER_MEMORY_BUDGET) {
            Ok(writer) => writer,
            Err(e @ TantivyError::LockFailure(..)) => {
                return Err(Error::index_unavailable(&self.location, e));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(IndexSession {
            index: self,
            writer,
            pending: 0,
        })
    }

    /// Search `file_name` and `content` with BM25, `content` boosted 2x.
    ///
    /// Returns at most `limit` hits by descending score.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<IndexHit>> {
        let f = self.fields;
        let mut parser =
            QueryParser::for_index(&self.index, vec![f.file_name, f.content]);
        parser.set_field_boost(f.content, 2.0);

        let (query, errors) = parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            debug!(query = query_str, ?errors, "query parsed leniently");
        }
        self.collect(query.as_ref(), limit)
    }

    /// The first `limit` live documents by path.
    ///
    /// `AllQuery` scores every document the same, so the whole index is read
    /// and sorted before the cap applies.
    pub fn list_all(&self, limit: usize) -> Result<Vec<IndexHit>> {
        self.reader.reload()?;
        let total = usize::try_from(self.reader.searcher().num_docs())
            .unwrap_or(usize::MAX);
        let mut hits = self.collect(&AllQuery, total)?;
        hits.sort_by(|a, b| a.path.cmp(&b.path));
        hits.truncate(limit);
        Ok(hits)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let deleted_documents = searcher
            .segment_readers()
            .iter()
            .map(|segment| u64::from(segment.num_deleted_docs()))
            .sum();
        Ok(IndexStats {
            total_documents: searcher.num_docs(),
            deleted_documents,
        })
    }

    fn collect(&self, query: &dyn Query, limit: usize) -> Result<Vec<IndexHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query, &TopDocs::with_limit(limit))?;

        let f = self.fields;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            hits.push(IndexHit {
                score,
                id: extract_text(&doc, f.id),
                path: extract_text(&doc, f.path),
                file_name: extract_text(&doc, f.file_name),
                content_type: extract_text(&doc, f.content_type),
                size: extract_u64(&doc, f.size),
                last_modified: extract_i64(&doc, f.last_modified),
                last_modified_display: extract_text(&doc, f.last_modified_display),
                indexed_at_display: extract_text(&doc, f.indexed_at_display),
                page_count: extract_u64(&doc, f.page_count),
                metadata: Metadata::from_json(&extract_text(&doc, f.metadata)),
            });
        }
        Ok(hits)
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`SearchIndex`].
///
/// Changes become visible to searches only after [`IndexSession::commit`].
/// Dropping the session releases the lock and discards uncommitted work.
pub struct IndexSession<'a> {
    index: &'a SearchIndex,
    writer: IndexWriter,
    pending: usize,
}

impl IndexSession<'_> {
    /// Insert `record`, replacing any document with the same id.
    pub fn index_document(&mut self, record: &DocumentRecord) -> Result<()> {
        let f = self.index.fields;

        let term = tantivy::Term::from_field_text(f.id, record.id.as_str());
        self.writer.delete_term(term);

        self.writer.add_document(doc!(
            f.id => record.id.as_str(),
            f.path => record.path.to_string_lossy().into_owned(),
            f.file_name => record.file_name.as_str(),
            f.content => record.content.as_str(),
            f.content_type => record.content_type.as_str(),
            f.size => record.byte_size,
            f.last_modified => record.last_modified.timestamp(),
            f.last_modified_display => format_timestamp(&record.last_modified),
            f.indexed_at => record.indexed_at.timestamp(),
            f.indexed_at_display => format_timestamp(&record.indexed_at),
            f.page_count => record.page_count() as u64,
            f.metadata => record.metadata.to_json(),
        ))?;

        self.pending += 1;
        Ok(())
    }

    /// Make pending changes durable and visible to readers.
    pub fn commit(&mut self) -> Result<()> {
        let opstamp = self.writer.commit()?;
        debug!(opstamp, documents = self.pending, "index committed");
        self.pending = 0;
        self.index.reader.reload()?;
        Ok(())
    }

    /// Delete every document and commit.
    pub fn clear(&mut self) -> Result<()> {
        self.writer.delete_all_documents()?;
        self.pending += 1;
        self.commit()
    }

    /// Number of changes since the last commit.
    pub fn pending(&self) -> usize {
        self.pending
    }
}

impl Drop for IndexSession<'_> {
    fn drop(&mut self) {
        if self.pending > 0 {
            warn!(
                pending = self.pending,
                "index session dropped without commit, discarding changes"
            );
        }
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_u64(doc: &TantivyDocument, field: Field) -> u64 {
    doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn extract_i64(doc: &TantivyDocument, field: Field) -> i64 {
    doc.get_first(field).and_then(|v| v.as_i64()).unwrap_or(0)
}
