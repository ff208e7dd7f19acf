
use super::{IndexedVector, RetrievedChunk};
use crate::config::Config;
use crate::embeddings::{Chunk, Embedder};
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Persistent, embedding-backed collection of manual chunks.
///
/// Reads run concurrently. Writes (upsert, clear) take an internal lock so
/// only one runs at a time.
pub struct VectorIndex {
    connection: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
    vector_dimension: AtomicUsize,
    write_lock: Mutex<()>,
}

impl VectorIndex {
    /// Open the collection configured in `config`, creating it on first use
    #[inline]
    pub async fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open(
            &config.vector_database_path(),
            &config.index.collection,
            config.ollama.embedding_dimension as usize,
            embedder,
        )
        .await
    }

    /// Open (or create) `collection` inside the LanceDB directory at `db_path`.
    ///
    /// `default_dimension` is only used when the table does not exist yet; an
    /// existing table keeps the dimension it was created with.
    #[inline]
    pub async fn open(
        db_path: &Path,
        collection: &str,
        default_dimension: usize,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Index(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        let index = Self {
            connection,
            table_name: collection.to_string(),
            embedder,
            vector_dimension: AtomicUsize::new(default_dimension),
            write_lock: Mutex::new(()),
        };

        index.initialize_table(default_dimension).await?;

        info!(
            "Vector index '{}' ready ({} dimensions)",
            index.table_name,
            index.dimension()
        );
        Ok(index)
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.table_name
    }

    /// Vector width the table currently stores
    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector_dimension.load(Ordering::Acquire)
    }

    async fn initialize_table(&self, default_dimension: usize) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            let dim = self.detect_existing_vector_dimension().await?;
            self.vector_dimension.store(dim, Ordering::Release);
            debug!("Reattached to table '{}' ({} dimensions)", self.table_name, dim);
            return Ok(());
        }

        info!(
            "Creating table '{}' with {} dimensions",
            self.table_name, default_dimension
        );
        self.create_table(default_dimension).await
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Index(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        RagError::Index(format!("Invalid vector dimension: {}", size))
                    });
                }
            }
        }

        Err(RagError::Index(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    async fn create_table(&self, vector_dim: usize) -> Result<()> {
        let schema = create_schema(vector_dim)?;
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to create table: {}", e)))?;
        self.vector_dimension.store(vector_dim, Ordering::Release);
        Ok(())
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to open table: {}", e)))
    }

    /// Embed and store chunks, overwriting any existing entry with the same id
    #[inline]
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let records = self.embed_chunks(chunks)?;
        self.upsert_vectors(records).await
    }

    /// Embed chunks into records ready for `upsert_vectors` without touching the table
    #[inline]
    pub fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<IndexedVector>> {
        if chunks.is_empty() {
            debug!("No chunks to embed");
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let indexed_at = chrono::Utc::now().to_rfc3339();
        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedVector {
                id: chunk.id.clone(),
                vector,
                text: chunk.text.clone(),
                page_number: chunk.page_number,
                start_offset: chunk.start_offset,
                indexed_at: indexed_at.clone(),
            })
            .collect())
    }

    /// Store pre-computed vectors with merge-on-id semantics
    #[inline]
    pub async fn upsert_vectors(&self, records: Vec<IndexedVector>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        let vector_dim = records[0].vector.len();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Embedding(format!(
                "Embedding for {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        if vector_dim != self.dimension() {
            self.adopt_dimension(vector_dim).await?;
        }

        debug!("Upserting batch of {} vectors", records.len());

        let record_batch = create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let table = self.open_table().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Index(format!("Failed to upsert vectors: {}", e)))?;

        info!("Upserted {} vectors into '{}'", records.len(), self.table_name);
        Ok(())
    }

    /// Switch an empty table to a new vector width; refuse when data would be orphaned
    async fn adopt_dimension(&self, vector_dim: usize) -> Result<()> {
        let existing = self.count().await?;
        if existing > 0 {
            return Err(RagError::Index(format!(
                "Embedding dimension {} does not match the {} stored vectors of dimension {}; \
                 clear the index before switching embedding models",
                vector_dim,
                existing,
                self.dimension()
            )));
        }

        info!(
            "Vector dimension changed from {} to {}, recreating empty table",
            self.dimension(),
            vector_dim
        );
        self.drop_table_if_exists().await?;
        self.create_table(vector_dim).await
    }

    /// Up to `k` nearest chunks to `query`, best first.
    ///
    /// No similarity floor is applied: a non-empty index always yields its
    /// closest entries, however distant.
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.count().await? == 0 {
            debug!("Nothing to search (k = {})", k);
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        if query_vector.len() != self.dimension() {
            return Err(RagError::Index(format!(
                "Query embedding has {} dimensions but the index stores {}",
                query_vector.len(),
                self.dimension()
            )));
        }

        self.search_vector(&query_vector, k).await
    }

    /// Nearest neighbours of an already embedded query
    #[inline]
    pub async fn search_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        debug!("Searching for similar vectors with limit: {}", k);

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| RagError::Index(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to execute search: {}", e)))?;

        let mut retrieved = parse_search_results_stream(results).await?;
        retrieved.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        retrieved.truncate(k);
        Ok(retrieved)
    }

    /// Total number of stored chunks
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Index(format!("Failed to count rows: {}", e)))
    }

    /// Remove every entry, keeping the collection and its dimension
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.open_table()
            .await?
            .delete("true")
            .await
            .map_err(|e| RagError::Index(format!("Failed to clear table: {}", e)))?;

        info!("Cleared vector index '{}'", self.table_name);
        Ok(())
    }

    /// Compact fragments left behind by repeated merges
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        debug!("Optimizing vector index '{}'", self.table_name);

        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| RagError::Index(format!("Failed to optimize table: {}", e)))?;

        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names = self.connection.table_names().execute().await.map_err(|e| {
            RagError::Index(format!("Failed to list tables for drop: {}", e))
        })?;

        if table_names.contains(&self.table_name) {
            debug!("Dropping table '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Index(format!("Failed to drop table: {}", e)))?;
        } else {
            warn!("Table '{}' vanished before drop", self.table_name);
        }

        Ok(())
    }
}

/// Create schema with the specified vector dimension
fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
    let list_size = i32::try_from(vector_dim)
        .map_err(|_| RagError::Index(format!("Vector dimension too large: {}", vector_dim)))?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("page_number", DataType::UInt32, false),
        Field::new("start_offset", DataType::UInt32, false),
        Field::new("indexed_at", DataType::Utf8, false),
    ])))
}

fn create_record_batch(records: &[IndexedVector], vector_dim: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut texts = Vec::with_capacity(len);
    let mut page_numbers = Vec::with_capacity(len);
    let mut start_offsets = Vec::with_capacity(len);
    let mut indexed_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        texts.push(record.text.as_str());
        page_numbers.push(record.page_number);
        start_offsets.push(u32::try_from(record.start_offset).map_err(|_| {
            RagError::Index(format!("Start offset out of range: {}", record.start_offset))
        })?);
        indexed_ats.push(record.indexed_at.as_str());
    }

    let schema = create_schema(vector_dim)?;
    let list_size = i32::try_from(vector_dim)
        .map_err(|_| RagError::Index(format!("Vector dimension too large: {}", vector_dim)))?;

    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Index(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(texts)),
        Arc::new(UInt32Array::from(page_numbers)),
        Arc::new(UInt32Array::from(start_offsets)),
        Arc::new(StringArray::from(indexed_ats)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::Index(format!("Failed to create record batch: {}", e)))
}

async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<RetrievedChunk>> {
    let mut retrieved = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| RagError::Index(format!("Failed to read result stream: {}", e)))?
    {
        retrieved.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results from stream", retrieved.len());
    Ok(retrieved)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Index(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
    let ids = column::<StringArray>(batch, "id")?;
    let texts = column::<StringArray>(batch, "text")?;
    let page_numbers = column::<UInt32Array>(batch, "page_number")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| RetrievedChunk {
            id: ids.value(row).to_string(),
            text: texts.value(row).to_string(),
            page_number: page_numbers.value(row),
            distance: distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
        })
        .collect();

    Ok(results)
}
