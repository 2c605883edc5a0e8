//! Per-tenant vector index on LanceDB.
//!
//! Each company gets its own dataset directory under the index root. Rebuilds
//! write into a staging directory and swap it into place, so a reader never
//! opens a half-written dataset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use uuid::Uuid;

use crate::error::QaError;
use crate::providers::EmbeddingProvider;

use super::chunker::Chunk;

const CHUNKS_TABLE: &str = "chunks";
const EMBED_BATCH_SIZE: usize = 32;

/// A chunk returned from a similarity search, with its provenance and a
/// score in (0, 1] derived from L2 distance.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_file: String,
    pub page_index: usize,
    pub chunk_index: usize,
    pub score: f32,
}

fn chunks_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("source_file", DataType::Utf8, false),
        Field::new("page_index", DataType::Int64, false),
        Field::new("chunk_index", DataType::Int64, false),
        Field::new("tenant", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            true,
        ),
    ]))
}

fn tenant_dataset_dir(index_dir: &Path, tenant: &str) -> PathBuf {
    index_dir.join(tenant)
}

/// An open handle to one company's persisted index. Holds the LanceDB
/// connection for as long as the handle lives; dropping it (on cache
/// eviction) closes the dataset.
pub struct TenantIndex {
    tenant: String,
    _db: Connection,
    chunks: Table,
}

impl TenantIndex {
    /// Open a previously built index for `tenant`. Returns `Ok(None)` when no
    /// dataset exists on disk; storage errors on an existing dataset are
    /// surfaced so the caller can fall back to a rebuild.
    pub async fn open(index_dir: &Path, tenant: &str) -> Result<Option<Self>, QaError> {
        let dataset_dir = tenant_dataset_dir(index_dir, tenant);
        if !dataset_dir.exists() {
            return Ok(None);
        }

        let db = connect(&dataset_dir.to_string_lossy())
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("failed to open index for {tenant}: {e}")))?;

        let table_names = db
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("failed to list tables for {tenant}: {e}")))?;
        if !table_names.contains(&CHUNKS_TABLE.to_string()) {
            return Ok(None);
        }

        let chunks = db
            .open_table(CHUNKS_TABLE)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("failed to open chunks table for {tenant}: {e}")))?;

        Ok(Some(Self {
            tenant: tenant.to_string(),
            _db: db,
            chunks,
        }))
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub async fn chunk_count(&self) -> Result<usize, QaError> {
        self.chunks
            .count_rows(None)
            .await
            .map_err(|e| QaError::Index(format!("failed to count chunks: {e}")))
    }

    /// Nearest-neighbour search over the company's chunks, best first.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, QaError> {
        let query = self
            .chunks
            .query()
            .nearest_to(query_vector)
            .map_err(|e| QaError::Index(format!("failed to build vector query: {e}")))?;

        let mut stream = query
            .limit(limit)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("search failed for {}: {e}", self.tenant)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| QaError::Index(format!("search stream failed: {e}")))?
        {
            collect_batch(&batch, &mut results)?;
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }
}

fn collect_batch(batch: &RecordBatch, out: &mut Vec<RetrievedChunk>) -> Result<(), QaError> {
    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, QaError> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .ok_or_else(|| {
                QaError::Index(format!("search result is missing the {name} column"))
            })
    }

    let contents: &StringArray = column(batch, "content")?;
    let source_files: &StringArray = column(batch, "source_file")?;
    let page_indices: &Int64Array = column(batch, "page_index")?;
    let chunk_indices: &Int64Array = column(batch, "chunk_index")?;
    let distances: &Float32Array = column(batch, "_distance")?;

    for i in 0..batch.num_rows() {
        let distance = distances.value(i);
        out.push(RetrievedChunk {
            content: contents.value(i).to_string(),
            source_file: source_files.value(i).to_string(),
            page_index: page_indices.value(i) as usize,
            chunk_index: chunk_indices.value(i) as usize,
            score: 1.0 / (1.0 + distance),
        });
    }
    Ok(())
}

/// Builds tenant datasets and publishes them atomically under the index root.
pub struct IndexBuilder {
    index_dir: PathBuf,
}

impl IndexBuilder {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    /// Tenants with a published dataset on disk, sorted.
    pub async fn persisted_tenants(&self) -> Result<Vec<String>, QaError> {
        let mut tenants = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.index_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tenants),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            tenants.push(name);
        }
        tenants.sort();
        Ok(tenants)
    }

    /// Embed `chunks` and write a fresh dataset for `tenant`, replacing any
    /// existing one. Returns an open handle to the published index along with
    /// the parked previous dataset; the caller deletes the parked copy only
    /// after the fresh handle is installed wherever readers look it up.
    pub async fn build(
        &self,
        tenant: &str,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<PublishedIndex, QaError> {
        if chunks.is_empty() {
            return Err(QaError::NoChunks(tenant.to_string()));
        }

        let dimension = embedder.dimension();
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(QaError::Index(format!(
                    "embedding returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        let staging_dir = self
            .index_dir
            .join(".staging")
            .join(format!("{tenant}-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging_dir).await?;

        let result = self
            .write_dataset(tenant, &staging_dir, chunks, &vectors, dimension)
            .await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_dir_all(&staging_dir).await;
            return Err(e);
        }

        let replaced = self.publish(tenant, &staging_dir).await?;

        match TenantIndex::open(&self.index_dir, tenant).await? {
            Some(index) => Ok(PublishedIndex { index, replaced }),
            None => Err(QaError::Index(format!(
                "freshly built index for {tenant} is missing"
            ))),
        }
    }

    async fn write_dataset(
        &self,
        tenant: &str,
        staging_dir: &Path,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        dimension: usize,
    ) -> Result<(), QaError> {
        let db = connect(&staging_dir.to_string_lossy())
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("failed to open staging dataset: {e}")))?;

        let schema = chunks_schema(dimension);
        let batch = build_record_batch(tenant, chunks, vectors, schema.clone(), dimension)?;

        db.create_table(
            CHUNKS_TABLE,
            RecordBatchIterator::new(vec![Ok(batch)], schema),
        )
        .execute()
        .await
        .map_err(|e| QaError::Index(format!("failed to write chunks for {tenant}: {e}")))?;

        Ok(())
    }

    /// Swap the staged dataset into the tenant's slot. The old dataset is
    /// parked under `.trash` so the swap is two renames; the parked path is
    /// returned for the caller to delete once no reader can still be handed
    /// the old index.
    async fn publish(
        &self,
        tenant: &str,
        staging_dir: &Path,
    ) -> Result<Option<PathBuf>, QaError> {
        let final_dir = tenant_dataset_dir(&self.index_dir, tenant);
        let trash_dir = self
            .index_dir
            .join(".trash")
            .join(format!("{tenant}-{}", Uuid::new_v4()));

        let mut replaced = None;
        if final_dir.exists() {
            tokio::fs::create_dir_all(
                trash_dir.parent().unwrap_or_else(|| Path::new(".")),
            )
            .await?;
            tokio::fs::rename(&final_dir, &trash_dir).await?;
            replaced = Some(trash_dir);
        }
        tokio::fs::rename(staging_dir, &final_dir).await?;
        Ok(replaced)
    }
}

/// Result of a successful build: the open handle plus the previous dataset,
/// parked but not yet deleted.
pub struct PublishedIndex {
    pub index: TenantIndex,
    pub replaced: Option<PathBuf>,
}

fn build_record_batch(
    tenant: &str,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    schema: Arc<Schema>,
    dimension: usize,
) -> Result<RecordBatch, QaError> {
    let mut ids = Vec::with_capacity(chunks.len());
    let mut contents = Vec::with_capacity(chunks.len());
    let mut source_files = Vec::with_capacity(chunks.len());
    let mut page_indices = Vec::with_capacity(chunks.len());
    let mut chunk_indices = Vec::with_capacity(chunks.len());
    let mut tenants = Vec::with_capacity(chunks.len());
    let mut vector_rows = Vec::with_capacity(chunks.len());

    for (chunk, vector) in chunks.iter().zip(vectors) {
        if vector.len() != dimension {
            return Err(QaError::Index(format!(
                "embedding dimension {} does not match index dimension {}",
                vector.len(),
                dimension
            )));
        }
        ids.push(Uuid::new_v4().to_string());
        contents.push(chunk.text.clone());
        source_files.push(chunk.source_file.clone());
        page_indices.push(chunk.page_index as i64);
        chunk_indices.push(chunk.chunk_index as i64);
        tenants.push(tenant.to_string());
        vector_rows.push(Some(
            vector.iter().copied().map(Some).collect::<Vec<_>>(),
        ));
    }

    let vector_arr = Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        vector_rows,
        dimension as i32,
    ));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(source_files)),
            Arc::new(Int64Array::from(page_indices)),
            Arc::new(Int64Array::from(chunk_indices)),
            Arc::new(StringArray::from(tenants)),
            vector_arr,
        ],
    )
    .map_err(|e| QaError::Index(format!("failed to assemble record batch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_returns_none_for_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let opened = TenantIndex::open(dir.path(), "00445790").await.unwrap();
        assert!(opened.is_none());
    }

    #[tokio::test]
    async fn persisted_tenants_skips_internal_dirs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("00445790"))
            .await
            .unwrap();
        tokio::fs::create_dir_all(dir.path().join("12345678"))
            .await
            .unwrap();
        tokio::fs::create_dir_all(dir.path().join(".staging/leftover"))
            .await
            .unwrap();

        let builder = IndexBuilder::new(dir.path());
        let tenants = builder.persisted_tenants().await.unwrap();
        assert_eq!(tenants, vec!["00445790".to_string(), "12345678".to_string()]);
    }

    #[tokio::test]
    async fn persisted_tenants_handles_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let builder = IndexBuilder::new(dir.path().join("never-created"));
        assert!(builder.persisted_tenants().await.unwrap().is_empty());
    }

    #[test]
    fn search_batch_with_missing_column_is_an_error() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "content",
            DataType::Utf8,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["some chunk text"]))],
        )
        .unwrap();

        let mut out = Vec::new();
        let err = collect_batch(&batch, &mut out).unwrap_err();
        assert!(matches!(err, QaError::Index(_)));
        assert!(err.to_string().contains("source_file"));
        assert!(out.is_empty());
    }

    #[test]
    fn build_rejects_mismatched_dimension() {
        let chunk = Chunk {
            text: "text".to_string(),
            source_file: "a.pdf".to_string(),
            page_index: 0,
            chunk_index: 0,
            tenant: "t".to_string(),
        };
        let err = build_record_batch("t", &[chunk], &[vec![0.0; 3]], chunks_schema(4), 4)
            .unwrap_err();
        assert!(matches!(err, QaError::Index(_)));
    }
}
