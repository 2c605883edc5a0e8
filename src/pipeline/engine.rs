//! Orchestration of ingest and question answering across tenants.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::QaError;
use crate::providers::{EmbeddingProvider, GenerationProvider, OcrEngine};
use crate::settings::QaSettings;

use super::cache::IndexCache;
use super::chunker::{Chunk, TextChunker};
use super::extract::ExtractionPipeline;
use super::index::{IndexBuilder, RetrievedChunk, TenantIndex};

/// Outcome of a completed ingest for one company.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub tenant: String,
    pub documents: usize,
    pub documents_with_text: usize,
    pub pages: usize,
    pub chunks: usize,
}

/// The user-facing answer for a company that has nothing answerable: no
/// documents, no extractable text, or no chunks. A defined outcome, not an
/// error.
pub fn no_data_message(tenant: &str) -> String {
    format!("No data available for company {tenant}.")
}

/// The ingestion and answering pipeline for filing documents, shared across
/// concurrent requests behind an `Arc`.
pub struct QaEngine {
    documents_dir: PathBuf,
    top_k: usize,
    chunker: TextChunker,
    extraction: ExtractionPipeline,
    builder: IndexBuilder,
    cache: IndexCache,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    // One token per tenant so a tenant's builds serialize while other
    // tenants proceed. Entries are never pruned; the map holds a few words
    // per tenant ever touched, bounded by the tenant universe.
    build_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QaEngine {
    pub fn new(
        settings: &QaSettings,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        Self {
            documents_dir: PathBuf::from(&settings.documents_dir),
            top_k: settings.top_k,
            chunker: TextChunker::new(settings.chunk_size, settings.chunk_overlap),
            extraction: ExtractionPipeline::with_default_strategies(ocr),
            builder: IndexBuilder::new(&settings.index_dir),
            cache: IndexCache::new(settings.cache_capacity),
            embedder,
            generator,
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Companies with a published index on disk.
    pub async fn list_tenants(&self) -> Result<Vec<String>, QaError> {
        self.builder.persisted_tenants().await
    }

    /// Rebuild a company's index from its documents on disk. Always a full
    /// rebuild; an existing index is replaced, never merged into.
    pub async fn ingest(&self, tenant: &str) -> Result<IngestReport, QaError> {
        let tenant = validate_tenant(tenant)?;

        let lock = self.build_lock(&tenant).await;
        let _guard = lock.lock().await;

        let (_index, report) = self.rebuild(&tenant).await?;
        Ok(report)
    }

    /// Answer a question from a company's filings. Companies with nothing
    /// answerable get the no-data message rather than an error; provider
    /// failures surface as errors for the caller to handle.
    pub async fn ask(&self, tenant: &str, question: &str) -> Result<String, QaError> {
        let tenant = validate_tenant(tenant)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Input("question must not be empty".to_string()));
        }

        let index = match self.resolve_index(&tenant).await {
            Ok(index) => index,
            Err(e) if e.is_no_data() => {
                info!(tenant = %tenant, reason = %e, "no answerable data");
                return Ok(no_data_message(&tenant));
            }
            Err(e) => return Err(e),
        };

        let query_vector = self.embed_question(question).await?;
        let retrieved = index.search(query_vector, self.top_k).await?;
        info!(
            tenant = %tenant,
            retrieved = retrieved.len(),
            "retrieved context for question"
        );

        let prompt = build_prompt(&retrieved, question);
        self.generator.generate(&prompt).await
    }

    /// Obtain a company's index: cache hit, then disk, then a fresh build.
    async fn resolve_index(&self, tenant: &str) -> Result<Arc<TenantIndex>, QaError> {
        if let Some(index) = self.cache.get(tenant).await {
            return Ok(index);
        }

        let lock = self.build_lock(tenant).await;
        let _guard = lock.lock().await;

        // Another task may have opened or built it while we waited.
        if let Some(index) = self.cache.get(tenant).await {
            return Ok(index);
        }

        match TenantIndex::open(self.builder.index_dir(), tenant).await {
            Ok(Some(index)) => {
                let index = Arc::new(index);
                self.cache.put(tenant, index.clone()).await;
                return Ok(index);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "persisted index unreadable, rebuilding");
            }
        }

        let (index, report) = self.rebuild(tenant).await?;
        info!(
            tenant = %tenant,
            chunks = report.chunks,
            "built index on demand"
        );
        Ok(index)
    }

    /// Extract, chunk, embed, publish, and install in the cache. Caller must
    /// hold the tenant's build lock. The cached handle is dropped before the
    /// dataset swap and the fresh one installed before the old dataset is
    /// deleted, so the cache can never serve an index whose files are gone;
    /// a request arriving mid-rebuild misses the cache and waits on the
    /// build lock instead.
    async fn rebuild(&self, tenant: &str) -> Result<(Arc<TenantIndex>, IngestReport), QaError> {
        let started = Instant::now();
        let documents = self.list_documents(tenant).await?;
        if documents.is_empty() {
            return Err(QaError::NoDocuments(tenant.to_string()));
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut documents_with_text = 0;
        let mut pages_total = 0;
        for path in &documents {
            let pages = self.extraction.extract(path).await;
            let source_file = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());
            if pages.is_empty() {
                warn!(tenant = %tenant, document = %source_file, "no text extracted");
                continue;
            }
            documents_with_text += 1;
            pages_total += pages.len();
            chunks.extend(self.chunker.split(&pages, &source_file, tenant));
        }

        if documents_with_text == 0 {
            return Err(QaError::NoExtractableText(tenant.to_string()));
        }
        if chunks.is_empty() {
            return Err(QaError::NoChunks(tenant.to_string()));
        }

        let chunk_count = chunks.len();
        self.cache.invalidate(tenant).await;
        let published = self
            .builder
            .build(tenant, &chunks, self.embedder.as_ref())
            .await?;
        let index = Arc::new(published.index);
        self.cache.put(tenant, index.clone()).await;
        if let Some(parked) = published.replaced {
            let _ = tokio::fs::remove_dir_all(&parked).await;
        }

        info!(
            tenant = %tenant,
            documents = documents.len(),
            pages = pages_total,
            chunks = chunk_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index built"
        );

        Ok((
            index,
            IngestReport {
                tenant: tenant.to_string(),
                documents: documents.len(),
                documents_with_text,
                pages: pages_total,
                chunks: chunk_count,
            },
        ))
    }

    /// PDF files under the tenant's document directory, sorted for
    /// deterministic ordering.
    async fn list_documents(&self, tenant: &str) -> Result<Vec<PathBuf>, QaError> {
        let tenant_dir = self.documents_dir.join(tenant);
        let mut entries = match tokio::fs::read_dir(&tenant_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if path.is_file() && is_pdf {
                documents.push(path);
            }
        }
        documents.sort();
        Ok(documents)
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, QaError> {
        let mut vectors = self.embedder.embed(&[question.to_string()]).await?;
        if vectors.is_empty() {
            return Err(QaError::Provider(
                "embedding provider returned no vector for question".to_string(),
            ));
        }
        Ok(vectors.remove(0))
    }

    async fn build_lock(&self, tenant: &str) -> Arc<Mutex<()>> {
        let mut locks = self.build_locks.lock().await;
        locks
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn validate_tenant(tenant: &str) -> Result<String, QaError> {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return Err(QaError::Input("company number must not be empty".to_string()));
    }
    if tenant.starts_with('.') || tenant.contains('/') || tenant.contains('\\') {
        return Err(QaError::Input(format!(
            "company number {tenant:?} contains path characters"
        )));
    }
    Ok(tenant.to_string())
}

/// Compose the grounded prompt: retrieved chunk text as context, the
/// question verbatim, and an explicit instruction to admit uncertainty
/// rather than fabricate.
fn build_prompt(retrieved: &[RetrievedChunk], question: &str) -> String {
    let context = retrieved
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an AI assistant that helps answer questions based on PDF documents.\n\n\
         Use the following context to answer the question. If you don't know the answer \
         from the provided context, say you don't know.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(content: &str) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source_file: "a.pdf".to_string(),
            page_index: 0,
            chunk_index: 0,
            score: 1.0,
        }
    }

    #[test]
    fn tenant_validation_rejects_empty_and_paths() {
        assert!(matches!(validate_tenant(""), Err(QaError::Input(_))));
        assert!(matches!(validate_tenant("   "), Err(QaError::Input(_))));
        assert!(matches!(validate_tenant("../etc"), Err(QaError::Input(_))));
        assert!(matches!(validate_tenant("a/b"), Err(QaError::Input(_))));
        assert_eq!(validate_tenant(" 00445790 ").unwrap(), "00445790");
    }

    #[test]
    fn no_data_message_names_the_company() {
        assert_eq!(
            no_data_message("99999999"),
            "No data available for company 99999999."
        );
    }

    #[test]
    fn prompt_carries_context_question_and_uncertainty_instruction() {
        let prompt = build_prompt(
            &[retrieved("Turnover was £4.2m."), retrieved("Net profit was £0.3m.")],
            "What is the company's net profit?",
        );

        assert!(prompt.contains("Turnover was £4.2m."));
        assert!(prompt.contains("Net profit was £0.3m."));
        assert!(prompt.contains("Question: What is the company's net profit?"));
        assert!(prompt.contains("say you don't know"));
    }

    #[test]
    fn prompt_with_no_context_is_still_well_formed() {
        let prompt = build_prompt(&[], "Anything?");
        assert!(prompt.contains("Context:\n\n"));
        assert!(prompt.contains("Question: Anything?"));
    }
}
