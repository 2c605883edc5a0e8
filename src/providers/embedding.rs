//! Text embedding provider: trait seam plus the local fastembed model.

use crate::error::QaError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

/// Produces fixed-length vectors for batches of text. Assumed deterministic
/// for identical input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;
}

/// Local embedding model (all-MiniLM-L6-v2, 384 dimensions) running on the
/// ONNX runtime. Inference is CPU-bound, so calls are moved off the async
/// executor with `spawn_blocking`.
pub struct FastembedProvider {
    model: Arc<TextEmbedding>,
}

/// all-MiniLM-L6-v2 output width.
const MINILM_DIMENSION: usize = 384;

impl FastembedProvider {
    /// Load the embedding model, downloading it on first use. Blocking;
    /// call from startup code, not from a request path.
    pub fn initialize() -> Result<Self, QaError> {
        let mut options = InitOptions::default();
        options.model_name = EmbeddingModel::AllMiniLML6V2;
        options.show_download_progress = false;

        let model = TextEmbedding::try_new(options)
            .map_err(|e| QaError::Provider(format!("failed to load embedding model: {}", e)))?;
        tracing::info!("embedding model loaded (all-MiniLM-L6-v2)");

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastembedProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let batch = texts.to_vec();

        tokio::task::spawn_blocking(move || model.embed(batch, None))
            .await
            .map_err(|e| QaError::Provider(format!("embedding task panicked: {}", e)))?
            .map_err(|e| QaError::Provider(format!("embedding generation failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }
}
