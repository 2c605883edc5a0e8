//! The ingestion and answering pipeline: extraction, chunking, per-company
//! indexing, caching, and orchestration.

pub mod cache;
pub mod chunker;
pub mod engine;
pub mod extract;
pub mod index;

pub use cache::{IndexCache, RecencyCache};
pub use chunker::{Chunk, TextChunker};
pub use engine::{no_data_message, IngestReport, QaEngine};
pub use extract::{ExtractedPage, ExtractionPipeline, PageExtractor};
pub use index::{IndexBuilder, RetrievedChunk, TenantIndex};
