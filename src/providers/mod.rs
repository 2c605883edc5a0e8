//! Capability providers consumed by the pipeline.
//!
//! Embedding, generation, and OCR are opaque collaborators behind async
//! traits so the pipeline can be exercised with deterministic fakes and the
//! production implementations can be swapped without touching the core.

mod embedding;
mod generation;
mod ocr;

pub use embedding::{EmbeddingProvider, FastembedProvider};
pub use generation::{ChatCompletionsClient, GenerationProvider};
pub use ocr::{HttpOcrEngine, OcrEngine};
