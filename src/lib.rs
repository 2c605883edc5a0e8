//! Retrieval-augmented question answering over per-company filing PDFs.
//!
//! Documents live under `<documents_dir>/<company>/*.pdf`. `QaEngine::ingest`
//! extracts, chunks, embeds, and publishes a per-company vector index;
//! `QaEngine::ask` retrieves the most relevant chunks and asks the
//! generation provider against them.

pub mod error;
pub mod pipeline;
pub mod providers;
pub mod settings;

pub use error::QaError;
pub use pipeline::{no_data_message, IngestReport, QaEngine};
pub use settings::{load_settings, save_settings, QaSettings};

#[cfg(test)]
mod tests;
