//! Integration tests for the ingest/ask pipeline.
//!
//! These run the real extraction chain and the real on-disk index against
//! generated filing PDFs, with deterministic fake embedding and generation
//! providers so no model download or endpoint is needed.

pub mod pipeline_integration;
