//! Error taxonomy for the filing QA pipeline.
//!
//! Extraction-strategy failures and per-document failures are recovered
//! locally and never reach this type; only a total absence of usable content
//! for a company, or a provider/storage failure, surfaces as a `QaError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    /// Caller supplied a missing or empty company number / question.
    #[error("invalid input: {0}")]
    Input(String),

    /// The company has no filing documents on disk.
    #[error("no documents found for company {0}")]
    NoDocuments(String),

    /// Documents exist but none yielded text after every extraction strategy.
    /// Typically scanned filings with no embedded text and no reachable OCR.
    #[error("no extractable text in any document for company {0}")]
    NoExtractableText(String),

    /// Extracted text produced no usable chunks.
    #[error("extracted text produced no chunks for company {0}")]
    NoChunks(String),

    /// Embedding or persistence failed while building a company's index.
    #[error("index build failed: {0}")]
    Index(String),

    /// An embedding/generation/OCR call failed while answering.
    #[error("provider call failed: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QaError {
    /// True for the "company simply has nothing answerable" family, which the
    /// answer path turns into a user-facing message rather than an error.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            QaError::NoDocuments(_) | QaError::NoExtractableText(_) | QaError::NoChunks(_)
        )
    }
}
