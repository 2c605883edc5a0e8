//! Text extraction from filing PDFs.
//!
//! A filing can be well-formed, malformed in several distinct ways, or a pure
//! scan with no embedded text. Extraction therefore runs an ordered fallback
//! chain of strategies behind one trait:
//!
//! 1. `PdfTextStrategy` — fast structured extraction via pdf-extract
//! 2. `PdfiumStrategy` — alternate parser with different layout tolerance
//! 3. `RawScanStrategy` — page-by-page lopdf scan that skips corrupt pages
//! 4. `OcrStrategy` — rasterize pages and run OCR (scanned filings)
//!
//! The chain itself never fails: a document that defeats every strategy
//! contributes zero pages and ingestion moves on to the next document.

mod ocr;
mod pdf_text;
mod pdfium;
mod raw_scan;

pub use ocr::OcrStrategy;
pub use pdf_text::PdfTextStrategy;
pub use pdfium::PdfiumStrategy;
pub use raw_scan::RawScanStrategy;

use crate::providers::OcrEngine;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// One page of extracted text. Transient: pages exist only between extraction
/// and chunking.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub text: String,
    /// Zero-based position of the page within its document.
    pub page_index: usize,
}

/// A single extraction strategy. Strategies are independent; errors are
/// recovered by the chain, and adding or removing one never affects the rest.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, String>;
}

/// Ordered fallback chain over `PageExtractor` strategies.
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn PageExtractor>>,
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn PageExtractor>>) -> Self {
        Self { strategies }
    }

    /// The production chain. OCR is appended only when an engine is
    /// configured; the other three strategies need nothing external.
    pub fn with_default_strategies(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        let mut strategies: Vec<Box<dyn PageExtractor>> = vec![
            Box::new(PdfTextStrategy),
            Box::new(PdfiumStrategy),
            Box::new(RawScanStrategy),
        ];
        if let Some(engine) = ocr {
            strategies.push(Box::new(OcrStrategy::new(engine)));
        }
        Self::new(strategies)
    }

    /// Extract text from one document, trying strategies in priority order and
    /// short-circuiting on the first that yields any non-whitespace page.
    /// Never errors; a document no strategy can read yields an empty vec.
    pub async fn extract(&self, path: &Path) -> Vec<ExtractedPage> {
        for strategy in &self.strategies {
            match strategy.extract_pages(path).await {
                Ok(pages) if has_text(&pages) => {
                    let pages = drop_blank_pages(pages);
                    tracing::debug!(
                        strategy = strategy.name(),
                        path = %path.display(),
                        pages = pages.len(),
                        "extraction succeeded"
                    );
                    return pages;
                }
                Ok(pages) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        path = %path.display(),
                        pages = pages.len(),
                        "strategy produced no text, trying next"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        path = %path.display(),
                        error = %e,
                        "strategy failed, trying next"
                    );
                }
            }
        }

        tracing::warn!(path = %path.display(), "no strategy could extract text");
        Vec::new()
    }
}

/// A strategy succeeded if at least one page has non-whitespace text.
fn has_text(pages: &[ExtractedPage]) -> bool {
    pages.iter().any(|p| !p.text.trim().is_empty())
}

fn drop_blank_pages(pages: Vec<ExtractedPage>) -> Vec<ExtractedPage> {
    pages
        .into_iter()
        .filter(|p| !p.text.trim().is_empty())
        .collect()
}
