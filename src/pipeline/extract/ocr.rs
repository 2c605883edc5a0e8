//! OCR extraction for filings with no embedded text.

use super::pdfium::render_pages_to_png;
use super::{ExtractedPage, PageExtractor};
use crate::providers::OcrEngine;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Last rung of the chain: rasterize each page with pdfium and hand the image
/// to the injected OCR engine. A page whose recognition fails is skipped;
/// the strategy reports what it could read.
pub struct OcrStrategy {
    engine: Arc<dyn OcrEngine>,
}

impl OcrStrategy {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl PageExtractor for OcrStrategy {
    fn name(&self) -> &'static str {
        "ocr"
    }

    async fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, String> {
        let rendered = render_pages_to_png(path)?;
        if rendered.is_empty() {
            return Err("no pages could be rendered".to_string());
        }

        let mut pages = Vec::with_capacity(rendered.len());
        for (page_index, png) in rendered {
            match self.engine.recognize(&png).await {
                Ok(text) => pages.push(ExtractedPage { text, page_index }),
                Err(e) => {
                    tracing::debug!(page = page_index, error = %e, "OCR failed for page, skipping");
                }
            }
        }

        Ok(pages)
    }
}
