//! Fast structured extraction via pdf-extract.

use super::{ExtractedPage, PageExtractor};
use async_trait::async_trait;
use std::path::Path;

/// First rung of the chain: pdf-extract handles font encodings well but is
/// strict about document structure and panics on some malformed inputs, so
/// the call is wrapped in `catch_unwind`.
pub struct PdfTextStrategy;

#[async_trait]
impl PageExtractor for PdfTextStrategy {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    async fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, String> {
        let owned = path.to_path_buf();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(&owned)
        }));

        let pages = match result {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => return Err(format!("pdf-extract failed: {}", e)),
            Err(payload) => {
                let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                return Err(format!("pdf-extract panicked: {}", msg));
            }
        };

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(page_index, text)| ExtractedPage { text, page_index })
            .collect())
    }
}
