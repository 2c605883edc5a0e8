//! Alternate structured extraction and page rasterization via pdfium.

use super::{ExtractedPage, PageExtractor};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::OnceLock;

/// Cached result of probing for the pdfium library directory.
static PDFIUM_LIB_DIR: OnceLock<Option<String>> = OnceLock::new();

/// Locate the directory holding the pdfium dynamic library, checking the
/// `FILINGS_QA_PDFIUM_DIR` override first, then common install locations.
fn find_pdfium_library_dir() -> Option<&'static str> {
    PDFIUM_LIB_DIR
        .get_or_init(|| {
            if let Ok(dir) = std::env::var("FILINGS_QA_PDFIUM_DIR") {
                if Path::new(&dir).is_dir() {
                    return Some(dir);
                }
            }

            let lib_dirs = ["./libs/pdfium", "/usr/local/lib", "/opt/homebrew/lib"];
            for dir in lib_dirs {
                let name = Pdfium::pdfium_platform_library_name_at_path(dir);
                if Path::new(&name).exists() {
                    return Some(dir.to_string());
                }
            }
            None
        })
        .as_deref()
}

/// Bind a fresh pdfium instance, or `None` if the library is unavailable.
/// Callers treat `None` as strategy failure and move down the chain.
pub(super) fn create_pdfium() -> Option<Pdfium> {
    if let Some(dir) = find_pdfium_library_dir() {
        if let Ok(bindings) =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        {
            return Some(Pdfium::new(bindings));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Some(Pdfium::new(bindings)),
        Err(_) => None,
    }
}

/// Second rung: pdfium parses layouts pdf-extract chokes on. Degrades to
/// strategy failure when the pdfium library is not installed.
pub struct PdfiumStrategy;

#[async_trait]
impl PageExtractor for PdfiumStrategy {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    async fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, String> {
        let pdfium = create_pdfium().ok_or_else(|| "pdfium library unavailable".to_string())?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| format!("pdfium failed to load PDF: {:?}", e))?;

        let mut pages = Vec::with_capacity(document.pages().len() as usize);
        for (page_index, page) in document.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| format!("pdfium failed to read page {}: {:?}", page_index, e))?;
            pages.push(ExtractedPage {
                text: text.all(),
                page_index,
            });
        }

        Ok(pages)
    }
}

/// Render every page of a document to PNG bytes for OCR. Pages that fail to
/// render are skipped, keeping their neighbors usable.
pub(super) fn render_pages_to_png(path: &Path) -> Result<Vec<(usize, Vec<u8>)>, String> {
    let pdfium = create_pdfium().ok_or_else(|| "pdfium library unavailable".to_string())?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| format!("pdfium failed to load PDF: {:?}", e))?;

    let config = PdfRenderConfig::new().set_target_width(1600);
    let mut rendered = Vec::new();

    for (page_index, page) in document.pages().iter().enumerate() {
        let bitmap = match page.render_with_config(&config) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                tracing::debug!(page = page_index, error = ?e, "page render failed, skipping");
                continue;
            }
        };

        let mut png = Vec::new();
        if let Err(e) = bitmap
            .as_image()
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        {
            tracing::debug!(page = page_index, error = %e, "PNG encode failed, skipping");
            continue;
        }

        rendered.push((page_index, png));
    }

    Ok(rendered)
}
