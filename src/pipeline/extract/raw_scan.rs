//! Page-by-page raw content-stream scan via lopdf.

use super::{ExtractedPage, PageExtractor};
use async_trait::async_trait;
use lopdf::{Document, Object};
use std::path::Path;

/// Third rung: walks each page's content stream directly, collecting the text
/// shown by Tj/TJ operators. Less accurate for complex fonts, but a corrupt
/// page object only loses that page, not the document.
pub struct RawScanStrategy;

#[async_trait]
impl PageExtractor for RawScanStrategy {
    fn name(&self) -> &'static str {
        "lopdf-raw-scan"
    }

    async fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, String> {
        let doc = Document::load(path).map_err(|e| format!("lopdf failed to load PDF: {}", e))?;

        let mut pages = Vec::new();
        for (page_number, page_id) in doc.get_pages() {
            let page_index = page_number.saturating_sub(1) as usize;
            match scan_page_text(&doc, page_id) {
                Ok(text) => pages.push(ExtractedPage { text, page_index }),
                Err(e) => {
                    tracing::debug!(page = page_index, error = %e, "corrupt page skipped");
                }
            }
        }

        Ok(pages)
    }
}

/// Collect all shown text from one page's decoded operations.
fn scan_page_text(doc: &Document, page_id: (u32, u16)) -> Result<String, String> {
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| format!("unreadable page content: {}", e))?;

    let operations = lopdf::content::Content::decode(&content)
        .map_err(|e| format!("undecodable content stream: {}", e))?
        .operations;

    let mut text = String::new();
    for op in operations {
        match op.operator.as_str() {
            // Tj: show one text string
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    if let Some(decoded) = decode_pdf_string(bytes) {
                        text.push_str(&decoded);
                    }
                }
            }
            // TJ: show a text array with kerning adjustments
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            if let Some(decoded) = decode_pdf_string(bytes) {
                                text.push_str(&decoded);
                            }
                        }
                    }
                }
            }
            // Positioning operators that imply a line break
            "Td" | "TD" | "T*" | "'" | "\"" => {
                if !text.ends_with('\n') && !text.ends_with(' ') {
                    text.push(' ');
                }
            }
            "ET" => {
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }

    Ok(text)
}

/// Decode a PDF string object. PDF strings may be UTF-16BE (with BOM), UTF-8,
/// or PDFDocEncoding; control characters are stripped in every case.
fn decode_pdf_string(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    // UTF-16BE with BOM (0xFE 0xFF)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok().map(strip_controls);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        let cleaned = strip_controls(s.to_string());
        if !cleaned.is_empty() {
            return Some(cleaned);
        }
    }

    // PDFDocEncoding / Latin-1: each byte is its own codepoint
    let s: String = bytes.iter().map(|&b| b as char).collect();
    let cleaned = strip_controls(s);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn strip_controls(s: String) -> String {
    s.chars().filter(|c| !c.is_control() || *c == '\n').collect()
}
