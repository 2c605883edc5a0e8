//! Splitting extracted pages into overlapping chunks for embedding.

use super::extract::ExtractedPage;

/// A bounded span of filing text plus its provenance. The atomic unit stored
/// in and retrieved from a company's index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source_file: String,
    pub page_index: usize,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    pub tenant: String,
}

/// Splits page text into segments of at most `chunk_size` characters with
/// `chunk_overlap` characters shared between consecutive segments. Pages are
/// split individually so every chunk keeps an exact page index.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        assert!(chunk_overlap < chunk_size, "overlap must be smaller than chunk size");
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk one document's pages. `chunk_index` runs across the whole
    /// document so retrieved chunks can be ordered within their source.
    pub fn split(&self, pages: &[ExtractedPage], source_file: &str, tenant: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut chunk_index = 0;

        for page in pages {
            for segment in self.split_text(&page.text) {
                chunks.push(Chunk {
                    text: segment,
                    source_file: source_file.to_string(),
                    page_index: page.page_index,
                    chunk_index,
                    tenant: tenant.to_string(),
                });
                chunk_index += 1;
            }
        }

        chunks
    }

    /// Split a single text into overlapping segments, preferring natural
    /// boundaries (paragraph, then sentence, then word) over hard cuts.
    /// Whitespace-only candidates are dropped.
    fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut segments = Vec::new();
        let mut start = 0;

        while start < total {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                find_break(&chars, start, hard_end)
            };

            let segment: String = chars[start..end].iter().collect();
            let trimmed = segment.trim();
            if !trimmed.is_empty() {
                segments.push(trimmed.to_string());
            }

            if end == total {
                break;
            }
            // Step back by the overlap, but always make forward progress.
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }

        segments
    }
}

/// Pick a break position in `(start, hard_end]`, scanning backwards from the
/// size limit. Searches only the back half of the window so a boundary early
/// in the window cannot produce degenerate slivers.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;

    // Paragraph boundary: blank line
    let mut i = hard_end;
    while i > floor + 1 {
        if chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return i;
        }
        i -= 1;
    }

    // Sentence boundary: terminator followed by whitespace
    let mut i = hard_end;
    while i > floor + 1 {
        let prev = chars[i - 2];
        if (prev == '.' || prev == '!' || prev == '?') && chars[i - 1].is_whitespace() {
            return i;
        }
        i -= 1;
    }

    // Word boundary
    let mut i = hard_end;
    while i > floor {
        if chars[i - 1].is_whitespace() {
            return i;
        }
        i -= 1;
    }

    // Hard cut
    hard_end
}
