//! Token-window chunking with page and position tracking

use super::parser::ParsedDocument;
use crate::error::{Error, Result};
use crate::types::{Chunk, SourceDocument};

/// A window of tokens cut from a single text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Tokens joined by single spaces
    pub text: String,
    /// Number of tokens in the window
    pub token_count: usize,
    /// Character offset of the first token in the source text
    pub char_start: usize,
    /// Character offset just past the last token
    pub char_end: usize,
}

/// Splits text into overlapping windows of whitespace tokens
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl TextChunker {
    /// Create a chunker; `overlap_tokens` must be smaller than `max_tokens`
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(Error::invalid_config("max_tokens must be greater than zero"));
        }
        if overlap_tokens >= max_tokens {
            return Err(Error::invalid_config(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                overlap_tokens, max_tokens
            )));
        }
        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    /// Cut `text` into windows of at most `max_tokens` tokens advancing by
    /// `max_tokens - overlap_tokens`.
    pub fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let stride = self.max_tokens - self.overlap_tokens;
        let mut spans = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.max_tokens).min(tokens.len());
            let window = &tokens[start..end];
            spans.push(ChunkSpan {
                text: window.iter().map(|t| t.text).collect::<Vec<_>>().join(" "),
                token_count: window.len(),
                char_start: window[0].char_start,
                char_end: window[window.len() - 1].char_end,
            });

            if end == tokens.len() {
                break;
            }
            start += stride;
        }

        spans
    }

    /// Chunk every page of a parsed document, numbering chunks document-wide
    pub fn chunk_document(&self, doc: &SourceDocument, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &parsed.pages {
            // Only paginated formats report page numbers
            let page_number = (parsed.total_pages > 1 || parsed.file_type == crate::types::FileType::Pdf)
                .then_some(page.page_number);

            for span in self.chunk(&page.content) {
                chunks.push(Chunk {
                    id: uuid::Uuid::new_v4(),
                    document_id: doc.id,
                    document_name: doc.name.clone(),
                    text: span.text,
                    position: chunks.len() as u32,
                    page_number,
                    char_start: page.char_offset + span.char_start,
                    char_end: page.char_offset + span.char_end,
                    token_count: span.token_count,
                });
            }
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            overlap_tokens: 40,
        }
    }
}

/// Rebuild the whitespace-normalised text from consecutive chunk texts by
/// dropping each chunk's leading overlap.
pub fn reconstruct<S: AsRef<str>>(chunks: &[S], overlap_tokens: usize) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let skip = if i == 0 { 0 } else { overlap_tokens };
        tokens.extend(chunk.as_ref().split_whitespace().skip(skip));
    }
    tokens.join(" ")
}

struct Token<'a> {
    text: &'a str,
    char_start: usize,
    char_end: usize,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut char_idx = 0usize;

    for (byte_idx, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some((byte_start, char_start)) = current.take() {
                tokens.push(Token {
                    text: &text[byte_start..byte_idx],
                    char_start,
                    char_end: char_idx,
                });
            }
        } else if current.is_none() {
            current = Some((byte_idx, char_idx));
        }
        char_idx += 1;
    }

    if let Some((byte_start, char_start)) = current {
        tokens.push(Token {
            text: &text[byte_start..],
            char_start,
            char_end: char_idx,
        });
    }

    tokens
}
