//! Recursive character splitting.
//!
//! Pages are cut into windows of at most `chunk_size` characters. Inside each window the splitter
//! picks the furthest breakpoint of the strongest kind available, falling back from paragraph to
//! sentence to word to a raw character boundary. Every chunk after the first on a page starts with
//! the last `overlap` characters of the previous chunk, so the text around a boundary is visible
//! to retrieval from both sides.
//!
//! Chunks are exact slices of the page: nothing is trimmed or normalized, and dropping each
//! chunk's overlap prefix and concatenating the rest gives back the page text.

use crate::document::PageText;

use super::types::ChunkingError;

/// Immutable unit of retrieval cut from a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text, including the overlap prefix.
    pub text: String,
    /// 1-based page the chunk was cut from.
    pub page: u32,
    /// Position in the document-wide chunk sequence.
    pub ordinal: usize,
    /// Character offset of the chunk within its page.
    pub start: usize,
    /// Leading characters repeated from the previous chunk on the same page.
    pub overlap: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The part of the chunk not shared with its predecessor.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((offset, _)) => &self.text[offset..],
            None => "",
        }
    }
}

/// Character range of a chunk inside its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// First character (inclusive).
    pub start: usize,
    /// Last character (exclusive).
    pub end: usize,
    /// Characters at the start of the span shared with the previous span.
    pub overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Breakpoint {
    Character,
    Word,
    Sentence,
    Paragraph,
}

/// Deterministic splitter parameterized by chunk size and overlap, both in characters.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Validate the parameters and build a splitter.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap length in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split every page and number the chunks across the whole document.
    pub fn split_pages(&self, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            let offsets = char_offsets(&page.text);
            for span in self.split_spans(&page.text) {
                chunks.push(Chunk {
                    text: page.text[offsets[span.start]..offsets[span.end]].to_string(),
                    page: page.number,
                    ordinal: chunks.len(),
                    start: span.start,
                    overlap: span.overlap,
                });
            }
        }
        chunks
    }

    /// Compute chunk spans for `text`. Whitespace-only input yields no spans.
    pub fn split_spans(&self, text: &str) -> Vec<ChunkSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;
        let mut fresh_from = 0;

        loop {
            let limit = start + self.chunk_size;
            if limit >= total {
                spans.push(ChunkSpan {
                    start,
                    end: total,
                    overlap: fresh_from - start,
                });
                break;
            }

            let end = best_breakpoint(&chars, fresh_from + 1, limit);
            spans.push(ChunkSpan {
                start,
                end,
                overlap: fresh_from - start,
            });

            let shared = self.overlap.min(end - start);
            fresh_from = end;
            start = end - shared;
        }

        spans
    }
}

/// Furthest position in `lower..=upper` of the strongest breakpoint kind present.
fn best_breakpoint(chars: &[char], lower: usize, upper: usize) -> usize {
    let mut best: Option<(Breakpoint, usize)> = None;
    for position in lower..=upper {
        let kind = classify(chars, position);
        match best {
            Some((current, _)) if kind < current => {}
            _ => best = Some((kind, position)),
        }
    }
    best.map_or(upper, |(_, position)| position)
}

/// Kind of boundary obtained by splitting right before `chars[position]`.
fn classify(chars: &[char], position: usize) -> Breakpoint {
    if position == 0 || position >= chars.len() {
        return Breakpoint::Character;
    }
    let previous = chars[position - 1];
    let before_previous = position.checked_sub(2).map(|index| chars[index]);

    if previous == '\n' && before_previous == Some('\n') {
        Breakpoint::Paragraph
    } else if previous.is_whitespace() && matches!(before_previous, Some('.' | '!' | '?')) {
        Breakpoint::Sentence
    } else if previous.is_whitespace() {
        Breakpoint::Word
    } else {
        Breakpoint::Character
    }
}

/// Byte offset of every character plus the total length, indexed by character position.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect()
}
