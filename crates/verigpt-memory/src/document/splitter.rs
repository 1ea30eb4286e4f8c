use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::error::DocumentError;
use super::types::{Chunk, ChunkMetadata, Document};

/// Boundaries tried in order; below the last one text is cut between characters.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Sizes are counted in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidConfig`] unless `1 <= chunk_size` and
    /// `chunk_overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.chunk_size == 0 {
            return Err(DocumentError::InvalidConfig(
                "chunk_size must be at least 1".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DocumentError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Recursive character splitter. Each chunk is an exact byte span of the
/// source: separators stay attached to the piece they terminate and nothing
/// is trimmed, so consecutive chunks overlap on a shared suffix/prefix.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

#[derive(Debug, Clone)]
struct Piece {
    range: Range<usize>,
    chars: usize,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidConfig`] for an invalid size/overlap pair.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Chunk a document. The returned iterator can be cloned to restart from
    /// the current position.
    #[must_use]
    pub fn split<'a>(&self, document: &'a Document) -> Chunks<'a> {
        Chunks {
            document,
            spans: self.spans(&document.content),
            next: 0,
            line_pos: 0,
            line_no: 1,
        }
    }

    /// Byte ranges of the chunks `text` would be split into.
    #[must_use]
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        if text.is_empty() {
            return out;
        }
        if text.chars().count() <= self.config.chunk_size {
            out.push(0..text.len());
            return out;
        }
        self.split_range(text, 0..text.len(), 0, &mut out);
        out
    }

    fn split_range(&self, text: &str, range: Range<usize>, level: usize, out: &mut Vec<Range<usize>>) {
        let slice = &text[range.clone()];
        let level = (level..SEPARATORS.len())
            .find(|&l| slice.contains(SEPARATORS[l]))
            .unwrap_or(SEPARATORS.len());

        let pieces = match SEPARATORS.get(level) {
            Some(sep) => split_keeping_separator(text, range, sep),
            None => split_chars(text, range),
        };

        let mut fitting: Vec<Piece> = Vec::new();
        for piece in pieces {
            if piece.chars <= self.config.chunk_size {
                fitting.push(piece);
            } else {
                if !fitting.is_empty() {
                    self.merge(&fitting, out);
                    fitting.clear();
                }
                self.split_range(text, piece.range, level + 1, out);
            }
        }
        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Greedily pack contiguous pieces into chunks of at most `chunk_size`
    /// characters, carrying a trailing window of at most `chunk_overlap`
    /// characters into the next chunk.
    fn merge(&self, pieces: &[Piece], out: &mut Vec<Range<usize>>) {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut window: VecDeque<&Piece> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.chars > size && !window.is_empty() {
                out.push(window_span(&window));
                while total > overlap || (total > 0 && total + piece.chars > size) {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= front.chars;
                }
            }
            window.push_back(piece);
            total += piece.chars;
        }

        if !window.is_empty() {
            out.push(window_span(&window));
        }
    }
}

fn window_span(window: &VecDeque<&Piece>) -> Range<usize> {
    match (window.front(), window.back()) {
        (Some(first), Some(last)) => first.range.start..last.range.end,
        _ => 0..0,
    }
}

fn split_keeping_separator(text: &str, range: Range<usize>, sep: &str) -> Vec<Piece> {
    let base = range.start;
    let slice = &text[range];
    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (idx, matched) in slice.match_indices(sep) {
        let end = idx + matched.len();
        pieces.push(piece(slice, base, cursor..end));
        cursor = end;
    }
    if cursor < slice.len() {
        pieces.push(piece(slice, base, cursor..slice.len()));
    }
    pieces
}

fn split_chars(text: &str, range: Range<usize>) -> Vec<Piece> {
    let base = range.start;
    text[range]
        .char_indices()
        .map(|(idx, ch)| Piece {
            range: base + idx..base + idx + ch.len_utf8(),
            chars: 1,
        })
        .collect()
}

fn piece(slice: &str, base: usize, local: Range<usize>) -> Piece {
    Piece {
        chars: slice[local.clone()].chars().count(),
        range: base + local.start..base + local.end,
    }
}

/// Lazily materialized chunks of one document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    document: &'a Document,
    spans: Vec<Range<usize>>,
    next: usize,
    // Chunk starts never decrease, so line numbers are tracked incrementally.
    line_pos: usize,
    line_no: usize,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let span = self.spans.get(self.next)?.clone();
        let text = &self.document.content;

        self.line_no += count_newlines(&text[self.line_pos..span.start]);
        self.line_pos = span.start;

        let content = &text[span.clone()];
        // A trailing newline closes the chunk's last line rather than opening a new one.
        let body = content.strip_suffix('\n').unwrap_or(content);
        let line_end = self.line_no + count_newlines(body);

        let chunk = Chunk {
            content: content.to_owned(),
            metadata: ChunkMetadata {
                document: self.document.metadata.clone(),
                chunk_index: self.next,
                total_chunks: self.spans.len(),
                start_byte: span.start,
                end_byte: span.end,
                line_start: self.line_no,
                line_end,
            },
        };
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.spans.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

impl FusedIterator for Chunks<'_> {}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::document::types::DocumentMetadata;

    fn make_doc(content: &str) -> Document {
        Document {
            content: content.to_owned(),
            metadata: DocumentMetadata {
                path: "rtl/top.sv".to_owned(),
                extension: "sv".to_owned(),
                size: content.len() as u64,
            },
        }
    }

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    fn contents(splitter: &TextSplitter, text: &str) -> Vec<String> {
        splitter.split(&make_doc(text)).map(|c| c.content).collect()
    }

    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut end = 0;
        for chunk in chunks {
            let start = chunk.metadata.start_byte;
            out.push_str(&chunk.content[end - start..]);
            end = chunk.metadata.end_byte;
        }
        out
    }

    #[test]
    fn default_config() {
        let config = SplitterConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_config() {
        let zero = SplitterConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        };
        assert!(matches!(
            TextSplitter::new(zero),
            Err(DocumentError::InvalidConfig(_))
        ));

        let overlap_too_big = SplitterConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(matches!(
            TextSplitter::new(overlap_too_big),
            Err(DocumentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_document() {
        let splitter = splitter(1000, 200);
        let doc = make_doc("");
        assert_eq!(splitter.split(&doc).count(), 0);
    }

    #[test]
    fn small_document_is_one_chunk() {
        let splitter = splitter(1000, 200);
        let doc = make_doc("module top;\nendmodule\n");
        let chunks: Vec<_> = splitter.split(&doc).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, doc.content);
        assert_eq!(chunks[0].metadata.chunk_index, 0);
        assert_eq!(chunks[0].metadata.total_chunks, 1);
        assert_eq!(chunks[0].metadata.line_start, 1);
        assert_eq!(chunks[0].metadata.line_end, 2);
        assert_eq!(chunks[0].metadata.document.path, "rtl/top.sv");
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let chunks = contents(&splitter(10, 0), "aaaa\n\nbbbb\ncccc");
        assert_eq!(chunks, ["aaaa\n\n", "bbbb\ncccc"]);
    }

    #[test]
    fn falls_back_to_line_breaks() {
        let chunks = contents(&splitter(10, 0), "aaaa bbbb\ncccc dddd");
        assert_eq!(chunks, ["aaaa bbbb\n", "cccc dddd"]);
    }

    #[test]
    fn word_level_overlap() {
        let chunks = contents(&splitter(10, 4), "one two three four five six");
        assert_eq!(chunks, ["one two ", "two three ", "four five ", "six"]);
    }

    #[test]
    fn unbroken_token_is_cut_between_chars() {
        let chunks = contents(&splitter(10, 3), "abcdefghijklmnopqrstuvwxyz");
        assert_eq!(chunks, ["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]);
    }

    #[test]
    fn multibyte_chars_count_once() {
        let text = "é".repeat(25);
        let chunks: Vec<_> = splitter(10, 0).split(&make_doc(&text)).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 10));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn chunk_may_end_in_multibyte_char() {
        let text = "module top; endmodule // Copyright ©";
        let chunks: Vec<_> = splitter(1000, 200).split(&make_doc(text)).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(
            (chunks[0].metadata.line_start, chunks[0].metadata.line_end),
            (1, 1)
        );

        let text = "café
naïve
über ©";
        let chunks: Vec<_> = splitter(5, 0).split(&make_doc(text)).collect();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().any(|c| !c.content.ends_with(|ch: char| ch.is_ascii())));
        assert_eq!(reconstruct(&chunks), text);
        assert_eq!(chunks.last().unwrap().metadata.line_end, 3);
    }

    #[test]
    fn line_numbers_track_position() {
        let text = "l1\nl2\nl3\nl4\nl5\nl6\n";
        let chunks: Vec<_> = splitter(6, 0).split(&make_doc(text)).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            (chunks[0].metadata.line_start, chunks[0].metadata.line_end),
            (1, 2)
        );
        assert_eq!(
            (chunks[1].metadata.line_start, chunks[1].metadata.line_end),
            (3, 4)
        );
        assert_eq!(
            (chunks[2].metadata.line_start, chunks[2].metadata.line_end),
            (5, 6)
        );
    }

    #[test]
    fn iterator_is_exact_size_and_restartable() {
        let doc = make_doc(&"word ".repeat(100));
        let splitter = splitter(40, 10);
        let mut iter = splitter.split(&doc);
        let total = iter.len();
        assert!(total > 1);

        iter.next();
        assert_eq!(iter.len(), total - 1);

        let resumed = iter.clone();
        let rest: Vec<_> = iter.collect();
        let again: Vec<_> = resumed.collect();
        assert_eq!(rest, again);
    }

    #[test]
    fn sv_module_keeps_statements_intact() {
        let text = "module counter(input clk, output reg [3:0] q);\n\
                    \n\
                    always @(posedge clk)\n\
                    \x20 q <= q + 1;\n\
                    \n\
                    endmodule\n";
        let chunks: Vec<_> = splitter(50, 10).split(&make_doc(text)).collect();
        assert!(chunks.len() >= 2);
        assert!(chunks[0].content.starts_with("module counter"));
        assert_eq!(reconstruct(&chunks), text);
    }

    proptest! {
        #[test]
        fn chunks_respect_size_and_reconstruct(
            text in "[a-cé©\u{1F600} \\n]{0,400}",
            size in 1usize..60,
            overlap_frac in 0usize..100,
        ) {
            let overlap = size * overlap_frac / 100;
            let splitter = splitter(size, overlap.min(size - 1));
            let chunks: Vec<_> = splitter.split(&make_doc(&text)).collect();

            prop_assert_eq!(chunks.is_empty(), text.is_empty());
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert!(!chunk.content.is_empty());
                prop_assert!(chunk.content.chars().count() <= size);
                prop_assert_eq!(chunk.metadata.chunk_index, i);
                prop_assert_eq!(chunk.metadata.total_chunks, chunks.len());
                prop_assert_eq!(
                    &text[chunk.metadata.start_byte..chunk.metadata.end_byte],
                    chunk.content.as_str()
                );
                let line_start = text[..chunk.metadata.start_byte].matches('\n').count() + 1;
                let inner = chunk.content.strip_suffix('\n').unwrap_or(&chunk.content);
                prop_assert_eq!(chunk.metadata.line_start, line_start);
                prop_assert_eq!(
                    chunk.metadata.line_end,
                    line_start + inner.matches('\n').count()
                );
            }
            for pair in chunks.windows(2) {
                prop_assert!(pair[1].metadata.start_byte <= pair[0].metadata.end_byte);
                prop_assert!(pair[1].metadata.start_byte > pair[0].metadata.start_byte);
                prop_assert!(pair[1].metadata.end_byte > pair[0].metadata.end_byte);
                let shared = pair[0].metadata.end_byte - pair[1].metadata.start_byte;
                prop_assert!(text[pair[1].metadata.start_byte..][..shared].chars().count() <= overlap.min(size - 1));
            }
            prop_assert_eq!(reconstruct(&chunks), text);
        }

        #[test]
        fn splitting_is_deterministic(text in "\\PC{0,300}", size in 1usize..50) {
            let splitter = splitter(size, size / 3);
            let doc = make_doc(&text);
            let first: Vec<_> = splitter.split(&doc).collect();
            let second: Vec<_> = splitter.split(&doc).collect();
            prop_assert_eq!(first, second);
        }
    }
}
