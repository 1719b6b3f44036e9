use docchat_core::{Chunk, DocchatError, DocchatResult, Document};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters of the character splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Units are cut after each occurrence of this string. Empty means every character.
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_separator() -> String {
    "\n".to_string()
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

/// A chunk of a single text, with character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Start offset in characters (inclusive).
    pub start: usize,
    /// End offset in characters (exclusive).
    pub end: usize,
    /// `text[start..end]` by characters.
    pub content: String,
}

impl ChunkSpan {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Splits text into overlapping, separator-aligned chunks.
///
/// A chunk grows unit by unit (a unit is the text up to and including the
/// next separator) while it stays within `chunk_size` characters. The next
/// chunk starts `chunk_overlap` characters before the previous one ended,
/// or later when the carried overlap plus the next unit would not fit: the
/// overlap shrinks before any chunk exceeds `chunk_size`. Only a unit that is
/// longer than `chunk_size` on its own produces an oversized chunk, emitted
/// whole instead of cutting the unit apart.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            config: ChunkerConfig::default(),
        }
    }
}

impl Chunker {
    /// Create a chunker, rejecting sizes that could never make progress.
    pub fn new(config: ChunkerConfig) -> DocchatResult<Self> {
        if config.chunk_size == 0 {
            return Err(DocchatError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(DocchatError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// The active parameters.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split one text. Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<ChunkSpan> {
        // Byte offset of every character, plus the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;
        if total == 0 {
            return Vec::new();
        }

        let boundaries = self.unit_boundaries(text, &offsets, total);
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        let mut next = 0;

        loop {
            // boundaries[next] is the first boundary past the previous chunk.
            let prev_end = if next == 0 { 0 } else { boundaries[next - 1] };
            if boundaries[next] - start > size && boundaries[next] - prev_end <= size {
                start = boundaries[next] - size;
            }
            let mut last = next;
            while last + 1 < boundaries.len() && boundaries[last + 1] - start <= size {
                last += 1;
            }
            let end = boundaries[last];

            if end - start > size {
                warn!(
                    chunk_len = end - start,
                    chunk_size = size,
                    "Created a chunk longer than chunk_size"
                );
            }

            spans.push(ChunkSpan {
                start,
                end,
                content: text[offsets[start]..offsets[end]].to_string(),
            });

            if end == total {
                break;
            }
            start = if end - start > overlap { end - overlap } else { end };
            next = last + 1;
        }

        spans
    }

    /// Split every segment of a document into chunks numbered across the document.
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (segment_idx, segment) in document.segments.iter().enumerate() {
            for span in self.split(&segment.text) {
                let mut metadata = segment.metadata.clone();
                metadata
                    .entry("source".to_string())
                    .or_insert_with(|| serde_json::Value::String(document.source.clone()));
                chunks.push(Chunk {
                    document_id: document.id,
                    sequence: chunks.len(),
                    segment: segment_idx,
                    start: span.start,
                    end: span.end,
                    content: span.content,
                    metadata,
                });
            }
        }
        chunks
    }

    /// Character offsets just after each separator, always ending with `total`.
    fn unit_boundaries(&self, text: &str, offsets: &[usize], total: usize) -> Vec<usize> {
        let separator = self.config.separator.as_str();
        if separator.is_empty() {
            return (1..=total).collect();
        }

        let mut boundaries: Vec<usize> = text
            .match_indices(separator)
            .map(|(byte_idx, sep)| {
                let byte_end = byte_idx + sep.len();
                offsets.binary_search(&byte_end).unwrap_or_else(|i| i)
            })
            .collect();
        if boundaries.last() != Some(&total) {
            boundaries.push(total);
        }
        boundaries
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use docchat_core::Segment;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            separator: "\n".to_string(),
        })
        .unwrap()
    }

    fn char_slice(text: &str, start: usize, end: usize) -> String {
        text.chars().skip(start).take(end - start).collect()
    }

    /// Coverage, contiguity, overlap and content checks shared by tests.
    /// The overlap is exact unless it had to shrink to keep the next chunk
    /// within `size`.
    fn assert_well_formed(text: &str, spans: &[ChunkSpan], size: usize, overlap: usize) {
        let total = text.chars().count();
        assert_eq!(spans.first().unwrap().start, 0);
        assert_eq!(spans.last().unwrap().end, total);
        for span in spans {
            assert_eq!(span.content, char_slice(text, span.start, span.end));
        }
        for pair in spans.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start <= prev.end, "gap between chunks");
            assert!(next.end > prev.end, "no progress");
            let shared = prev.end - next.start;
            assert!(shared <= overlap, "overlap too large");
            if prev.len() > overlap && shared < overlap {
                assert_eq!(next.len(), size, "overlap shrunk without need");
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(chunker(10, 2).split("").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let spans = chunker(100, 10).split("one line\ntwo line");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "one line\ntwo line");
    }

    #[test]
    fn test_splits_on_separator_within_size() {
        let text = "aaaa\nbbbb\ncccc\ndddd";
        let spans = chunker(10, 0).split(text);
        assert_eq!(
            spans.iter().map(|s| s.content.as_str()).collect::<Vec<_>>(),
            vec!["aaaa\nbbbb\n", "cccc\ndddd"]
        );
        assert_well_formed(text, &spans, 10, 0);
    }

    #[test]
    fn test_exact_overlap() {
        let text = "alpha one\nbeta two\ngamma three\ndelta four\nepsilon five\n";
        let spans = chunker(24, 5).split(text);
        assert!(spans.len() > 2);
        assert_well_formed(text, &spans, 24, 5);
        for pair in spans.windows(2) {
            let tail: String = pair[0].content.chars().rev().take(5).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(pair[1].content.starts_with(&tail));
        }
    }

    #[test]
    fn test_oversized_unit_kept_whole() {
        let long = "x".repeat(50);
        let text = format!("short\n{long}\nend");
        let spans = chunker(20, 4).split(&text);
        assert_well_formed(&text, &spans, 20, 4);
        let oversized: Vec<_> = spans.iter().filter(|s| s.len() > 20).collect();
        assert_eq!(oversized.len(), 1);
        assert!(oversized[0].content.contains(&long));
    }

    #[test]
    fn test_overlap_shrinks_before_chunk_exceeds_size() {
        let text = "aaaaaaaa\nbbbbbbbb\ncccccccc\n";
        let spans = chunker(10, 3).split(text);
        assert_eq!(
            spans.iter().map(|s| (s.start, s.end)).collect::<Vec<_>>(),
            vec![(0, 9), (8, 18), (17, 27)]
        );
        assert_well_formed(text, &spans, 10, 3);

        let line = format!("{}\n", "y".repeat(899));
        let text = line.repeat(5);
        let spans = Chunker::default().split(&text);
        assert!(spans.len() >= 5);
        assert!(spans.iter().all(|s| s.len() <= 1000));
    }

    #[test]
    fn test_units_within_size_never_oversized() {
        let text = "The quick brown fox\njumps over\n\nthe lazy dog.\nA\nBB\nCCC\n".repeat(7);
        for size in [20, 21, 34, 55] {
            for overlap in [0, 3, 7, 19] {
                let spans = chunker(size, overlap).split(&text);
                assert!(spans.iter().all(|s| s.len() <= size), "size {size} overlap {overlap}");
                assert_well_formed(&text, &spans, size, overlap);
            }
        }
    }

    #[test]
    fn test_no_separator_in_text() {
        let text = "abcdefghij";
        let spans = chunker(4, 1).split(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, text);
    }

    #[test]
    fn test_empty_separator_splits_characters() {
        let c = Chunker::new(ChunkerConfig {
            chunk_size: 4,
            chunk_overlap: 1,
            separator: String::new(),
        })
        .unwrap();
        let spans = c.split("abcdefghij");
        assert_eq!(
            spans.iter().map(|s| s.content.as_str()).collect::<Vec<_>>(),
            vec!["abcd", "defg", "ghij"]
        );
    }

    #[test]
    fn test_multibyte_offsets_are_characters() {
        let text = "héllo wörld\nçava ñandú\nüber straße\n";
        let spans = chunker(14, 3).split(text);
        assert_well_formed(text, &spans, 14, 3);
        assert_eq!(spans[0].content, "héllo wörld\n");
        assert_eq!(spans[1].content, "ld\nçava ñandú\n");
    }

    #[test]
    fn test_deterministic() {
        let text = "lorem ipsum\n".repeat(40);
        let c = chunker(50, 10);
        assert_eq!(c.split(&text), c.split(&text));
    }

    #[test]
    fn test_no_data_loss_many_sizes() {
        let text = "The quick brown fox\njumps over\n\nthe lazy dog.\nA\nBB\nCCC\n".repeat(7);
        for size in [5, 8, 13, 21, 34, 55, 1000] {
            for overlap in [0, 1, 3, 4] {
                let spans = chunker(size, overlap).split(&text);
                assert_well_formed(&text, &spans, size, overlap);
            }
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(Chunker::new(ChunkerConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            separator: "\n".into()
        })
        .is_err());
        assert!(Chunker::new(ChunkerConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            separator: "\n".into()
        })
        .is_err());
    }

    #[test]
    fn test_split_document_numbers_across_segments() {
        let doc = Document::new(
            "report.pdf",
            docchat_core::DocumentFormat::Pdf,
            vec![
                Segment::new("page one\nmore one").with_metadata("page", serde_json::json!(1)),
                Segment::new(""),
                Segment::new("page two").with_metadata("page", serde_json::json!(2)),
            ],
        );
        let chunks = chunker(9, 0).split_document(&doc);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[2].segment, 2);
        assert_eq!(chunks[2].metadata["page"], serde_json::json!(2));
        assert_eq!(chunks[0].metadata["source"], serde_json::json!("report.pdf"));
        assert!(chunks.iter().all(|c| c.document_id == doc.id));
    }
}
