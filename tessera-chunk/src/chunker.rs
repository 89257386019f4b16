//! Boundary-aware document chunking.
//!
//! [`OptimizedChunker`] turns raw prose into retrieval-sized segments. It
//! classifies the document with [`DocumentClassifier`], picks the matching
//! [`ChunkConfig`], and dispatches to a type-specific splitting strategy:
//!
//! - **Structured** documents are scanned line by line and broken ahead of
//!   list or heading markers once a chunk fills up.
//! - **Legal** documents are broken at article/section markers, with oversized
//!   runs re-split at sentence boundaries.
//! - Everything else goes through a generic sliding window that prefers
//!   paragraph breaks, then sentence terminators, then word boundaries, and
//!   finally a hard cut.
//!
//! Chunking degrades gracefully: empty input yields an empty chunk list, and
//! every boundary heuristic falls back to a fixed-size cut rather than an
//! error.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{DocumentClassifier, DocumentType};
use crate::config::ChunkConfig;

/// Summary of a chunking run, returned alongside the chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_type: DocumentType,
    pub chunk_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub avg_chunk_length: f64,
    pub min_chunk_length: usize,
    pub max_chunk_length: usize,
}

/// Markers that open a new section in legal prose.
const SECTION_MARKER_PATTERN: &str = r"(?i)\b(?:article|section|clause|chapter|annex)\s+\d+";

/// Sentence terminator followed by whitespace.
const SENTENCE_BREAK_PATTERN: &str = r"[.!?]\s+";

/// Line-start markers that open a list item or heading.
const LINE_MARKER_PATTERNS: &[&str] = &[
    r"^\s*\d+\.\s+",
    r"^\s*[a-z]\)\s+",
    r"^\s*[-•*]\s+",
    r"^\s*#{1,6}\s+",
];

/// Document chunker with type-aware boundary selection.
///
/// # Example
///
/// ```
/// use tessera_chunk::OptimizedChunker;
///
/// let chunker = OptimizedChunker::new();
/// let (chunks, metadata) = chunker.chunk("A short note.", None, None);
/// assert_eq!(chunks, vec!["A short note.".to_string()]);
/// assert_eq!(metadata.chunk_count, 1);
/// ```
pub struct OptimizedChunker {
    classifier: DocumentClassifier,
    configs: HashMap<DocumentType, ChunkConfig>,
    section_markers: Regex,
    sentence_breaks: Regex,
    line_markers: Vec<Regex>,
}

impl Default for OptimizedChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizedChunker {
    /// Create a chunker with the per-type default configurations.
    ///
    /// # Panics
    ///
    /// Panics if the built-in boundary patterns fail to compile, which would
    /// be a defect in this crate rather than a runtime condition.
    pub fn new() -> Self {
        let configs = [
            DocumentType::Legal,
            DocumentType::Technical,
            DocumentType::Narrative,
            DocumentType::Structured,
            DocumentType::Mixed,
            DocumentType::Unknown,
        ]
        .into_iter()
        .map(|doc_type| (doc_type, ChunkConfig::for_document_type(doc_type)))
        .collect();

        Self {
            classifier: DocumentClassifier::new(),
            configs,
            section_markers: Regex::new(SECTION_MARKER_PATTERN).unwrap(),
            sentence_breaks: Regex::new(SENTENCE_BREAK_PATTERN).unwrap(),
            line_markers: LINE_MARKER_PATTERNS
                .iter()
                .map(|&pattern| Regex::new(pattern).unwrap())
                .collect(),
        }
    }

    /// The configuration that will be used for a given document type.
    pub fn config_for(&self, doc_type: DocumentType) -> &ChunkConfig {
        self.configs
            .get(&doc_type)
            .unwrap_or_else(|| &self.configs[&DocumentType::Unknown])
    }

    /// Replace the configuration for a document type.
    pub fn set_config(&mut self, doc_type: DocumentType, config: ChunkConfig) {
        info!(document_type = %doc_type, "updated chunking config");
        self.configs.insert(doc_type, config);
    }

    /// Split `content` into retrieval chunks.
    ///
    /// The document type is classified from the content (and optional
    /// filename) and selects both the splitting strategy and the default
    /// configuration; `custom_config` overrides the configuration parameters
    /// while keeping the classified strategy. Returns the chunks and a
    /// [`ChunkMetadata`] summary. Never fails: empty input returns an empty
    /// chunk list.
    pub fn chunk(
        &self,
        content: &str,
        filename: Option<&str>,
        custom_config: Option<&ChunkConfig>,
    ) -> (Vec<String>, ChunkMetadata) {
        let doc_type = self.classifier.classify(content, filename);
        let config = custom_config
            .cloned()
            .unwrap_or_else(|| self.config_for(doc_type).clone());

        debug!(
            document_type = %doc_type,
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            content_length = content.len(),
            "chunking document"
        );

        if content.trim().is_empty() {
            return (Vec::new(), Self::metadata(doc_type, &config, &[]));
        }

        let raw = match doc_type {
            DocumentType::Structured => self.chunk_structured(content, &config),
            DocumentType::Legal => self.chunk_legal(content, &config),
            _ => Self::chunk_windowed(content, &config),
        };

        let mut chunks: Vec<String> = raw
            .into_iter()
            .filter(|chunk| chunk.trim().len() >= config.min_chunk_size)
            .collect();

        // An input shorter than min_chunk_size still comes back as a single
        // undersized chunk rather than an empty list.
        if chunks.is_empty() {
            chunks = vec![content.to_string()];
        }

        if let Some(max) = config.max_chunk_size {
            for chunk in &mut chunks {
                if chunk.len() > max {
                    chunk.truncate(floor_char_boundary(chunk, max));
                }
            }
        }

        // Overlap is applied after truncation and is deliberately not
        // re-clamped to max_chunk_size.
        let chunks = apply_overlap(chunks, config.chunk_overlap);
        let metadata = Self::metadata(doc_type, &config, &chunks);

        info!(
            document_type = %doc_type,
            chunk_count = chunks.len(),
            avg_chunk_length = metadata.avg_chunk_length,
            "document chunked"
        );

        (chunks, metadata)
    }

    fn metadata(doc_type: DocumentType, config: &ChunkConfig, chunks: &[String]) -> ChunkMetadata {
        let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.len()).collect();
        ChunkMetadata {
            document_type: doc_type,
            chunk_count: chunks.len(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            avg_chunk_length: if lengths.is_empty() {
                0.0
            } else {
                lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
            },
            min_chunk_length: lengths.iter().copied().min().unwrap_or(0),
            max_chunk_length: lengths.iter().copied().max().unwrap_or(0),
        }
    }

    /// Line scan that starts a new chunk ahead of a list/heading marker once
    /// the current chunk exceeds the configured size.
    fn chunk_structured(&self, content: &str, config: &ChunkConfig) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for line in content.lines() {
            let starts_structure = self
                .line_markers
                .iter()
                .any(|marker| marker.is_match(line));

            if starts_structure
                && !current.trim().is_empty()
                && current.len() + line.len() > config.chunk_size
            {
                chunks.push(current.trim().to_string());
                current.clear();
            }
            current.push_str(line);
            current.push('\n');
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    /// Split at article/section markers; a run that outgrows the chunk size
    /// is re-split at sentence boundaries, keeping as many whole sentences as
    /// fit.
    fn chunk_legal(&self, content: &str, config: &ChunkConfig) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for (is_marker, segment) in self.split_keeping_markers(content) {
            if segment.trim().is_empty() {
                continue;
            }

            if is_marker && current.len() > config.chunk_size / 2 {
                if !current.trim().is_empty() {
                    chunks.push(current.trim().to_string());
                }
                current = format!("{segment} ");
                continue;
            }

            current.push_str(segment);

            if current.len() > config.chunk_size {
                let sentences = self.split_sentences(&current);
                if sentences.len() > 1 {
                    let mut kept: Vec<String> = Vec::new();
                    let mut rest: Vec<String> = Vec::new();
                    let mut size = 0usize;
                    for sentence in sentences {
                        if kept.is_empty() || size + sentence.len() <= config.chunk_size {
                            size += sentence.len();
                            kept.push(sentence);
                        } else {
                            rest.push(sentence);
                        }
                    }
                    if !kept.is_empty() {
                        chunks.push(kept.join(" "));
                    }
                    current = rest.join(" ");
                }
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    /// Alternating (text, marker, text, ...) segments with markers tagged.
    fn split_keeping_markers<'a>(&self, content: &'a str) -> Vec<(bool, &'a str)> {
        let mut segments = Vec::new();
        let mut last = 0;
        for found in self.section_markers.find_iter(content) {
            if found.start() > last {
                segments.push((false, &content[last..found.start()]));
            }
            segments.push((true, found.as_str()));
            last = found.end();
        }
        if last < content.len() {
            segments.push((false, &content[last..]));
        }
        segments
    }

    /// Split text after sentence terminators, keeping the terminator.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut last = 0;
        for found in self.sentence_breaks.find_iter(text) {
            // The terminator is a single ASCII char at the match start.
            let end = found.start() + 1;
            if end > last {
                sentences.push(text[last..end].to_string());
            }
            last = found.end();
        }
        if last < text.len() {
            sentences.push(text[last..].to_string());
        }
        sentences.retain(|sentence| !sentence.trim().is_empty());
        sentences
    }

    /// Generic sliding-window split: paragraph break, else sentence
    /// terminator past the midpoint, else word boundary past the midpoint,
    /// else a hard cut at `chunk_size`. The window advances by
    /// `end - chunk_overlap`, clamped so it always makes forward progress.
    fn chunk_windowed(content: &str, config: &ChunkConfig) -> Vec<String> {
        if content.len() <= config.chunk_size {
            return vec![content.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < content.len() {
            let mut end = floor_char_boundary(content, start + config.chunk_size);
            if end <= start {
                end = next_char_boundary(content, start + 1);
            }
            if end >= content.len() {
                chunks.push(content[start..].to_string());
                break;
            }

            let window = &content[start..end];
            let mut cut: Option<usize> = None;

            if config.paragraph_boundary {
                if let Some(pos) = window.rfind("\n\n") {
                    // A break in the first third of the window is too early.
                    if pos >= config.chunk_size / 3 {
                        cut = Some(pos + 1);
                    }
                }
            }

            if cut.is_none() && config.sentence_boundary {
                for terminator in [". ", "! ", "? "] {
                    if let Some(pos) = window.rfind(terminator) {
                        if pos > config.chunk_size / 2 {
                            cut = Some(pos + terminator.len());
                            break;
                        }
                    }
                }
            }

            if cut.is_none() {
                if let Some(pos) = window.rfind(' ') {
                    if pos >= config.chunk_size / 2 {
                        cut = Some(pos + 1);
                    }
                }
            }

            let actual_end = match cut {
                Some(relative) => start + relative,
                None => end,
            };
            chunks.push(content[start..actual_end].to_string());

            let mut next = floor_char_boundary(
                content,
                actual_end.saturating_sub(config.chunk_overlap),
            );
            if next <= start {
                next = actual_end;
            }
            start = next;
        }

        chunks
    }
}

/// Prepend the trailing `overlap` characters of each chunk to its successor,
/// unless the successor already starts with that text. The first chunk is
/// unchanged, and overlap text is always taken from the pre-overlap chunks.
fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if chunks.len() <= 1 || overlap == 0 {
        return chunks;
    }

    let tails: Vec<String> = chunks
        .iter()
        .map(|chunk| {
            if chunk.len() > overlap {
                let start = floor_char_boundary(chunk, chunk.len() - overlap);
                chunk[start..].to_string()
            } else {
                chunk.clone()
            }
        })
        .collect();

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            if index == 0 {
                return chunk;
            }
            let tail = &tails[index - 1];
            // Windowed chunks already begin with the exact tail (the window
            // advances by end - overlap), so test the untrimmed form too or
            // a tail with leading whitespace gets prepended twice.
            if chunk.starts_with(tail.as_str()) || chunk.starts_with(tail.trim()) {
                chunk
            } else {
                format!("{tail} {chunk}")
            }
        })
        .collect()
}

/// Largest index `<= at` that lies on a char boundary.
fn floor_char_boundary(text: &str, at: usize) -> usize {
    if at >= text.len() {
        return text.len();
    }
    let mut index = at;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest index `>= at` that lies on a char boundary.
fn next_char_boundary(text: &str, at: usize) -> usize {
    if at >= text.len() {
        return text.len();
    }
    let mut index = at;
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> OptimizedChunker {
        OptimizedChunker::new()
    }

    fn narrative_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} talks about the journey through the valley. "))
            .collect()
    }

    #[test]
    fn test_short_text_returns_single_unmodified_chunk() {
        let (chunks, metadata) = chunker().chunk("short text", None, None);
        assert_eq!(chunks, vec!["short text".to_string()]);
        assert_eq!(metadata.chunk_count, 1);
    }

    #[test]
    fn test_empty_content_returns_empty_chunk_list() {
        let (chunks, metadata) = chunker().chunk("", None, None);
        assert!(chunks.is_empty());
        assert_eq!(metadata.chunk_count, 0);
        assert_eq!(metadata.avg_chunk_length, 0.0);
    }

    #[test]
    fn test_chunking_is_idempotent() {
        let text = narrative_text(80);
        let chunker = chunker();
        let (first_chunks, first_meta) = chunker.chunk(&text, Some("story.txt"), None);
        let (second_chunks, second_meta) = chunker.chunk(&text, Some("story.txt"), None);
        assert_eq!(first_chunks, second_chunks);
        assert_eq!(first_meta, second_meta);
    }

    #[test]
    fn test_windowed_split_produces_multiple_chunks() {
        let text = narrative_text(120);
        let (chunks, metadata) = chunker().chunk(&text, None, None);
        assert!(chunks.len() > 1, "expected multiple chunks, got {}", chunks.len());
        assert_eq!(metadata.chunk_count, chunks.len());
        assert!(metadata.max_chunk_length >= metadata.min_chunk_length);
    }

    #[test]
    fn test_minimum_size_law() {
        let config = ChunkConfig::new(1000, 200).unwrap().with_min_chunk_size(100);
        let text = narrative_text(120);
        let (chunks, _) = chunker().chunk(&text, None, Some(&config));
        for chunk in &chunks {
            assert!(
                chunk.trim().len() >= 100,
                "chunk below min size: {:?}",
                chunk.len()
            );
        }

        // Whole input below min size still yields one undersized chunk.
        let (chunks, metadata) = chunker().chunk("tiny", None, Some(&config));
        assert_eq!(chunks, vec!["tiny".to_string()]);
        assert_eq!(metadata.chunk_count, 1);
    }

    #[test]
    fn test_overlap_law() {
        let text = narrative_text(150);
        let (chunks, metadata) = chunker().chunk(&text, None, None);
        assert!(chunks.len() > 1);
        let overlap = metadata.chunk_overlap;
        for pair in chunks.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            if prev.len() > overlap {
                let tail = &prev[floor_char_boundary(prev, prev.len() - overlap)..];
                assert!(
                    next.starts_with(tail.trim()) || next.starts_with(tail),
                    "successor does not carry the trailing overlap"
                );
            }
        }
    }

    #[test]
    fn test_overlap_is_not_duplicated_when_tail_starts_with_whitespace() {
        // Fixed-width unique tokens with an overlap that lands on a space,
        // so every carried tail begins with whitespace.
        let text: String = (0..200).map(|i| format!("w{i:04} ")).collect();
        let config = ChunkConfig::new(100, 19).unwrap().with_min_chunk_size(10);
        let (chunks, _) = chunker().chunk(&text, None, Some(&config));
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            if prev.len() <= 19 {
                continue;
            }
            let tail = &prev[floor_char_boundary(prev, prev.len() - 19)..];
            assert!(next.starts_with(tail), "successor lost its overlap");
            // Tokens are unique, so the tail reappearing right after itself
            // can only mean it was prepended onto a chunk that already
            // carried it.
            let rest = &next[tail.len()..];
            assert!(
                !rest.trim_start().starts_with(tail.trim_start()),
                "overlap text duplicated at chunk start: {next:?}"
            );
        }
    }

    #[test]
    fn test_max_chunk_size_truncates_before_overlap() {
        let config = ChunkConfig::new(400, 50)
            .unwrap()
            .with_min_chunk_size(10)
            .with_max_chunk_size(200);
        let text = narrative_text(60);
        let (chunks, _) = chunker().chunk(&text, None, Some(&config));
        assert!(!chunks.is_empty());
        // The first chunk saw no overlap prepension, so the cap holds exactly.
        assert!(chunks[0].len() <= 200);
        // Later chunks may exceed the cap by the prepended overlap text.
        for chunk in &chunks[1..] {
            assert!(chunk.len() <= 200 + 50 + 1);
        }
    }

    #[test]
    fn test_structured_chunks_break_at_markers() {
        let mut text = String::from("# Inventory\n\n");
        for i in 0..120 {
            text.push_str(&format!(
                "{}. item number {} with a reasonably descriptive label attached\n",
                i + 1,
                i + 1
            ));
        }
        let chunker = chunker();
        let (chunks, metadata) = chunker.chunk(&text, None, None);
        assert_eq!(metadata.document_type, DocumentType::Structured);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_legal_chunks_split_at_section_markers() {
        let mut text = String::new();
        for i in 1..=12 {
            text.push_str(&format!(
                "Article {i} The parties agree that the obligations described herein \
                 remain binding under the governing law. The agreement covers \
                 liability, warranty, and indemnity for all deliverables in scope. \
                 Each party shall act pursuant to the terms set out in this clause. "
            ));
        }
        let chunker = chunker();
        let (chunks, metadata) = chunker.chunk(&text, Some("master_agreement.txt"), None);
        assert_eq!(metadata.document_type, DocumentType::Legal);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_custom_config_overrides_parameters() {
        let config = ChunkConfig::new(200, 20).unwrap().with_min_chunk_size(10);
        let text = narrative_text(40);
        let (small_chunks, metadata) = chunker().chunk(&text, None, Some(&config));
        assert_eq!(metadata.chunk_size, 200);
        let (default_chunks, _) = chunker().chunk(&text, None, None);
        assert!(small_chunks.len() > default_chunks.len());
    }

    #[test]
    fn test_multibyte_content_does_not_panic() {
        let text = "Ein Abschnitt über die Straße. ".repeat(100);
        let (chunks, _) = chunker().chunk(&text, None, None);
        assert!(!chunks.is_empty());
        let cyrillic = "Документ содержит длинный абзац текста без разметки. ".repeat(100);
        let (chunks, _) = chunker().chunk(&cyrillic, None, None);
        assert!(!chunks.is_empty());
    }
}
