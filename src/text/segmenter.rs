// src/text/segmenter.rs — Split document text into bounded-size chunks
//
// Segmentation must be deterministic: resume re-derives the chunk list and
// compares its length with the persisted total before slicing.

use serde::{Deserialize, Serialize};

use crate::infra::errors::VoxbookError;

pub const DEFAULT_CHUNK_SIZE: usize = 4000;
pub const MIN_CHUNK_SIZE: usize = 1000;
pub const MAX_CHUNK_SIZE: usize = 10_000;

/// One unit of synthesis. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// Output file name for this chunk, e.g. `chunk_007.mp3`.
    pub fn file_name(&self, extension: &str) -> String {
        chunk_file_name(self.index, extension)
    }
}

pub fn chunk_file_name(index: usize, extension: &str) -> String {
    format!("chunk_{index:03}.{extension}")
}

pub fn validate_chunk_size(max_chunk_size: usize) -> Result<(), VoxbookError> {
    if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&max_chunk_size) {
        return Err(VoxbookError::ChunkSize {
            size: max_chunk_size,
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
        });
    }
    Ok(())
}

/// Split `text` into chunks of at most `max_chunk_size` characters.
pub fn segment(text: &str, max_chunk_size: usize) -> Result<Vec<String>, VoxbookError> {
    validate_chunk_size(max_chunk_size)?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(VoxbookError::Validation("text is empty".into()));
    }

    if char_len(trimmed) <= max_chunk_size {
        return Ok(vec![collapse_whitespace(trimmed)]);
    }

    let mut packer = Packer::new(max_chunk_size);
    for sentence in sentences(trimmed) {
        if char_len(&sentence) > max_chunk_size {
            packer.close();
            for word in sentence.split(' ') {
                if char_len(word) > max_chunk_size {
                    for piece in hard_split(word, max_chunk_size) {
                        packer.push(piece);
                    }
                } else {
                    packer.push(word);
                }
            }
        } else {
            packer.push(&sentence);
        }
    }

    Ok(packer.finish())
}

/// Segment and number: the form the orchestrator works with.
pub fn chunk_document(text: &str, max_chunk_size: usize) -> Result<Vec<Chunk>, VoxbookError> {
    Ok(segment(text, max_chunk_size)?
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk { index: i + 1, text })
        .collect())
}

/// Sentence candidates: split on terminal punctuation, whitespace collapsed,
/// empties dropped, a '.' re-appended to each.
fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s}."))
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hard_split(word: &str, max: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (pos, _) in word.char_indices() {
        if count == max {
            pieces.push(&word[start..pos]);
            start = pos;
            count = 0;
        }
        count += 1;
    }
    if start < word.len() {
        pieces.push(&word[start..]);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedy accumulator shared by sentence and word packing.
struct Packer {
    max: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(max: usize) -> Self {
        Self {
            max,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    fn push(&mut self, piece: &str) {
        if piece.is_empty() {
            return;
        }
        let len = char_len(piece);
        if self.current_len > 0 && self.current_len + len + 1 > self.max {
            self.close();
        }
        if self.current_len > 0 {
            self.current.push(' ');
            self.current_len += 1;
        }
        self.current.push_str(piece);
        self.current_len += len;
    }

    fn close(&mut self) {
        if self.current_len > 0 {
            self.chunks.push(std::mem::take(&mut self.current));
            self.current_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.close();
        self.chunks.retain(|c| !c.trim().is_empty());
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence_of(len: usize, n: usize) -> String {
        let prefix = format!("Sentence {n:03} ");
        let mut s = prefix.clone();
        while s.len() < len - 1 {
            s.push('x');
        }
        s
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = segment("  Hello there. General Kenobi!  ", 4000).unwrap();
        assert_eq!(chunks, vec!["Hello there. General Kenobi!".to_string()]);
    }

    #[test]
    fn test_single_chunk_whitespace_collapsed() {
        let text = "First paragraph\nwraps here.\n\n  Second\tparagraph.  ";
        let chunks = segment(text, 4000).unwrap();
        assert_eq!(
            chunks,
            vec!["First paragraph wraps here. Second paragraph.".to_string()]
        );
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            segment("", 4000),
            Err(VoxbookError::Validation(_))
        ));
        assert!(matches!(
            segment(" \n\t ", 4000),
            Err(VoxbookError::Validation(_))
        ));
    }

    #[test]
    fn test_chunk_size_bounds() {
        assert!(matches!(
            segment("text", 999),
            Err(VoxbookError::ChunkSize { .. })
        ));
        assert!(matches!(
            segment("text", 10_001),
            Err(VoxbookError::ChunkSize { .. })
        ));
        assert!(segment("text", 1000).is_ok());
        assert!(segment("text", 10_000).is_ok());
    }

    #[test]
    fn test_sentences_packed_greedily() {
        // 95 sentences of 100 chars each (99 + '.') joined by spaces.
        let text = (0..95)
            .map(|i| format!("{}.", sentence_of(100, i)))
            .collect::<Vec<_>>()
            .join(" ");
        assert!(text.len() > 9_500);

        let chunks = segment(&text, 4000).unwrap();
        assert_eq!(chunks.len(), 3);
        // 39 sentences: 39 * 100 + 38 separators
        assert_eq!(chunks[0].chars().count(), 3938);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4000));
    }

    #[test]
    fn test_long_sentence_word_split() {
        let sentence = vec!["abcde"; 1000].join(" ") + ".";
        assert_eq!(sentence.len(), 6000);

        let chunks = segment(&sentence, 4000).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 4000));
        assert!(chunks[1].ends_with("abcde."));
    }

    #[test]
    fn test_giant_word_hard_split() {
        let word = "a".repeat(4500);
        let text = format!("{word} tail. Next sentence here.");
        let chunks = segment(&text, 1000).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        let total_a: usize = chunks.iter().map(|c| c.matches('a').count()).sum();
        assert!(total_a >= 4500);
    }

    #[test]
    fn test_multibyte_counted_as_chars() {
        let text = "é".repeat(1500);
        let chunks = segment(&text, 1000).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 501);
    }

    #[test]
    fn test_punctuation_normalized_to_period() {
        let text = format!("{}! Is it? Yes", "word ".repeat(250));
        let chunks = segment(&text, 1000).unwrap();
        let joined = chunks.join(" ");
        assert!(joined.ends_with("Is it. Yes."));
    }

    #[test]
    fn test_deterministic() {
        let text = (0..300)
            .map(|i| format!("This is sentence number {i} in a long text"))
            .collect::<Vec<_>>()
            .join(". ");
        let a = segment(&text, 1500).unwrap();
        let b = segment(&text, 1500).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_document_numbering() {
        let text = vec!["abcde"; 1000].join(" ") + ".";
        let chunks = chunk_document(&text, 4000).unwrap();
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[1].index, 2);
        assert_eq!(chunks[1].file_name("mp3"), "chunk_002.mp3");
    }

    #[test]
    fn test_file_name_padding() {
        assert_eq!(chunk_file_name(7, "wav"), "chunk_007.wav");
        assert_eq!(chunk_file_name(1234, "mp3"), "chunk_1234.mp3");
    }
}
