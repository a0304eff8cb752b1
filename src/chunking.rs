/// Represents a bounded span of extracted document text, the unit of
/// embedding and retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Starting position of this chunk in the source text, in characters
    pub start_position: usize,
}

/// Target chunk size in characters
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between consecutive chunks
pub const CHUNK_OVERLAP: usize = 200;

/// Split text into fixed-size chunks with a fixed overlap.
pub fn split_into_chunks(text: &str) -> Vec<TextChunk> {
    split_with_limits(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

/// Sliding-window splitter over characters (not bytes, so multi-byte
/// UTF-8 input never splits inside a scalar value).
///
/// The window advances by `size - overlap` characters, so every adjacent
/// pair of chunks shares exactly `overlap` characters and concatenating
/// the chunks minus their overlapping prefixes reconstructs the input.
/// Input no longer than `size` yields a single chunk; empty input yields
/// none (chunks are never empty).
pub fn split_with_limits(text: &str, size: usize, overlap: usize) -> Vec<TextChunk> {
    debug_assert!(size > 0 && overlap < size);

    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, so slicing stays valid UTF-8.
    let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = boundaries.len();
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + size).min(total_chars);
        let byte_start = boundaries[start];
        let byte_end = if end == total_chars {
            text.len()
        } else {
            boundaries[end]
        };

        chunks.push(TextChunk {
            text: text[byte_start..byte_end].to_string(),
            start_position: start,
        });

        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input_single_chunk() {
        let chunks = split_into_chunks("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_position, 0);
    }

    #[test]
    fn test_input_exactly_chunk_size() {
        let text = "a".repeat(CHUNK_SIZE);
        let chunks = split_into_chunks(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), CHUNK_SIZE);
    }

    #[test]
    fn test_empty_input_no_chunks() {
        assert!(split_into_chunks("").is_empty());
    }

    #[test]
    fn test_adjacent_chunks_share_exact_overlap() {
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split_into_chunks(&text);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].text.chars().count() - CHUNK_OVERLAP)
                .collect();
            let next_head: String = pair[1].text.chars().take(CHUNK_OVERLAP).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn test_concatenation_reconstructs_input() {
        let text: String = (0..3217).map(|i| char::from(b'A' + (i % 26) as u8)).collect();
        let chunks = split_into_chunks(&text);

        let mut rebuilt = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.text.chars().skip(CHUNK_OVERLAP));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_no_empty_chunks() {
        let text = "x".repeat(1001);
        let chunks = split_into_chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
        // trailing chunk keeps the overlap plus the one extra character
        assert_eq!(chunks[1].text.chars().count(), CHUNK_OVERLAP + 1);
    }

    #[test]
    fn test_multibyte_input_splits_on_char_boundaries() {
        let text: String = "日本語のテキスト ".chars().cycle().take(1500).collect();
        let chunks = split_into_chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), CHUNK_SIZE);
        assert_eq!(chunks[1].start_position, CHUNK_SIZE - CHUNK_OVERLAP);
    }

    #[test]
    fn test_deterministic() {
        let text = "lorem ipsum dolor sit amet ".repeat(100);
        let first = split_into_chunks(&text);
        let second = split_into_chunks(&text);
        assert_eq!(first, second);
    }

    #[test]
    fn test_start_positions_advance_by_step() {
        let text = "z".repeat(4000);
        let chunks = split_into_chunks(&text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.start_position, i * (CHUNK_SIZE - CHUNK_OVERLAP));
        }
    }
}
