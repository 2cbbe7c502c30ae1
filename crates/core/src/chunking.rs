use crate::error::ChunkingError;
use crate::models::Chunk;
use std::ops::Range;

/// Split boundaries from coarsest to finest. The empty string means "any char boundary".
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n=== Document:", "\n\n", "\n", " ", ""];

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 80_000;
pub const DEFAULT_OVERLAP_CHARS: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub separators: &'static [&'static str],
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHUNK_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
            separators: DEFAULT_SEPARATORS,
        }
    }
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        Self {
            max_chars,
            overlap_chars,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.max_chars == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if self.overlap_chars >= self.max_chars {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: self.overlap_chars,
                max: self.max_chars,
            });
        }
        Ok(())
    }

    fn body_budget(&self) -> usize {
        self.max_chars - self.overlap_chars
    }
}

/// Splits `text` into ordered chunks of at most `config.max_chars` chars.
///
/// Bodies partition the text exactly and are at most `max_chars - overlap_chars`
/// long. Every chunk after the first is prefixed with up to `overlap_chars` of its
/// predecessor's tail, so each chunk is a contiguous slice of the input. Empty
/// input yields no chunks.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>, ChunkingError> {
    config.validate()?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut bodies = Vec::new();
    split_recursive(text, 0, config.separators, config.body_budget(), &mut bodies);

    let total_chunks = bodies.len();
    let mut chunks = Vec::with_capacity(total_chunks);
    let mut previous_start = 0;

    for (index, body) in bodies.into_iter().enumerate() {
        let (start, overlap_chars) = if index == 0 {
            (body.start, 0)
        } else {
            let body_chars = char_len(&text[body.clone()]);
            let wanted = config
                .overlap_chars
                .min(config.max_chars.saturating_sub(body_chars));
            tail_start(text, previous_start, body.start, wanted)
        };

        chunks.push(Chunk {
            index,
            total_chunks,
            text: text[start..body.end].to_string(),
            overlap_chars,
        });
        previous_start = start;
    }

    Ok(chunks)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_recursive(
    text: &str,
    base: usize,
    separators: &[&str],
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    if char_len(text) <= budget {
        out.push(base..base + text.len());
        return;
    }

    let Some(position) = separators
        .iter()
        .position(|separator| separator.is_empty() || text.contains(separator))
    else {
        hard_split(text, base, budget, out);
        return;
    };

    let separator = separators[position];
    if separator.is_empty() {
        hard_split(text, base, budget, out);
        return;
    }

    let finer = &separators[position + 1..];
    // (start, end, chars) of the group being merged, relative to `text`
    let mut current: Option<(usize, usize, usize)> = None;

    for (start, piece) in split_keeping_separator(text, separator) {
        let end = start + piece.len();
        let piece_chars = char_len(piece);

        if piece_chars > budget {
            if let Some((group_start, group_end, _)) = current.take() {
                out.push(base + group_start..base + group_end);
            }
            split_recursive(piece, base + start, finer, budget, out);
            continue;
        }

        current = match current {
            Some((group_start, _, group_chars)) if group_chars + piece_chars <= budget => {
                Some((group_start, end, group_chars + piece_chars))
            }
            Some((group_start, group_end, _)) => {
                out.push(base + group_start..base + group_end);
                Some((start, end, piece_chars))
            }
            None => Some((start, end, piece_chars)),
        };
    }

    if let Some((group_start, group_end, _)) = current {
        out.push(base + group_start..base + group_end);
    }
}

/// Cuts before every occurrence of `separator`, so it leads the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (position, _) in text.match_indices(separator) {
        if position > start {
            pieces.push((start, &text[start..position]));
            start = position;
        }
    }

    pieces.push((start, &text[start..]));
    pieces
}

fn hard_split(text: &str, base: usize, budget: usize, out: &mut Vec<Range<usize>>) {
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == budget {
            out.push(base + start..base + offset);
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        out.push(base + start..base + text.len());
    }
}

/// Walks back from `end` over at most `wanted` chars without crossing `floor`.
fn tail_start(text: &str, floor: usize, end: usize, wanted: usize) -> (usize, usize) {
    let mut start = end;
    let mut taken = 0;

    for (offset, _) in text[floor..end].char_indices().rev() {
        if taken == wanted {
            break;
        }
        start = floor + offset;
        taken += 1;
    }

    (start, taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bodies(chunks: &[Chunk]) -> String {
        chunks.iter().map(Chunk::body).collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() -> Result<(), ChunkingError> {
        let chunks = split_text("", &ChunkingConfig::new(10, 2))?;
        assert!(chunks.is_empty());
        Ok(())
    }

    #[test]
    fn short_text_is_a_single_chunk() -> Result<(), ChunkingError> {
        let chunks = split_text("hello world", &ChunkingConfig::new(100, 10))?;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].overlap_chars, 0);
        Ok(())
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert_eq!(
            split_text("abc", &ChunkingConfig::new(0, 0)),
            Err(ChunkingError::ZeroChunkSize)
        );
        assert_eq!(
            split_text("abc", &ChunkingConfig::new(5, 5)),
            Err(ChunkingError::OverlapTooLarge { overlap: 5, max: 5 })
        );
    }

    #[test]
    fn document_marker_is_preferred_over_paragraphs() -> Result<(), ChunkingError> {
        let text = "intro line\n\n=== Document: a\nalpha alpha\n\n=== Document: b\nbeta beta";
        let chunks = split_text(text, &ChunkingConfig::new(30, 0))?;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "intro line");
        assert!(chunks[1].text.starts_with("\n\n=== Document: a"));
        assert!(chunks[2].text.starts_with("\n\n=== Document: b"));
        assert_eq!(bodies(&chunks), text);
        Ok(())
    }

    #[test]
    fn long_words_fall_back_to_char_boundaries() -> Result<(), ChunkingError> {
        let text = "אבגדהוזחטיכלמנסעפצקרשת";
        let chunks = split_text(text, &ChunkingConfig::new(5, 1))?;

        assert!(chunks.iter().all(|chunk| chunk.char_len() <= 5));
        assert_eq!(bodies(&chunks), text);
        assert_eq!(chunks[1].overlap_chars, 1);
        Ok(())
    }

    #[test]
    fn chunk_indices_are_ordered_and_totals_agree() -> Result<(), ChunkingError> {
        let text = "one two three four five six seven eight nine ten ".repeat(20);
        let chunks = split_text(&text, &ChunkingConfig::new(40, 10))?;

        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
            assert_eq!(chunk.total_chunks, chunks.len());
        }
        Ok(())
    }

    #[test]
    fn million_char_document_with_large_overlap() -> Result<(), ChunkingError> {
        let text: String = "lorem ipsum dolor sit amet consectetur "
            .repeat(30_000)
            .chars()
            .take(1_000_000)
            .collect();
        let config = ChunkingConfig::new(80_000, 20_000);
        let chunks = split_text(&text, &config)?;

        assert!(chunks.len() >= 13, "got {} chunks", chunks.len());
        assert!(chunks.iter().all(|chunk| chunk.char_len() <= 80_000));

        for pair in chunks.windows(2) {
            let previous = &pair[0].text;
            let tail = &previous[previous.len() - 20_000..];
            assert_eq!(pair[1].overlap_chars, 20_000);
            assert!(pair[1].text.starts_with(tail));
        }

        assert_eq!(bodies(&chunks), text);
        Ok(())
    }

    #[test]
    fn chunking_is_deterministic() -> Result<(), ChunkingError> {
        let text = "Paragraph one.\n\nParagraph two is longer.\nWith a second line.\n\nThree.";
        let config = ChunkingConfig::new(24, 6);
        assert_eq!(split_text(text, &config)?, split_text(text, &config)?);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_chunks_are_bounded_and_cover_text(
            text in "[a-z \n\u{05D0}-\u{05EA}]{0,400}",
            max in 2usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % max;
            let config = ChunkingConfig::new(max, overlap);
            let chunks = split_text(&text, &config).expect("config is valid");

            prop_assert!(chunks.iter().all(|chunk| chunk.char_len() <= max));
            prop_assert_eq!(bodies(&chunks), text.clone());

            let total: usize = chunks.iter().map(Chunk::char_len).sum();
            if overlap > 0 {
                prop_assert!(total >= text.chars().count());
            }

            prop_assert_eq!(split_text(&text, &config).expect("config is valid"), chunks);
        }
    }
}
