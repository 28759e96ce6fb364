//! Text chunking. All sizes are measured in characters, not bytes.

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            sentence_aware: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split `text` into chunks of at most `chunk_size` characters.
    ///
    /// Whitespace-only chunks are dropped.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chunk_size = self.config.chunk_size.max(1);

        let chunks = if self.config.sentence_aware {
            split_at_sentences(text, chunk_size, self.config.chunk_overlap)
        } else {
            split_chars(text, chunk_size, self.config.chunk_overlap)
        };

        chunks
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        current.push(chars[i]);

        // Paragraph breaks
        if chars[i] == '\n' && i + 1 < chars.len() && chars[i + 1] == '\n' {
            current.push(chars[i + 1]);
            i += 1;
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        }
        // Sentence endings followed by whitespace
        else if matches!(chars[i], '.' | '?' | '!')
            && i + 1 < chars.len()
            && chars[i + 1] == ' '
            && !current.trim().is_empty()
        {
            sentences.push(std::mem::take(&mut current));
        }

        i += 1;
    }

    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Character windows of at most `chunk_size` that end on the last sentence
/// boundary inside the window, or are hard-cut when there is none.
///
/// Each window starts `chunk_overlap` characters before the previous one ended,
/// so consecutive chunks always share that many characters.
fn split_at_sentences(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let overlap = chunk_overlap.min(chunk_size - 1);
    let boundaries: Vec<usize> = split_sentences(text)
        .iter()
        .scan(0, |end, s| {
            *end += s.chars().count();
            Some(*end)
        })
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let limit = (start + chunk_size).min(chars.len());
        let end = if limit == chars.len() {
            limit
        } else {
            boundaries
                .iter()
                .rev()
                .find(|&&b| b <= limit && b > start + overlap)
                .copied()
                .unwrap_or(limit)
        };
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }

    chunks
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, chunk_overlap: usize, sentence_aware: bool) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
            sentence_aware,
        })
    }

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        let s = TextSplitter::new(SplitterConfig::default());
        assert!(s.split("").is_empty());
        assert!(s.split(" \n\n ").is_empty());
    }

    #[test]
    fn text_smaller_than_chunk_is_single_chunk() {
        let chunks = splitter(1000, 100, true).split("Short text.");
        assert_eq!(chunks, vec!["Short text."]);
    }

    #[test]
    fn sentence_aware_splitting() {
        let text = "First sentence. Second sentence. Third sentence.";
        let chunks = splitter(20, 5, true).split(text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn long_sentence_is_hard_split_with_overlap() {
        let text = "a".repeat(45);
        let chunks = splitter(10, 2, true).split(&text);
        assert_eq!(chunks.len(), 6);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn sentence_aware_hard_split_keeps_overlap() {
        let chunks = splitter(10, 3, true).split("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]);
    }

    #[test]
    fn long_sentences_share_overlap_across_chunks() {
        let sentence = "The return window is thirty days from delivery for all unopened items. ";
        let text = sentence.repeat(12);
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 50).collect();
            assert!(pair[1].starts_with(&tail), "{:?} / {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn sentence_aware_prefers_sentence_boundaries() {
        let chunks = splitter(20, 0, true).split("First one. Second one. Third.");
        assert_eq!(chunks, vec!["First one.", " Second one. Third."]);
    }

    #[test]
    fn char_splitting_with_overlap() {
        let chunks = splitter(10, 3, false).split("abcdefghijklmnopqrstuvwxyz");
        assert!(chunks.len() > 1);
        assert_eq!(&chunks[0][7..10], &chunks[1][..3]);
    }

    #[test]
    fn char_split_stops_at_end_of_text() {
        let chunks = split_chars("abcdefghij", 5, 3);
        assert_eq!(chunks, vec!["abcde", "cdefg", "efghi", "ghij"]);
    }

    #[test]
    fn char_split_counts_characters_not_bytes() {
        let chunks = split_chars("ééééé", 2, 0);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn char_split_full_overlap_makes_progress() {
        let chunks = split_chars("abcde", 3, 3);
        assert_eq!(chunks[0], "abc");
        assert_eq!(chunks.last().unwrap(), "cde");
    }

    #[test]
    fn paragraph_break_splitting() {
        assert_eq!(split_sentences("First paragraph.\n\nSecond paragraph.").len(), 2);
    }

    #[test]
    fn question_and_exclamation_split() {
        assert_eq!(split_sentences("Is this a question? Yes it is.").len(), 2);
        assert_eq!(split_sentences("Wow! Amazing.").len(), 2);
    }

    #[test]
    fn sentence_overlap_repeats_previous_tail() {
        let chunks = splitter(12, 6, true).split("Aa. Bb. Cc. Dd. Ee.");
        assert_eq!(chunks, vec!["Aa. Bb. Cc.", "b. Cc. Dd.", "c. Dd. Ee."]);
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn split_never_panics(
                content in "\\PC{0,3000}",
                chunk_size in 1usize..2000,
                chunk_overlap in 0usize..500,
                sentence_aware in proptest::bool::ANY,
            ) {
                let _ = splitter(chunk_size, chunk_overlap, sentence_aware).split(&content);
            }

            #[test]
            fn chunks_never_exceed_chunk_size(
                content in "[a-zé .!?\n]{1,1500}",
                chunk_size in 1usize..300,
                chunk_overlap in 0usize..100,
                sentence_aware in proptest::bool::ANY,
            ) {
                let chunks = splitter(chunk_size, chunk_overlap, sentence_aware).split(&content);
                for chunk in &chunks {
                    prop_assert!(chunk.chars().count() <= chunk_size);
                    prop_assert!(!chunk.trim().is_empty());
                }
            }

            #[test]
            fn char_chunks_cover_all_content(
                content in "[a-z]{1,500}",
                chunk_size in 1usize..200,
                chunk_overlap in 0usize..50,
            ) {
                let chunks = splitter(chunk_size, chunk_overlap, false).split(&content);
                prop_assert!(!chunks.is_empty());
                prop_assert!(content.starts_with(chunks[0].as_str()));
                prop_assert!(content.ends_with(chunks.last().unwrap().as_str()));
                let total: usize = chunks.iter().map(String::len).sum();
                prop_assert!(total >= content.len());
            }

            #[test]
            fn consecutive_chunks_share_overlap(
                content in "([a-z]{1,40}[.!?] ){1,40}[a-z]{1,10}",
                chunk_size in 10usize..200,
                chunk_overlap in 1usize..50,
                sentence_aware in proptest::bool::ANY,
            ) {
                let chunks = splitter(chunk_size, chunk_overlap, sentence_aware).split(&content);
                let overlap = chunk_overlap.min(chunk_size - 1);
                for pair in chunks.windows(2) {
                    let len = pair[0].chars().count();
                    prop_assert!(len > overlap);
                    let tail: String = pair[0].chars().skip(len - overlap).collect();
                    prop_assert!(pair[1].starts_with(&tail));
                }
            }

            #[test]
            fn splitting_is_deterministic(content in "[a-z. ]{0,800}", chunk_size in 5usize..100) {
                let s = splitter(chunk_size, chunk_size / 4, true);
                prop_assert_eq!(s.split(&content), s.split(&content));
            }
        }
    }
}
