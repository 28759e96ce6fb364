//! Budgeted, provenance-tagged context assembly.

use std::collections::HashSet;

use serde::Serialize;
use sift_memory::ScoredChunk;
use sift_search::WebSnippet;

/// Separator rendered between segments.
pub const SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Document,
    Web,
}

impl Provenance {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Web => "web",
        }
    }
}

/// One retained chunk or snippet. Text is never cut.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    pub provenance: Provenance,
    pub label: String,
    pub text: String,
}

impl Segment {
    #[must_use]
    pub fn from_chunk(hit: &ScoredChunk) -> Self {
        Self {
            id: hit.chunk.id.clone(),
            provenance: Provenance::Document,
            label: format!(
                "{} (part {}, similarity {:.2})",
                hit.chunk.source,
                hit.chunk.ordinal + 1,
                hit.score
            ),
            text: hit.chunk.text.trim().to_owned(),
        }
    }

    #[must_use]
    pub fn from_snippet(snippet: &WebSnippet) -> Self {
        let id = if snippet.url.is_empty() {
            snippet.title.clone()
        } else {
            snippet.url.clone()
        };
        Self {
            id,
            provenance: Provenance::Web,
            label: if snippet.url.is_empty() {
                snippet.title.clone()
            } else {
                format!("{} <{}>", snippet.title, snippet.url)
            },
            text: snippet.excerpt.trim().to_owned(),
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!("[{}] {}\n{}", self.provenance.tag(), self.label, self.text)
    }

    fn rendered_len(&self) -> usize {
        self.render().chars().count()
    }
}

/// Ordered segments for one query, rendered within a character budget.
#[derive(Debug, Clone, Default)]
pub struct ContextBlock {
    segments: Vec<Segment>,
    dropped: usize,
}

impl ContextBlock {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn contains(&self, provenance: Provenance) -> bool {
        self.segments.iter().any(|s| s.provenance == provenance)
    }

    /// Distinct provenance tags in the order they first appear.
    #[must_use]
    pub fn provenance(&self) -> Vec<Provenance> {
        let mut out = Vec::new();
        for s in &self.segments {
            if !out.contains(&s.provenance) {
                out.push(s.provenance);
            }
        }
        out
    }

    /// Segments removed by deduplication or the budget.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(Segment::render)
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

fn normalized_hash(text: &str) -> blake3::Hash {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    blake3::hash(normalized.as_bytes())
}

/// Merge document chunks and web snippets into a block whose rendering fits `budget`
/// characters.
///
/// Chunks come first by descending score (ties by indexing order), then snippets by
/// provider rank. Duplicates by ID or by whitespace-normalized text are skipped.
/// Segments too large for the budget on their own are discarded, then the lowest
/// priority segments are dropped until the block fits.
#[must_use]
pub fn assemble(chunks: &[ScoredChunk], snippets: &[WebSnippet], budget: usize) -> ContextBlock {
    let mut chunks: Vec<&ScoredChunk> = chunks.iter().collect();
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
    let mut snippets: Vec<&WebSnippet> = snippets.iter().collect();
    snippets.sort_by_key(|s| s.rank);

    let candidates = chunks
        .into_iter()
        .map(Segment::from_chunk)
        .chain(snippets.into_iter().map(Segment::from_snippet));

    let mut seen_ids = HashSet::new();
    let mut seen_text = HashSet::new();
    let mut total_in = 0usize;
    let mut kept: Vec<(Segment, usize)> = Vec::new();
    for segment in candidates {
        total_in += 1;
        if segment.text.is_empty() {
            continue;
        }
        if !seen_ids.insert((segment.provenance, segment.id.clone())) {
            continue;
        }
        if !seen_text.insert(normalized_hash(&segment.text)) {
            continue;
        }
        let len = segment.rendered_len();
        if len > budget {
            tracing::debug!(id = %segment.id, len, budget, "segment exceeds context budget");
            continue;
        }
        kept.push((segment, len));
    }

    let sep = SEPARATOR.chars().count();
    let mut total: usize =
        kept.iter().map(|(_, len)| len).sum::<usize>() + sep * kept.len().saturating_sub(1);
    while total > budget {
        let Some((_, len)) = kept.pop() else { break };
        total -= len;
        total = total.saturating_sub(if kept.is_empty() { 0 } else { sep });
    }

    let segments: Vec<Segment> = kept.into_iter().map(|(s, _)| s).collect();
    let dropped = total_in - segments.len();
    tracing::debug!(
        segments = segments.len(),
        dropped,
        chars = total,
        budget,
        "context assembled"
    );
    ContextBlock { segments, dropped }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sift_memory::document::Chunk;

    use super::*;

    fn hit(doc: &str, ordinal: usize, score: f32, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("{doc}#{ordinal}"),
                document_id: doc.into(),
                ordinal,
                text: text.into(),
                source: format!("{doc}.txt"),
            },
            score,
            seq: i64::try_from(ordinal).unwrap(),
        }
    }

    fn snippet(rank: usize, url: &str, excerpt: &str) -> WebSnippet {
        WebSnippet {
            title: format!("Result {rank}"),
            url: url.into(),
            excerpt: excerpt.into(),
            rank,
        }
    }

    #[test]
    fn empty_inputs_give_empty_block() {
        let block = assemble(&[], &[], 1000);
        assert!(block.is_empty());
        assert_eq!(block.render(), "");
    }

    #[test]
    fn documents_precede_web_and_are_sorted() {
        let block = assemble(
            &[hit("p", 1, 0.7, "second"), hit("p", 0, 0.9, "first")],
            &[snippet(2, "https://b", "web two"), snippet(1, "https://a", "web one")],
            10_000,
        );
        let texts: Vec<_> = block.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "web one", "web two"]);
        assert_eq!(block.provenance(), vec![Provenance::Document, Provenance::Web]);
    }

    #[test]
    fn equal_scores_keep_indexing_order() {
        let block = assemble(
            &[hit("p", 3, 0.8, "later"), hit("p", 1, 0.8, "earlier")],
            &[],
            10_000,
        );
        assert_eq!(block.segments()[0].text, "earlier");
    }

    #[test]
    fn duplicate_ids_and_texts_are_removed() {
        let block = assemble(
            &[
                hit("p", 0, 0.9, "Refunds within 30 days."),
                hit("p", 0, 0.9, "Refunds within 30 days."),
                hit("q", 4, 0.8, "Refunds   within\n30 days."),
            ],
            &[
                snippet(1, "https://a", "Refunds within 30 days."),
                snippet(2, "https://b", "Shipping is free."),
                snippet(3, "https://b", "Other text"),
            ],
            10_000,
        );
        assert_eq!(block.segments().len(), 2);
        assert_eq!(block.dropped(), 4);
    }

    #[test]
    fn renders_tags_and_separators() {
        let block = assemble(&[hit("p", 0, 0.9, "alpha")], &[snippet(1, "https://a", "beta")], 10_000);
        let out = block.render();
        assert!(out.starts_with("[document] p.txt (part 1, similarity 0.90)\nalpha"));
        assert!(out.contains(SEPARATOR));
        assert!(out.ends_with("[web] Result 1 <https://a>\nbeta"));
    }

    #[test]
    fn lowest_priority_dropped_first() {
        let chunks = [hit("p", 0, 0.9, "a".repeat(100).as_str())];
        let snippets = [snippet(1, "https://a", "b".repeat(100).as_str())];
        let one = Segment::from_chunk(&chunks[0]).render().chars().count();
        let block = assemble(&chunks, &snippets, one + 10);
        assert_eq!(block.segments().len(), 1);
        assert_eq!(block.segments()[0].provenance, Provenance::Document);
    }

    #[test]
    fn oversized_segment_is_skipped_not_truncated() {
        let chunks = [
            hit("p", 0, 0.9, "x".repeat(5000).as_str()),
            hit("p", 1, 0.8, "short"),
        ];
        let block = assemble(&chunks, &[], 200);
        assert_eq!(block.segments().len(), 1);
        assert_eq!(block.segments()[0].text, "short");
    }

    #[test]
    fn zero_budget_is_empty() {
        assert!(assemble(&[hit("p", 0, 0.9, "x")], &[], 0).is_empty());
    }

    proptest! {
        #[test]
        fn rendered_block_respects_budget(
            texts in prop::collection::vec("[a-z ]{0,120}", 0..8),
            excerpts in prop::collection::vec("[a-z ]{0,120}", 0..6),
            budget in 0usize..800,
        ) {
            let chunks: Vec<ScoredChunk> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| hit("d", i, 1.0 - (i as f32) * 0.05, t))
                .collect();
            let snippets: Vec<WebSnippet> = excerpts
                .iter()
                .enumerate()
                .map(|(i, e)| snippet(i + 1, &format!("https://s/{i}"), e))
                .collect();
            let block = assemble(&chunks, &snippets, budget);
            prop_assert!(block.render().chars().count() <= budget);

            let inputs: Vec<String> = texts
                .iter()
                .chain(excerpts.iter())
                .map(|t| t.trim().to_owned())
                .collect();
            for segment in block.segments() {
                prop_assert!(inputs.contains(&segment.text));
            }
        }
    }
}
