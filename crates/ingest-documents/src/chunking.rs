//! Document chunking model (spec §4.G), grounded on the teacher's
//! `ChunkingConfig`/`ChunkingStrategy`/`Chunk` pattern (originally built for
//! HTML-aware extraction, generalized here to arbitrary document text).

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategyKind {
    SectionBoundaries,
    PageLimits,
    SemanticBreaks,
    FixedSize,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkingRule {
    pub strategy: ChunkingStrategyKind,
    pub min_chunk_size: usize,
    pub target_chunk_size: usize,
    pub max_chunk_size: usize,
    pub overlap_size: usize,
    pub preserve_sections: bool,
    pub preserve_paragraphs: bool,
    pub preserve_sentences: bool,
    pub handle_tables: bool,
    pub handle_lists: bool,
    pub handle_images: bool,
    pub min_chunk_quality: f64,
    pub content_coverage: f64,
    pub max_processing_time: Duration,
    pub max_batch_size: usize,
}

impl ChunkingRule {
    /// Default rule for word-processor documents: paragraph-aware,
    /// moderate chunk size.
    pub fn word_default() -> Self {
        Self {
            strategy: ChunkingStrategyKind::SectionBoundaries,
            min_chunk_size: 200,
            target_chunk_size: 1500,
            max_chunk_size: 4000,
            overlap_size: 150,
            preserve_sections: true,
            preserve_paragraphs: true,
            preserve_sentences: true,
            handle_tables: true,
            handle_lists: true,
            handle_images: false,
            min_chunk_quality: 0.3,
            content_coverage: 0.95,
            max_processing_time: Duration::from_secs(5),
            max_batch_size: 100,
        }
    }

    /// Default rule for spreadsheet documents: smaller, row-oriented
    /// chunks with little overlap value.
    pub fn sheet_default() -> Self {
        Self {
            strategy: ChunkingStrategyKind::FixedSize,
            min_chunk_size: 100,
            target_chunk_size: 800,
            max_chunk_size: 2000,
            overlap_size: 0,
            preserve_sections: false,
            preserve_paragraphs: false,
            preserve_sentences: false,
            handle_tables: true,
            handle_lists: false,
            handle_images: false,
            min_chunk_quality: 0.2,
            content_coverage: 0.98,
            max_processing_time: Duration::from_secs(5),
            max_batch_size: 200,
        }
    }

    /// Default rule for presentation documents: one slide's worth per
    /// chunk, target tuned to typical slide-notes length.
    pub fn presentation_default() -> Self {
        Self {
            strategy: ChunkingStrategyKind::Hybrid,
            min_chunk_size: 80,
            target_chunk_size: 600,
            max_chunk_size: 1500,
            overlap_size: 50,
            preserve_sections: true,
            preserve_paragraphs: true,
            preserve_sentences: false,
            handle_tables: false,
            handle_lists: true,
            handle_images: true,
            min_chunk_quality: 0.25,
            content_coverage: 0.9,
            max_processing_time: Duration::from_secs(5),
            max_batch_size: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub parent_doc_id: String,
    pub sequence_number: u32,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub previous_chunk_id: Option<Uuid>,
    pub next_chunk_id: Option<Uuid>,
    pub strategy: ChunkingStrategyKind,
    pub target_size: usize,
    pub quality_score: f64,
}

#[derive(Debug, Clone)]
pub struct ChunkingResult {
    pub chunks: Vec<DocumentChunk>,
    pub count: usize,
    pub coverage: f64,
    pub average_quality: f64,
    pub quality_variance: f64,
    pub processing_time: Duration,
}

/// A raw span before sequencing/linking is applied.
struct Span {
    start: usize,
    end: usize,
}

fn paragraph_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0usize;
    for part in text.split("\n\n") {
        let start = cursor;
        let end = start + part.len();
        if !part.trim().is_empty() {
            spans.push(Span { start, end });
        }
        cursor = end + 2; // account for the removed "\n\n"
    }
    if spans.is_empty() && !text.is_empty() {
        spans.push(Span { start: 0, end: text.len() });
    }
    spans
}

fn pack_spans(text: &str, spans: Vec<Span>, rule: &ChunkingRule) -> Vec<Span> {
    let mut packed = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut current_end = 0usize;

    for span in spans {
        if span.end - span.start > rule.max_chunk_size {
            if let Some(start) = current_start.take() {
                packed.push(Span { start, end: current_end });
            }
            let mut cursor = span.start;
            while cursor < span.end {
                let end = (cursor + rule.max_chunk_size).min(span.end);
                packed.push(Span { start: cursor, end });
                cursor = end;
            }
            continue;
        }

        match current_start {
            None => {
                current_start = Some(span.start);
                current_end = span.end;
            }
            Some(start) => {
                if current_end - start + (span.end - span.start) <= rule.target_chunk_size {
                    current_end = span.end;
                } else {
                    packed.push(Span { start, end: current_end });
                    current_start = Some(span.start);
                    current_end = span.end;
                }
            }
        }
    }
    if let Some(start) = current_start {
        packed.push(Span { start, end: current_end });
    }

    // Merge a trailing undersized chunk into its predecessor so the
    // minimum-size invariant holds without dropping content.
    if packed.len() > 1 {
        let last = packed.last().unwrap();
        if last.end - last.start < rule.min_chunk_size {
            let tail = packed.pop().unwrap();
            let prev = packed.last_mut().unwrap();
            prev.end = tail.end;
        }
    }

    let _ = text;
    packed
}

fn sliding_window_spans(len: usize, rule: &ChunkingRule) -> Vec<Span> {
    let mut spans = Vec::new();
    let step = rule.target_chunk_size.saturating_sub(rule.overlap_size).max(1);
    let mut start = 0usize;
    while start < len {
        let end = (start + rule.target_chunk_size).min(len);
        spans.push(Span { start, end });
        if end == len {
            break;
        }
        start += step;
    }
    spans
}

fn quality_score(content: &str, rule: &ChunkingRule) -> f64 {
    let len = content.trim().len() as f64;
    if len == 0.0 {
        return 0.0;
    }
    let target = rule.target_chunk_size as f64;
    let size_fit = (len / target).min(1.0);
    let has_words = content.split_whitespace().count() >= 3;
    let completeness = if has_words { 1.0 } else { 0.5 };
    (size_fit * 0.7 + completeness * 0.3).clamp(0.0, 1.0)
}

/// Split `text` per `rule`, returning an ordered, doubly-linked chunk list
/// obeying the invariants of spec §4.G (P5).
pub fn chunk_document(text: &str, parent_doc_id: &str, rule: &ChunkingRule) -> ChunkingResult {
    let started = Instant::now();

    if text.len() <= rule.max_chunk_size {
        let chunk = DocumentChunk {
            id: Uuid::new_v4(),
            parent_doc_id: parent_doc_id.to_string(),
            sequence_number: 0,
            content: text.to_string(),
            start_offset: 0,
            end_offset: text.len(),
            previous_chunk_id: None,
            next_chunk_id: None,
            strategy: rule.strategy,
            target_size: rule.target_chunk_size,
            quality_score: quality_score(text, rule),
        };
        let quality = chunk.quality_score;
        return ChunkingResult {
            chunks: vec![chunk],
            count: 1,
            coverage: 1.0,
            average_quality: quality,
            quality_variance: 0.0,
            processing_time: started.elapsed(),
        };
    }

    let spans = if rule.preserve_paragraphs || rule.preserve_sections {
        pack_spans(text, paragraph_spans(text), rule)
    } else {
        sliding_window_spans(text.len(), rule)
    };

    let mut ids: Vec<Uuid> = (0..spans.len()).map(|_| Uuid::new_v4()).collect();
    if ids.is_empty() {
        ids.push(Uuid::new_v4());
    }

    let mut chunks = Vec::with_capacity(spans.len());
    let mut covered = 0usize;
    for (i, span) in spans.iter().enumerate() {
        let content = text[span.start..span.end].to_string();
        covered += span.end - span.start;
        chunks.push(DocumentChunk {
            id: ids[i],
            parent_doc_id: parent_doc_id.to_string(),
            sequence_number: i as u32,
            content: content.clone(),
            start_offset: span.start,
            end_offset: span.end,
            previous_chunk_id: if i == 0 { None } else { Some(ids[i - 1]) },
            next_chunk_id: ids.get(i + 1).copied(),
            strategy: rule.strategy,
            target_size: rule.target_chunk_size,
            quality_score: quality_score(&content, rule),
        });
    }

    let coverage = if text.is_empty() {
        1.0
    } else {
        covered as f64 / text.len() as f64
    };
    let qualities: Vec<f64> = chunks.iter().map(|c| c.quality_score).collect();
    let average_quality = qualities.iter().sum::<f64>() / qualities.len().max(1) as f64;
    let variance = qualities
        .iter()
        .map(|q| (q - average_quality).powi(2))
        .sum::<f64>()
        / qualities.len().max(1) as f64;

    ChunkingResult {
        count: chunks.len(),
        chunks,
        coverage,
        average_quality,
        quality_variance: variance,
        processing_time: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text() -> String {
        let paragraph = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
            Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.\n\n";
        paragraph.repeat(80)
    }

    #[test]
    fn sequence_numbers_are_contiguous_from_zero() {
        let rule = ChunkingRule::word_default();
        let result = chunk_document(&long_text(), "d1", &rule);
        for (i, chunk) in result.chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_number, i as u32);
        }
    }

    #[test]
    fn linked_list_endpoints_are_null_terminated() {
        let rule = ChunkingRule::word_default();
        let result = chunk_document(&long_text(), "d1", &rule);
        assert!(result.chunks.first().unwrap().previous_chunk_id.is_none());
        assert!(result.chunks.last().unwrap().next_chunk_id.is_none());
    }

    #[test]
    fn linked_list_is_internally_consistent() {
        let rule = ChunkingRule::word_default();
        let result = chunk_document(&long_text(), "d1", &rule);
        for window in result.chunks.windows(2) {
            assert_eq!(window[0].next_chunk_id, Some(window[1].id));
            assert_eq!(window[1].previous_chunk_id, Some(window[0].id));
        }
    }

    #[test]
    fn coverage_meets_the_rule_floor() {
        let rule = ChunkingRule::word_default();
        let result = chunk_document(&long_text(), "d1", &rule);
        assert!(result.coverage >= rule.content_coverage);
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let rule = ChunkingRule::word_default();
        let result = chunk_document("short text", "d1", &rule);
        assert_eq!(result.count, 1);
        assert_eq!(result.coverage, 1.0);
    }

    #[test]
    fn oversized_paragraph_is_hard_split_under_max_size() {
        let rule = ChunkingRule::sheet_default();
        let huge = "x".repeat(rule.max_chunk_size * 3);
        let result = chunk_document(&huge, "d1", &rule);
        for chunk in &result.chunks {
            assert!(chunk.content.len() <= rule.max_chunk_size);
        }
    }
}
