//! Packs relevance-ordered documents into a word-budgeted prompt context.
//!
//! Budgets are counted in whitespace-separated words, not model tokens.

use serde::Serialize;

use crate::models::{Document, ScoredDocument};

/// A truncated tail shorter than this many words is not worth including.
pub const MIN_TRUNCATED_WORDS: usize = 20;

/// Placed between rendered segments.
pub const SEGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Anything that can contribute text to the context.
pub trait ContextSource {
    /// Non-blank text, or `None` to skip this item.
    fn context_text(&self) -> Option<&str>;
}

impl ContextSource for Document {
    fn context_text(&self) -> Option<&str> {
        self.usable_text()
    }
}

impl ContextSource for ScoredDocument {
    fn context_text(&self) -> Option<&str> {
        self.document.usable_text()
    }
}

/// One document excerpt placed in the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSegment {
    /// Position of the source document in the assembler's input.
    pub document_index: usize,
    pub text_used: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContext {
    /// Rendered prompt context; empty when no segment was produced.
    pub text: String,
    pub segments: Vec<ContextSegment>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| word_count(&s.text_used)).sum()
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Greedily pack `documents`, in order, into at most `token_budget` words.
///
/// A document that fits is included verbatim. The first one that does not
/// fit is cut to the remaining budget if more than [`MIN_TRUNCATED_WORDS`]
/// words remain, and packing stops there either way.
pub fn assemble<D: ContextSource>(documents: &[D], token_budget: usize) -> AssembledContext {
    let mut segments = Vec::new();
    let mut used = 0usize;

    for (document_index, doc) in documents.iter().enumerate() {
        let Some(text) = doc.context_text() else {
            continue;
        };
        let words = word_count(text);

        if used + words <= token_budget {
            segments.push(ContextSegment {
                document_index,
                text_used: text.to_string(),
                truncated: false,
            });
            used += words;
            continue;
        }

        let remaining = token_budget - used;
        if remaining > MIN_TRUNCATED_WORDS {
            let head = text
                .split_whitespace()
                .take(remaining)
                .collect::<Vec<_>>()
                .join(" ");
            segments.push(ContextSegment {
                document_index,
                text_used: head,
                truncated: true,
            });
        }
        break;
    }

    let text = render(&segments);
    tracing::debug!(
        segments = segments.len(),
        words = segments.iter().map(|s| word_count(&s.text_used)).sum::<usize>(),
        token_budget,
        "assembled context"
    );
    AssembledContext { text, segments }
}

fn render(segments: &[ContextSegment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(n, s)| format!("Document {}:\n{}", n + 1, s.text_used))
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR)
}
