//! Prompt assembly for answer synthesis.

use crate::index::ScoredChunk;

/// Separator placed between retrieved chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join retrieved chunk texts in rank order.
pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Wrap `context` and `question` in the grounding template.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question based only on the context below.\n\n\
         Context:\n\
         {context}\n\n\
         Question:\n\
         {question}\n"
    )
}
