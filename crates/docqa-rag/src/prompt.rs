use std::fmt::Write;

use docqa_core::{QueryResult, RetrievalContext};

const INSTRUCTIONS: &str = "You answer questions about the user's documents. \
Use only the numbered context below and cite it as [n]. \
If the context does not contain the answer, say that you don't know.";

const NO_CONTEXT: &str = "No relevant context was found in the indexed documents.";

/// Short location label for a retrieved chunk, e.g. `manual.txt, p. 3`.
pub fn citation(result: &QueryResult) -> String {
    let chunk = &result.chunk;
    match chunk.page {
        Some(page) => format!("{}, p. {}", chunk.source_identifier, page),
        None => format!("{}, chars {}-{}", chunk.source_identifier, chunk.char_span.start, chunk.char_span.end),
    }
}

/// Prompt with context blocks numbered in score order, best first.
pub fn build_prompt(query: &str, context: &RetrievalContext) -> String {
    let mut prompt = String::with_capacity(256 + context.iter().map(|r| r.chunk.text.len() + 32).sum::<usize>());
    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    if context.is_empty() {
        prompt.push_str(NO_CONTEXT);
        prompt.push('\n');
    }
    for (i, result) in context.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] ({})\n{}\n", i + 1, citation(result), result.chunk.text.trim());
    }
    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", query.trim());
    prompt
}
