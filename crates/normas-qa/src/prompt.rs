//! Prompt assembly: retrieved chunks become the "Context" block.

use tracing::warn;

use normas_core::types::{Chunk, ScoredChunk};

/// Exact reply the model must give when the context does not hold the answer.
pub const NOT_FOUND_ANSWER: &str = "Information not found in the available standards.";

const CHUNK_SEPARATOR: &str = "\n\n";

/// Render `hits` in rank order into at most `max_chars` characters.
///
/// Returns the context text and the chunks that made it in. Chunks that no
/// longer fit are dropped; a first chunk that alone exceeds the budget is cut.
pub fn build_context(hits: &[ScoredChunk], max_chars: usize) -> (String, Vec<Chunk>) {
    let mut context = String::new();
    let mut used_chars = 0usize;
    let mut included = Vec::new();
    for (rank, hit) in hits.iter().enumerate() {
        let block = render_chunk(&hit.chunk);
        let block_chars = block.chars().count();
        let separator_chars = if included.is_empty() { 0 } else { CHUNK_SEPARATOR.len() };
        if used_chars + separator_chars + block_chars <= max_chars {
            if separator_chars > 0 {
                context.push_str(CHUNK_SEPARATOR);
            }
            context.push_str(&block);
            used_chars += separator_chars + block_chars;
            included.push(hit.chunk.clone());
            continue;
        }
        if included.is_empty() && max_chars > 0 {
            warn!("Top chunk {} has {} chars, truncating to the {} char context budget", hit.chunk.id, block_chars, max_chars);
            context = block.chars().take(max_chars).collect();
            included.push(hit.chunk.clone());
        }
        let dropped = hits.len() - included.len();
        if dropped > 0 {
            warn!("Context budget of {} chars reached at rank {}; dropping {} retrieved chunks", max_chars, rank + 1, dropped);
        }
        break;
    }
    (context, included)
}

fn render_chunk(chunk: &Chunk) -> String {
    let source = chunk.file_name().unwrap_or_else(|| "unknown source".to_string());
    match chunk.page_number() {
        Some(page) => format!("[{}, page {}]\n{}", source, page, chunk.text),
        None => format!("[{}]\n{}", source, chunk.text),
    }
}

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        r#"You are an ultra-precise technical assistant. Your ONLY source of information is the 'Context' below, extracted from technical standards. Answer the user's 'Question'.

Context:
{context}

Question: {question}

STRICT RULES FOR THE ANSWER:
1. Analyse the context carefully.
2. Base your answer EXCLUSIVELY on the information present in the 'Context'.
3. Do NOT add any external information, prior knowledge or assumptions.
4. If the complete and precise answer to the 'Question' can be found in the 'Context', give it CLEARLY and OBJECTIVELY.
5. If the information needed to answer the 'Question' is NOT explicitly in the 'Context', reply EXACTLY and ONLY with the sentence: "{not_found}" Do not infer, guess or give partial answers.
6. At the end of your answer (ONLY if you found the information), cite the source document(s) using the file name and section from the context metadata, formatted as: (Source: file_name_1.pdf, file_name_2.pdf / Section: section_name_or_number)

Answer:"#,
        context = context,
        question = question,
        not_found = NOT_FOUND_ANSWER,
    )
}
