//! Prompt templates for grounded answers

use super::IndexedChunk;
use crate::llm::LlmMessage;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about the user's uploaded documents.
Only use information from the provided context. If the answer is not in the context, say \"I cannot find this information in the provided documents.\"
Cite the file name of each source you rely on, e.g. [Source: report.pdf].";

/// Number the retrieved chunks and label each with its source file
pub fn build_context(hits: &[(&IndexedChunk, f32)]) -> String {
    let mut context = String::new();

    for (i, (chunk, _)) in hits.iter().enumerate() {
        context.push_str(&format!(
            "[{}] {} (part {})\n\n{}\n\n---\n\n",
            i + 1,
            chunk.source,
            chunk.chunk_index + 1,
            chunk.content
        ));
    }

    context
}

/// The question-answering prompt for a set of retrieved chunks
pub fn build_messages(question: &str, hits: &[(&IndexedChunk, f32)]) -> Vec<LlmMessage> {
    let user = format!(
        "Context:\n{context}\nQuestion: {question}\n\nAnswer:",
        context = build_context(hits),
        question = question.trim()
    );
    vec![LlmMessage::system(SYSTEM_PROMPT), LlmMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: usize, content: &str) -> IndexedChunk {
        IndexedChunk {
            source: source.into(),
            chunk_index: index,
            content: content.into(),
            embedding: vec![],
        }
    }

    #[test]
    fn test_build_context_numbers_sources() {
        let a = chunk("a.pdf", 0, "Alpha text");
        let b = chunk("b.txt", 2, "Beta text");
        let context = build_context(&[(&a, 0.9), (&b, 0.5)]);

        assert!(context.starts_with("[1] a.pdf (part 1)\n\nAlpha text"));
        assert!(context.contains("[2] b.txt (part 3)\n\nBeta text"));
    }

    #[test]
    fn test_build_messages_shape() {
        let a = chunk("a.pdf", 0, "Alpha text");
        let messages = build_messages("  What is alpha? ", &[(&a, 1.0)]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("Alpha text"));
        assert!(messages[1].content.ends_with("Question: What is alpha?\n\nAnswer:"));
    }
}
