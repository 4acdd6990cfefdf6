//! Prompt templates for grounded answering

use crate::retrieval::ScoredChunk;
use crate::types::Language;

/// Sentence the model must use when the context lacks the answer
const NOT_FOUND: &str = "I cannot find this information in the provided documents";

/// Prompt builder for grounded queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context block, one tagged section per retrieved chunk
    pub fn build_context(hits: &[ScoredChunk]) -> String {
        let mut context = String::new();

        for (i, hit) in hits.iter().enumerate() {
            context.push_str(&format!(
                "[{}] ({})\n{}\n\n---\n\n",
                i + 1,
                hit.chunk.format_citation(),
                hit.chunk.text
            ));
        }

        context
    }

    /// Build the full prompt; an empty `hits` switches to the no-context framing
    pub fn build(question: &str, lang: Language, hits: &[ScoredChunk]) -> String {
        if hits.is_empty() {
            Self::build_no_context_prompt(question, lang)
        } else {
            Self::build_rag_prompt(question, lang, &Self::build_context(hits))
        }
    }

    /// Prompt with retrieved context
    pub fn build_rag_prompt(question: &str, lang: Language, context: &str) -> String {
        format!(
            r#"You are an assistant answering questions about the user's uploaded documents.

INSTRUCTIONS:
1. Answer using ONLY the information in the context below
2. Cite the sources you use with their tag, for example [1] or [2]
3. If the context does not contain the answer, say "{not_found}"
4. Answer in {language} ({code}), whatever the language of the documents or the question

CONTEXT FROM DOCUMENTS:
{context}
QUESTION: {question}

Answer in {language}:"#,
            not_found = NOT_FOUND,
            language = lang.english_name(),
            code = lang.code(),
            context = context,
            question = question.trim()
        )
    }

    /// Prompt used when retrieval found nothing relevant
    pub fn build_no_context_prompt(question: &str, lang: Language) -> String {
        format!(
            r#"You are an assistant answering questions about the user's uploaded documents.

No relevant context was found in the uploaded documents for this question.
Do not invent facts or cite documents. Tell the user that the documents do not
appear to cover this question and, if helpful, suggest uploading a relevant
document or rephrasing the question.

Answer in {language} ({code}).

QUESTION: {question}

Answer in {language}:"#,
            language = lang.english_name(),
            code = lang.code(),
            question = question.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use uuid::Uuid;

    fn hit(name: &str, page: Option<u32>, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                document_name: name.to_string(),
                text: text.to_string(),
                position: 0,
                page_number: page,
                char_start: 0,
                char_end: text.len(),
                token_count: 1,
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_context_tags_sources() {
        let context = PromptBuilder::build_context(&[
            hit("a.pdf", Some(3), "alpha"),
            hit("b.txt", None, "beta"),
        ]);
        assert!(context.contains("[1] (source: a.pdf, page 3)\nalpha"));
        assert!(context.contains("[2] (source: b.txt)\nbeta"));
    }

    #[test]
    fn test_prompt_targets_language() {
        let prompt = PromptBuilder::build("Quoi ?", Language::Fr, &[hit("a.txt", None, "x")]);
        assert!(prompt.contains("Answer in French (fr)"));
        assert!(prompt.contains("QUESTION: Quoi ?"));
        assert!(prompt.contains("[1] (source: a.txt)"));
    }

    #[test]
    fn test_no_context_framing() {
        let prompt = PromptBuilder::build("anything?", Language::Ar, &[]);
        assert!(prompt.contains("No relevant context was found"));
        assert!(prompt.contains("Do not invent facts"));
        assert!(prompt.contains("Arabic"));
        assert!(!prompt.contains("CONTEXT FROM DOCUMENTS"));
    }
}
