//! Prompt builder: pure templating, no business logic.
//!
//! Four variants: section question/answer and snippet question/answer. The
//! wording is part of the pipeline's observable behavior (the denylist
//! validator keys off common refusal phrasings these prompts provoke), so it
//! stays stable.

/// Prompt for a single question answerable from a section's text alone.
pub fn section_question(title: &str, text: &str) -> String {
    format!(
        "Create a single question based solely on the content of the following \
         README section titled '{title}':\n\n{text}\n\nOutput only the question."
    )
}

/// Prompt for a direct answer grounded only in the section text.
pub fn section_answer(title: &str, text: &str, question: &str) -> String {
    format!(
        "Based on the following section from a README file titled '{title}', \
         provide a detailed answer to the question:\n\n{text}\n\n\
         Question: {question}\nJust output the answer directly."
    )
}

/// Prompt for a question a developer would ask about a code snippet.
pub fn snippet_question(context: &str, code: &str) -> String {
    format!(
        "Given the following code snippet and its context, generate a question that \
         would help someone understand the purpose, functionality, or structure of \
         the code. The question should be something that a developer might ask when \
         trying to learn or understand how to implement this code. Consider what the \
         snippet is doing and how it might be used in a real-world scenario.\n\n\
         Context:\n{context}\n\nCode Snippet:\n{code}\n\nQuestion:"
    )
}

/// Prompt for an explanation of a snippet's role given context and question.
pub fn snippet_answer(context: &str, code: &str, question: &str) -> String {
    format!(
        "Given the following context, code snippet, and question, generate an answer \
         that directly addresses the question. The answer should explain the code \
         snippet's role, its output, or how it works within the context provided. \
         Focus on clarity and detail, as if explaining to a peer who is new to this \
         concept.\n\nContext:\n{context}\n\nCode Snippet:\n{code}\n\n\
         Question:\n{question}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_prompts_embed_title_and_text() {
        let q = section_question("Install", "run cargo install");
        assert!(q.contains("'Install'"));
        assert!(q.contains("run cargo install"));

        let a = section_answer("Install", "run cargo install", "How do I install?");
        assert!(a.contains("'Install'"));
        assert!(a.contains("Question: How do I install?"));
    }

    #[test]
    fn snippet_prompts_embed_context_code_question() {
        let q = snippet_question("some context", "fn main() {}");
        assert!(q.contains("some context"));
        assert!(q.contains("fn main() {}"));

        let a = snippet_answer("some context", "fn main() {}", "What does this do?");
        assert!(a.contains("What does this do?"));
        assert!(a.ends_with("Answer:"));
    }
}
