//! Answer generation
//!
//! `AnswerGenerator` answers from reranked passages with bracket citations.
//! `DirectGenerator` answers without context.

use std::sync::Arc;

use askdocs_core::{Question, ScoredPassage};
use askdocs_llm::{invoke_text, LlmBackend, LlmError};

use crate::prompts::{ANSWER_SYSTEM_PROMPT, DIRECT_SYSTEM_PROMPT, NO_DOCUMENTS_MESSAGE};

/// Number passages `[1]..[N]` in the given order
pub fn format_context(passages: &[ScoredPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}", i + 1, p.content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn user_input(question: &Question, passages: &[ScoredPassage]) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}",
        format_context(passages),
        question
    )
}

pub struct AnswerGenerator {
    llm: Arc<dyn LlmBackend>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    /// Cited answer from `passages`
    ///
    /// With no passages the fixed no-documents message is returned and the
    /// LLM is not called. Errors are not retried here.
    pub async fn generate(
        &self,
        question: &Question,
        passages: &[ScoredPassage],
    ) -> Result<String, LlmError> {
        if passages.is_empty() {
            tracing::info!("No passages retrieved, skipping generation");
            return Ok(NO_DOCUMENTS_MESSAGE.to_string());
        }

        let answer = invoke_text(
            self.llm.as_ref(),
            ANSWER_SYSTEM_PROMPT,
            &user_input(question, passages),
        )
        .await?;

        tracing::debug!(
            passages = passages.len(),
            answer_len = answer.len(),
            "Generated cited answer"
        );
        Ok(answer)
    }
}

pub struct DirectGenerator {
    llm: Arc<dyn LlmBackend>,
}

impl DirectGenerator {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, question: &Question) -> Result<String, LlmError> {
        invoke_text(self.llm.as_ref(), DIRECT_SYSTEM_PROMPT, question.as_str()).await
    }
}
