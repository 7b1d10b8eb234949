//! LLM stub for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;

use askdocs_llm::{FinishReason, GenerationResult, LlmBackend, LlmError, Message, Role};

/// Replies with a fixed text (or fails) and records every call
pub(crate) struct ScriptedLlm {
    reply: Option<String>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn last_with_role(&self, role: Role) -> Option<String> {
        self.calls
            .lock()
            .last()
            .and_then(|messages| messages.iter().find(|m| m.role == role))
            .map(|m| m.content.clone())
    }

    pub(crate) fn last_system_prompt(&self) -> Option<String> {
        self.last_with_role(Role::System)
    }

    pub(crate) fn last_user_input(&self) -> Option<String> {
        self.last_with_role(Role::User)
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.calls.lock().push(messages.to_vec());

        match &self.reply {
            Some(text) => Ok(GenerationResult {
                text: text.clone(),
                tokens: 0,
                total_time_ms: 0,
                finish_reason: FinishReason::Stop,
            }),
            None => Err(LlmError::Api("stub failure".to_string())),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
