//! Structured and string LLM calls
//!
//! `invoke_structured` asks the backend for schema-constrained JSON and
//! deserializes the reply into a typed value. `invoke_text` returns the
//! trimmed reply as-is.

use serde::de::DeserializeOwned;

use crate::backend::{LlmBackend, ResponseSchema};
use crate::prompt::Message;
use crate::LlmError;

/// A type an LLM can be asked to produce as JSON
pub trait StructuredOutput: DeserializeOwned {
    /// Schema name sent to the provider
    const NAME: &'static str;

    /// JSON schema describing `Self`
    fn schema() -> serde_json::Value;

    fn response_schema() -> ResponseSchema {
        ResponseSchema::new(Self::NAME, Self::schema())
    }
}

/// System prompt + user input -> typed result
pub async fn invoke_structured<T: StructuredOutput>(
    backend: &dyn LlmBackend,
    system_prompt: &str,
    user_input: &str,
) -> Result<T, LlmError> {
    let messages = [Message::system(system_prompt), Message::user(user_input)];
    let result = backend
        .generate_structured(&messages, &T::response_schema())
        .await?;

    let json = extract_json_object(&result.text).ok_or_else(|| {
        LlmError::InvalidResponse(format!("No JSON object in {} reply", T::NAME))
    })?;

    serde_json::from_str(json)
        .map_err(|e| LlmError::InvalidResponse(format!("{} did not match schema: {}", T::NAME, e)))
}

/// System prompt + user input -> string
pub async fn invoke_text(
    backend: &dyn LlmBackend,
    system_prompt: &str,
    user_input: &str,
) -> Result<String, LlmError> {
    let messages = [Message::system(system_prompt), Message::user(user_input)];
    let result = backend.generate(&messages).await?;

    let text = result.text.trim();
    if text.is_empty() {
        return Err(LlmError::Generation("Empty response".to_string()));
    }

    Ok(text.to_string())
}

/// Slice from the first `{` to the last `}`
///
/// Tolerates code fences and chatter around the object, which models add
/// when a backend has no native JSON mode.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FinishReason, GenerationResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
    }

    impl StructuredOutput for Verdict {
        const NAME: &'static str = "verdict";

        fn schema() -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {"ok": {"type": "boolean"}},
                "required": ["ok"],
                "additionalProperties": false
            })
        }
    }

    struct CannedBackend {
        reply: String,
        seen_schema: Mutex<Option<String>>,
    }

    impl CannedBackend {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen_schema: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
            Ok(GenerationResult {
                text: self.reply.clone(),
                tokens: 0,
                total_time_ms: 0,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn generate_structured(
            &self,
            messages: &[Message],
            schema: &ResponseSchema,
        ) -> Result<GenerationResult, LlmError> {
            *self.seen_schema.lock() = Some(schema.name.clone());
            self.generate(messages).await
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(
            extract_json_object("```json\n{\"a\": {\"b\": 2}}\n```"),
            Some("{\"a\": {\"b\": 2}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_invoke_structured_parses() {
        let backend = CannedBackend::new("Sure! {\"ok\": true}");
        let verdict: Verdict = invoke_structured(&backend, "sys", "user").await.unwrap();
        assert_eq!(verdict, Verdict { ok: true });
        assert_eq!(backend.seen_schema.lock().as_deref(), Some("verdict"));
    }

    #[tokio::test]
    async fn test_invoke_structured_rejects_mismatch() {
        let backend = CannedBackend::new("{\"ok\": \"maybe\"}");
        let result: Result<Verdict, _> = invoke_structured(&backend, "sys", "user").await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));

        let backend = CannedBackend::new("I refuse");
        let result: Result<Verdict, _> = invoke_structured(&backend, "sys", "user").await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_invoke_text_trims() {
        let backend = CannedBackend::new("  an answer \n");
        let text = invoke_text(&backend, "sys", "q").await.unwrap();
        assert_eq!(text, "an answer");

        let backend = CannedBackend::new("   ");
        assert!(invoke_text(&backend, "sys", "q").await.is_err());
    }
}
