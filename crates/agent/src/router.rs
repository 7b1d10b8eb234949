//! Retrieval routing
//!
//! One structured LLM call decides whether a question needs the document
//! index. A failed or malformed call falls back to retrieval, which keeps
//! answers grounded.

use std::sync::Arc;

use serde::Deserialize;

use askdocs_core::{Question, RoutingDecision};
use askdocs_llm::{invoke_structured, LlmBackend, LlmError, StructuredOutput};

use crate::prompts::ROUTER_SYSTEM_PROMPT;

/// Where a question should be answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datasource {
    Vectorstore,
    Llm,
}

impl From<Datasource> for RoutingDecision {
    fn from(source: Datasource) -> Self {
        match source {
            Datasource::Vectorstore => RoutingDecision::Retrieve,
            Datasource::Llm => RoutingDecision::Direct,
        }
    }
}

/// Router reply
#[derive(Debug, Clone, Deserialize)]
pub struct RouteQuery {
    pub datasource: Datasource,
}

impl StructuredOutput for RouteQuery {
    const NAME: &'static str = "route_query";

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "datasource": {
                    "type": "string",
                    "enum": ["vectorstore", "llm"],
                    "description": "vectorstore for document lookups, llm for general conversation"
                }
            },
            "required": ["datasource"],
            "additionalProperties": false
        })
    }
}

pub struct Router {
    llm: Arc<dyn LlmBackend>,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }

    /// Route `question`; never fails
    pub async fn route(&self, question: &Question) -> RoutingDecision {
        let decision = match self.classify(question).await {
            Ok(decision) => decision,
            Err(e) => {
                metrics::counter!("askdocs_route_fallbacks_total").increment(1);
                tracing::warn!(error = %e, "Routing failed, defaulting to retrieval");
                RoutingDecision::Retrieve
            },
        };

        metrics::counter!("askdocs_route_decisions_total", "decision" => decision.as_str())
            .increment(1);
        tracing::debug!(decision = %decision, "Routed question");

        decision
    }

    async fn classify(&self, question: &Question) -> Result<RoutingDecision, LlmError> {
        let reply: RouteQuery =
            invoke_structured(self.llm.as_ref(), ROUTER_SYSTEM_PROMPT, question.as_str()).await?;
        Ok(reply.datasource.into())
    }
}
