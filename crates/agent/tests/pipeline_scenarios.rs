//! End-to-end answering runs over scripted LLM, search and reranker

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use askdocs_agent::prompts::{
    ANSWER_SYSTEM_PROMPT, DIRECT_SYSTEM_PROMPT, EXPANSION_SYSTEM_PROMPT, NO_DOCUMENTS_MESSAGE,
    ROUTER_SYSTEM_PROMPT,
};
use askdocs_agent::{
    AgentError, AnswerCache, AnswerGenerator, CacheSettings, DirectGenerator, ExpanderConfig,
    PipelineStage, QueryExpander, RagPipeline, Router,
};
use askdocs_core::{Passage, Question, RerankHit, Reranker, RoutingDecision};
use askdocs_llm::{FinishReason, GenerationResult, LlmBackend, LlmError, Message, Role};
use askdocs_rag::{HybridSearch, RagError, RetrievalOrchestrator, RetrieverConfig};

/// Replies according to the stage's system prompt
#[derive(Default)]
struct StageLlm {
    replies: HashMap<&'static str, String>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl StageLlm {
    fn reply(mut self, system_prompt: &'static str, text: &str) -> Self {
        self.replies.insert(system_prompt, text.to_string());
        self
    }

    /// Number of calls made with `system_prompt`
    fn calls_for(&self, system_prompt: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(prompt, _)| *prompt == system_prompt)
            .count()
    }

    fn input_for(&self, system_prompt: &str) -> Option<String> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(prompt, _)| *prompt == system_prompt)
            .map(|(_, input)| input.clone())
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LlmBackend for StageLlm {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let input = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let (prompt, reply) = self
            .replies
            .iter()
            .find(|(prompt, _)| **prompt == system)
            .map(|(prompt, reply)| (*prompt, Some(reply.clone())))
            .unwrap_or(("unknown", None));

        self.calls.lock().push((prompt, input));

        match reply {
            Some(text) => Ok(GenerationResult {
                text,
                tokens: 0,
                total_time_ms: 0,
                finish_reason: FinishReason::Stop,
            }),
            None => Err(LlmError::Api("no scripted reply".to_string())),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "stage-stub"
    }
}

#[derive(Default)]
struct ScriptedSearch {
    results: HashMap<String, Vec<&'static str>>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    fn with(mut self, query: &str, contents: Vec<&'static str>) -> Self {
        self.results.insert(query.to_string(), contents);
        self
    }

    fn down() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl HybridSearch for ScriptedSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Passage>, RagError> {
        self.calls.lock().push(query.to_string());
        if self.failing {
            return Err(RagError::Connection("index unreachable".to_string()));
        }
        Ok(self
            .results
            .get(query)
            .map(|contents| contents.iter().map(|c| Passage::new(*c)).collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct TableReranker {
    scores: HashMap<&'static str, f32>,
    seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl TableReranker {
    fn scoring(scores: &[(&'static str, f32)]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn seen(&self) -> Vec<(String, Vec<String>)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Reranker for TableReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> askdocs_core::Result<Vec<RerankHit>> {
        self.seen
            .lock()
            .push((query.to_string(), documents.to_vec()));

        let mut hits: Vec<RerankHit> = documents
            .iter()
            .enumerate()
            .map(|(index, d)| RerankHit {
                index,
                document: d.clone(),
                score: self.scores.get(d.as_str()).copied().unwrap_or(0.0),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn name(&self) -> &str {
        "table"
    }
}

struct Harness {
    llm: Arc<StageLlm>,
    search: Arc<ScriptedSearch>,
    reranker: Arc<TableReranker>,
    pipeline: RagPipeline,
}

fn harness(llm: StageLlm, search: ScriptedSearch, reranker: TableReranker) -> Harness {
    let llm = Arc::new(llm);
    let search = Arc::new(search);
    let reranker = Arc::new(reranker);

    let backend: Arc<dyn LlmBackend> = llm.clone();
    let retriever = RetrievalOrchestrator::new(
        search.clone(),
        reranker.clone(),
        RetrieverConfig {
            search_timeout: Duration::from_secs(5),
            rerank_timeout: Duration::from_secs(5),
            ..RetrieverConfig::default()
        },
    );

    let pipeline = RagPipeline::new(
        Router::new(backend.clone()),
        QueryExpander::new(
            backend.clone(),
            ExpanderConfig {
                max_queries: 5,
                include_original: false,
            },
        ),
        retriever,
        AnswerGenerator::new(backend.clone()),
        DirectGenerator::new(backend),
    );

    Harness {
        llm,
        search,
        reranker,
        pipeline,
    }
}

const ROUTE_RETRIEVE: &str = r#"{"datasource": "vectorstore"}"#;
const ROUTE_DIRECT: &str = r#"{"datasource": "llm"}"#;

fn question(text: &str) -> Question {
    Question::new(text).unwrap()
}

#[tokio::test]
async fn test_retrieval_branch_dedups_and_cites() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["a", "b"]}"#)
            .reply(ANSWER_SYSTEM_PROMPT, "Y explains it [1]."),
        ScriptedSearch::default()
            .with("a", vec!["X", "Y"])
            .with("b", vec!["Y", "Z"]),
        TableReranker::scoring(&[("X", 0.2), ("Y", 0.9), ("Z", 0.5)]),
    );

    let run = h.pipeline.run(question("What is Y?")).await.unwrap();

    assert_eq!(run.routing, RoutingDecision::Retrieve);
    assert_eq!(
        run.trace,
        vec![
            PipelineStage::Start,
            PipelineStage::Routing,
            PipelineStage::Expanding,
            PipelineStage::Retrieving,
            PipelineStage::Generating,
            PipelineStage::End,
        ]
    );
    assert_eq!(run.state.optimized_queries.as_slice(), ["a", "b"]);
    assert_eq!(h.search.calls().len(), 2);

    // Pool reaches the reranker deduplicated, scored against the question
    let seen = h.reranker.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "What is Y?");
    assert_eq!(seen[0].1, vec!["X", "Y", "Z"]);

    assert_eq!(run.state.retrieved_contents(), vec!["Y", "Z", "X"]);
    let ranks: Vec<usize> = run.state.retrieved_docs.iter().map(|d| d.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);

    assert_eq!(run.state.final_answer, "Y explains it [1].");
    assert_eq!(
        h.llm.input_for(ANSWER_SYSTEM_PROMPT).as_deref(),
        Some("Context:\n[1] Y\n\n[2] Z\n\n[3] X\n\nQuestion: What is Y?")
    );
}

#[tokio::test]
async fn test_empty_pool_answers_without_generation_call() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["nothing here"]}"#)
            .reply(ANSWER_SYSTEM_PROMPT, "should not be used"),
        ScriptedSearch::default(),
        TableReranker::default(),
    );

    let output = h.pipeline.answer("Where is the unicorn manual?").await.unwrap();

    assert_eq!(output.final_answer, NO_DOCUMENTS_MESSAGE);
    assert!(output.retrieved_docs.is_empty());
    assert_eq!(h.llm.calls_for(ANSWER_SYSTEM_PROMPT), 0);
    assert!(h.reranker.seen().is_empty());
}

#[tokio::test]
async fn test_direct_branch_skips_retrieval() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_DIRECT)
            .reply(DIRECT_SYSTEM_PROMPT, "Hello! How can I help?"),
        ScriptedSearch::default().with("hello", vec!["X"]),
        TableReranker::default(),
    );

    let run = h.pipeline.run(question("hello")).await.unwrap();

    assert_eq!(run.routing, RoutingDecision::Direct);
    assert_eq!(
        run.trace,
        vec![
            PipelineStage::Start,
            PipelineStage::Routing,
            PipelineStage::DirectGenerating,
            PipelineStage::End,
        ]
    );
    assert!(run.state.optimized_queries.is_empty());
    assert!(run.state.retrieved_docs.is_empty());
    assert_eq!(run.state.final_answer, "Hello! How can I help?");

    assert!(h.search.calls().is_empty());
    assert_eq!(h.llm.calls_for(EXPANSION_SYSTEM_PROMPT), 0);
    assert_eq!(h.llm.total_calls(), 2);
}

#[tokio::test]
async fn test_reranked_pair_keeps_scores_and_ranks() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["q"]}"#)
            .reply(ANSWER_SYSTEM_PROMPT, "p1 [1], p2 [2]"),
        ScriptedSearch::default().with("q", vec!["p2", "p1"]),
        TableReranker::scoring(&[("p1", 0.9), ("p2", 0.5)]),
    );

    let output = h.pipeline.answer("Which passage?").await.unwrap();

    assert_eq!(output.retrieved_docs, vec!["p1", "p2"]);
    assert_eq!(output.sources.len(), 2);
    assert_eq!(output.sources[0].rank, 1);
    assert!((output.sources[0].score - 0.9).abs() < f32::EPSILON);
    assert_eq!(output.sources[1].rank, 2);
    assert!((output.sources[1].score - 0.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_expansion_failure_searches_with_question() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, "not json at all")
            .reply(ANSWER_SYSTEM_PROMPT, "From the manual [1]."),
        ScriptedSearch::default().with("How do I reset it?", vec!["Hold the button."]),
        TableReranker::scoring(&[("Hold the button.", 0.8)]),
    );

    let run = h.pipeline.run(question("How do I reset it?")).await.unwrap();

    assert_eq!(run.state.optimized_queries.as_slice(), ["How do I reset it?"]);
    assert_eq!(h.search.calls(), vec!["How do I reset it?"]);
    assert_eq!(run.state.retrieved_contents(), vec!["Hold the button."]);
    assert_eq!(run.state.final_answer, "From the manual [1].");
}

#[tokio::test]
async fn test_router_failure_defaults_to_retrieval() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, r#"{"datasource": "somewhere"}"#)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["q"]}"#)
            .reply(ANSWER_SYSTEM_PROMPT, "answer [1]"),
        ScriptedSearch::default().with("q", vec!["doc"]),
        TableReranker::scoring(&[("doc", 0.7)]),
    );

    let run = h.pipeline.run(question("anything")).await.unwrap();

    assert_eq!(run.routing, RoutingDecision::Retrieve);
    assert_eq!(run.state.retrieved_contents(), vec!["doc"]);
}

#[tokio::test]
async fn test_total_search_failure_is_not_empty_result() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["a", "b"]}"#)
            .reply(ANSWER_SYSTEM_PROMPT, "should not be used"),
        ScriptedSearch::down(),
        TableReranker::default(),
    );

    let err = h.pipeline.answer("What is Y?").await.unwrap_err();

    assert!(matches!(err, AgentError::RetrievalUnavailable(_)));
    assert_eq!(h.llm.calls_for(ANSWER_SYSTEM_PROMPT), 0);
}

#[tokio::test]
async fn test_generation_failure_propagates() {
    let h = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["q"]}"#),
        ScriptedSearch::default().with("q", vec!["doc"]),
        TableReranker::scoring(&[("doc", 0.7)]),
    );

    let err = h.pipeline.answer("anything").await.unwrap_err();
    assert!(matches!(err, AgentError::Generation(_)));
}

#[tokio::test]
async fn test_blank_question_rejected_before_any_call() {
    let h = harness(
        StageLlm::default().reply(ROUTER_SYSTEM_PROMPT, ROUTE_DIRECT),
        ScriptedSearch::default(),
        TableReranker::default(),
    );

    let err = h.pipeline.answer("   ").await.unwrap_err();

    assert!(matches!(err, AgentError::InvalidQuestion(_)));
    assert_eq!(h.llm.total_calls(), 0);
}

#[tokio::test]
async fn test_cached_answer_served_without_calls() {
    let Harness { llm, pipeline, .. } = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_DIRECT)
            .reply(DIRECT_SYSTEM_PROMPT, "Hi!"),
        ScriptedSearch::default(),
        TableReranker::default(),
    );
    let pipeline = pipeline.with_cache(AnswerCache::new(CacheSettings {
        ttl: Duration::from_secs(60),
        max_entries: 8,
    }));

    let first = pipeline.answer("Hello").await.unwrap();
    let calls_after_first = llm.total_calls();
    let second = pipeline.answer("  hello ").await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.final_answer, "Hi!");
    assert_eq!(llm.total_calls(), calls_after_first);
}

#[tokio::test]
async fn test_failed_answers_are_not_cached() {
    let Harness { pipeline, .. } = harness(
        StageLlm::default().reply(ROUTER_SYSTEM_PROMPT, ROUTE_DIRECT),
        ScriptedSearch::default(),
        TableReranker::default(),
    );
    let pipeline = pipeline.with_cache(AnswerCache::new(CacheSettings::default()));

    assert!(pipeline.answer("hello").await.is_err());
    assert!(pipeline.cache().map(|c| c.is_empty()).unwrap_or(false));
}

#[tokio::test]
async fn test_empty_retrieval_not_cached() {
    let Harness { pipeline, .. } = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_RETRIEVE)
            .reply(EXPANSION_SYSTEM_PROMPT, r#"{"queries": ["a"]}"#),
        ScriptedSearch::default(),
        TableReranker::default(),
    );
    let pipeline = pipeline.with_cache(AnswerCache::new(CacheSettings::default()));

    let output = pipeline.answer("What is RRF?").await.unwrap();

    assert_eq!(output.final_answer, NO_DOCUMENTS_MESSAGE);
    assert!(pipeline.cache().map(|c| c.is_empty()).unwrap_or(false));
}

#[tokio::test]
async fn test_invalidated_cache_runs_again() {
    let Harness { llm, pipeline, .. } = harness(
        StageLlm::default()
            .reply(ROUTER_SYSTEM_PROMPT, ROUTE_DIRECT)
            .reply(DIRECT_SYSTEM_PROMPT, "Hi!"),
        ScriptedSearch::default(),
        TableReranker::default(),
    );
    let pipeline = pipeline.with_cache(AnswerCache::new(CacheSettings::default()));

    pipeline.answer("hello").await.unwrap();
    pipeline.invalidate_cache();
    let again = pipeline.answer("hello").await.unwrap();

    assert!(!again.cached);
    assert_eq!(llm.calls_for(DIRECT_SYSTEM_PROMPT), 2);
}
