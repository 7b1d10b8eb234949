//! Answering state machine
//!
//! ```text
//! START -> ROUTING -+-> EXPANDING -> RETRIEVING -> GENERATING -+-> END
//!                   |                                          |
//!                   +-> DIRECT_GENERATING ---------------------+
//! ```
//!
//! ROUTING is the only branch point. Every other stage merges exactly one
//! field into the [`PipelineState`] before the next one runs. No state is
//! kept between invocations apart from the optional answer cache.

use std::time::Instant;

use serde::Serialize;

use askdocs_core::{
    ExpandedQuerySet, PipelineState, Question, RoutingDecision, ScoredPassage, MAX_QUESTION_CHARS,
};
use askdocs_rag::RetrievalOrchestrator;

use crate::cache::AnswerCache;
use crate::expander::QueryExpander;
use crate::generator::{AnswerGenerator, DirectGenerator};
use crate::router::Router;
use crate::AgentError;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Start,
    Routing,
    Expanding,
    Retrieving,
    Generating,
    DirectGenerating,
    End,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Start => "START",
            PipelineStage::Routing => "ROUTING",
            PipelineStage::Expanding => "EXPANDING",
            PipelineStage::Retrieving => "RETRIEVING",
            PipelineStage::Generating => "GENERATING",
            PipelineStage::DirectGenerating => "DIRECT_GENERATING",
            PipelineStage::End => "END",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of one invocation plus the path it took
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub routing: RoutingDecision,
    /// Stages visited, START through END
    pub trace: Vec<PipelineStage>,
}

/// Result of [`RagPipeline::answer`]
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutput {
    pub final_answer: String,
    /// Passage contents in rank order
    pub retrieved_docs: Vec<String>,
    /// Passages with scores and ranks
    pub sources: Vec<ScoredPassage>,
    pub routing: RoutingDecision,
    pub cached: bool,
}

impl From<PipelineRun> for AnswerOutput {
    fn from(run: PipelineRun) -> Self {
        Self {
            retrieved_docs: run.state.retrieved_contents(),
            final_answer: run.state.final_answer,
            sources: run.state.retrieved_docs,
            routing: run.routing,
            cached: false,
        }
    }
}

pub struct RagPipeline {
    router: Router,
    expander: QueryExpander,
    retriever: RetrievalOrchestrator,
    generator: AnswerGenerator,
    direct: DirectGenerator,
    cache: Option<AnswerCache>,
    max_question_chars: usize,
}

impl RagPipeline {
    pub fn new(
        router: Router,
        expander: QueryExpander,
        retriever: RetrievalOrchestrator,
        generator: AnswerGenerator,
        direct: DirectGenerator,
    ) -> Self {
        Self {
            router,
            expander,
            retriever,
            generator,
            direct,
            cache: None,
            max_question_chars: MAX_QUESTION_CHARS,
        }
    }

    pub fn with_cache(mut self, cache: AnswerCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_max_question_chars(mut self, max_chars: usize) -> Self {
        self.max_question_chars = max_chars;
        self
    }

    pub fn cache(&self) -> Option<&AnswerCache> {
        self.cache.as_ref()
    }

    /// Drop every cached answer. Call after the index contents change.
    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            let dropped = cache.len();
            cache.clear();
            tracing::debug!(dropped, "Answer cache invalidated");
        }
    }

    /// Answer a raw question string
    ///
    /// Validates the question, serves fresh cached answers, otherwise runs
    /// the state machine and caches the result.
    pub async fn answer(&self, question: &str) -> Result<AnswerOutput, AgentError> {
        let question = Question::with_limit(question, self.max_question_chars)?;

        if let Some(cache) = &self.cache {
            if let Some(mut hit) = cache.get(&question) {
                metrics::counter!("askdocs_answer_cache_hits_total").increment(1);
                tracing::debug!("Answer served from cache");
                hit.cached = true;
                return Ok(hit);
            }
        }

        let output = AnswerOutput::from(self.run(question.clone()).await?);

        // An empty retrieval means the index had nothing yet; ingestion may fix that
        let grounded = output.routing == RoutingDecision::Direct || !output.sources.is_empty();
        if let Some(cache) = self.cache.as_ref().filter(|_| grounded) {
            cache.insert(&question, output.clone());
        }

        Ok(output)
    }

    /// Run the state machine for one question
    pub async fn run(&self, question: Question) -> Result<PipelineRun, AgentError> {
        let start = Instant::now();
        let mut state = PipelineState::new(question);
        // Overwritten in ROUTING, which every run passes through
        let mut routing = RoutingDecision::Retrieve;
        let mut trace = Vec::with_capacity(5);
        let mut stage = PipelineStage::Start;

        loop {
            trace.push(stage);
            let stage_start = Instant::now();

            let next = match stage {
                PipelineStage::Start => PipelineStage::Routing,

                PipelineStage::Routing => {
                    routing = self.router.route(&state.question).await;
                    match routing {
                        RoutingDecision::Retrieve => PipelineStage::Expanding,
                        RoutingDecision::Direct => PipelineStage::DirectGenerating,
                    }
                },

                PipelineStage::Expanding => {
                    state.optimized_queries = self.expand_or_fallback(&state.question).await;
                    PipelineStage::Retrieving
                },

                PipelineStage::Retrieving => {
                    state.retrieved_docs = self
                        .retriever
                        .retrieve(&state.question, &state.optimized_queries)
                        .await?;
                    PipelineStage::Generating
                },

                PipelineStage::Generating => {
                    state.final_answer = self
                        .generator
                        .generate(&state.question, &state.retrieved_docs)
                        .await?;
                    PipelineStage::End
                },

                PipelineStage::DirectGenerating => {
                    state.final_answer = self.direct.generate(&state.question).await?;
                    PipelineStage::End
                },

                PipelineStage::End => break,
            };

            tracing::debug!(
                stage = %stage,
                next = %next,
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                "Stage complete"
            );
            stage = next;
        }

        let elapsed = start.elapsed();
        metrics::histogram!("askdocs_pipeline_latency_seconds", "branch" => routing.as_str())
            .record(elapsed.as_secs_f64());

        tracing::info!(
            routing = %routing,
            queries = state.optimized_queries.len(),
            passages = state.retrieved_docs.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Question answered"
        );

        Ok(PipelineRun {
            state,
            routing,
            trace,
        })
    }

    async fn expand_or_fallback(&self, question: &Question) -> ExpandedQuerySet {
        match self.expander.expand(question).await {
            Ok(queries) => queries,
            Err(e) => {
                metrics::counter!("askdocs_expansion_fallbacks_total").increment(1);
                tracing::warn!(error = %e, "Query expansion failed, searching with the question");
                ExpandedQuerySet::from_question(question)
            },
        }
    }
}
