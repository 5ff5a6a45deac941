//! The retrieval-evaluate-respond loop.
//!
//! One query in, one [`AgentResponse`] out: local retrieval, an LLM
//! sufficiency judgment, at most one web-search fallback, composition, and
//! a durable conversation-state flush. Collaborator failures are converted
//! to degraded evidence here; nothing transport-level leaks into the
//! decision logic.

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::models::{
    AgentResponse, ConversationState, EvaluationVerdict, RecordHit, RetrievalMethod, WebHit,
};
use crate::reasoner::Reasoner;
use crate::state::StateStore;
use crate::store::GameRecordStore;
use crate::websearch::WebSearchProvider;

pub struct ResearchAgent {
    store: Arc<dyn GameRecordStore>,
    web: Arc<dyn WebSearchProvider>,
    reasoner: Arc<dyn Reasoner>,
    state_store: StateStore,
    state: ConversationState,
    config: AgentConfig,
}

impl ResearchAgent {
    /// Build an agent, restoring any previously persisted conversation.
    ///
    /// Fails with [`AgentError::CorruptState`] if a state file exists but
    /// cannot be read; the operator decides what to do with it.
    pub fn new(
        store: Arc<dyn GameRecordStore>,
        web: Arc<dyn WebSearchProvider>,
        reasoner: Arc<dyn Reasoner>,
        state_store: StateStore,
        config: AgentConfig,
    ) -> Result<Self, AgentError> {
        let state = state_store.restore()?;
        Ok(Self {
            store,
            web,
            reasoner,
            state_store,
            state,
            config,
        })
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Drop the in-memory conversation history and flush the cleared state.
    pub fn clear_conversation(&mut self) -> Result<(), AgentError> {
        self.state.clear();
        self.state_store.persist(&self.state)
    }

    /// Process one query to completion and record the turn.
    ///
    /// A persistence failure after composition is logged but does not mask
    /// the answer; the in-memory state still reflects the new turn.
    pub async fn process_query(&mut self, query: &str) -> Result<AgentResponse, AgentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::EmptyQuery);
        }

        tracing::info!("Processing query: {}", query);

        // Step 1: local retrieval. An unreachable store degrades to the
        // web-only path instead of failing the query.
        let local_evidence: Vec<RecordHit> =
            match self.store.search(query, self.config.max_candidates).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!("Local store unreachable, degrading to web-only: {}", e);
                    Vec::new()
                }
            };
        tracing::info!("Retrieved {} candidate(s) from local store", local_evidence.len());

        // Step 2: sufficiency evaluation. Zero candidates is an automatic
        // insufficiency verdict; the judge round trip is skipped.
        let verdict = if local_evidence.is_empty() {
            EvaluationVerdict::insufficient("No games were retrieved from the database")
        } else {
            match self.reasoner.evaluate(query, &local_evidence).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::warn!("Evaluation unavailable, forcing web fallback: {}", e);
                    EvaluationVerdict::insufficient(format!("Evaluation unavailable: {}", e))
                }
            }
        };
        tracing::info!(
            "Evaluation: sufficient={} confidence={:.2} ({})",
            verdict.sufficient,
            verdict.confidence,
            verdict.rationale
        );

        // Step 3: at-most-once web fallback.
        let needs_web =
            !verdict.sufficient || verdict.confidence < self.config.confidence_threshold;
        let web_evidence: Vec<WebHit> = if needs_web {
            tracing::info!("Local knowledge insufficient, searching web...");
            match self.web.search(query, self.config.max_web_results).await {
                Ok(hits) => {
                    tracing::info!("Found {} web result(s)", hits.len());
                    hits
                }
                Err(e) => {
                    tracing::warn!("Web search unavailable, composing from local evidence: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        // Step 4: composition. An unreachable reasoner here fails the
        // query; no stale or fabricated answer is substituted.
        let composition = self
            .reasoner
            .answer(query, &local_evidence, &web_evidence)
            .await
            .map_err(AgentError::ReasoningUnavailable)?;

        let retrieval_method = tag_method(&local_evidence, &web_evidence);
        let response = AgentResponse {
            answer: composition.answer,
            confidence: composition.confidence.clamp(0.0, 1.0),
            sources: composition.citations,
            retrieval_method,
        };

        // Step 5: record the turn and flush.
        self.state.record_turn(query.to_string(), response.clone());
        if let Err(e) = self.state_store.persist(&self.state) {
            tracing::warn!("Answer produced but state was not durably flushed: {}", e);
        }

        Ok(response)
    }
}

/// Tag which evidence source(s) fed the composition: `combined` iff both
/// sets were non-empty, `web_search` iff only web evidence was used,
/// `vector_db` otherwise.
fn tag_method(local: &[RecordHit], web: &[WebHit]) -> RetrievalMethod {
    match (local.is_empty(), web.is_empty()) {
        (false, false) => RetrievalMethod::Combined,
        (true, false) => RetrievalMethod::WebSearch,
        _ => RetrievalMethod::VectorDb,
    }
}
