//! Per-message pipeline: state merge, intent, retrieval, ranking,
//! conflicts, assembly, and the usage feedback loop

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::conflict::{ConflictStrategy, TokenOverlap};
use crate::context::ContextAssembler;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::intent::{Intent, IntentClassifier};
use crate::memory::MemoryStore;
use crate::merge::StateMerger;
use crate::message::Turn;
use crate::ranking::RankingEngine;
use crate::retrieval::HybridRetrieval;
use crate::state::ConversationState;

/// What one processed message produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The assembled context block for the generation step
    pub context: String,

    /// Classified intent of the message
    pub intent: Intent,

    /// How many memories were surfaced into the context
    pub memories_used: usize,

    /// How many conflicts were flagged
    pub conflicts_found: usize,

    /// The conversation state after merging this message
    pub state: ConversationState,
}

/// Sequences the full pipeline for each incoming message
pub struct ContextPipeline {
    store: Arc<MemoryStore>,
    retrieval: HybridRetrieval,
    merger: Arc<dyn StateMerger>,
    classifier: IntentClassifier,
    ranking: RankingEngine,
    conflicts: Arc<dyn ConflictStrategy>,
    assembler: ContextAssembler,
    config: Config,
}

impl ContextPipeline {
    /// Build a pipeline over a store, an embedding provider and a state
    /// merger, with the default classifier and conflict strategy
    pub fn new(
        store: Arc<MemoryStore>,
        embedder: Arc<dyn Embedder>,
        merger: Arc<dyn StateMerger>,
    ) -> Self {
        let config = store.config().clone();
        Self {
            retrieval: HybridRetrieval::new(store.clone(), embedder, config.clone()),
            merger,
            classifier: IntentClassifier::new(),
            ranking: RankingEngine::new(config.base_intent_weight),
            conflicts: Arc::new(TokenOverlap::default()),
            assembler: ContextAssembler::new(config.recent_turns_window),
            store,
            config,
        }
    }

    /// Replace the intent classifier (e.g. to attach an ambiguity resolver)
    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the conflict detection strategy
    pub fn with_conflict_strategy(mut self, strategy: Arc<dyn ConflictStrategy>) -> Self {
        self.conflicts = strategy;
        self
    }

    /// Process one incoming message and assemble its context.
    ///
    /// Also records a recall usage event for every memory surfaced, which
    /// feeds effectiveness boosting on later turns.
    pub async fn process(
        &self,
        owner_id: &str,
        conversation_id: &str,
        message: &str,
        behavior_rules: &[String],
    ) -> Result<PipelineOutcome> {
        let recent_turns =
            self.store
                .recent_turns(owner_id, conversation_id, self.config.recent_turns_window)?;

        let previous = self
            .store
            .get_state(owner_id, conversation_id)?
            .unwrap_or_else(|| {
                ConversationState::new(owner_id, conversation_id, self.config.state_ttl_hours)
            });

        let merged = match self.merger.merge(&previous, &recent_turns, message).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "state merge failed, keeping previous state");
                previous.clone()
            }
        };
        let state = self.store.upsert_state(merged)?;

        let intent = self.classifier.classify(message, Some(&state)).await;

        let candidates = self
            .retrieval
            .search(message, owner_id, Some(&state), self.config.retrieval_limit)
            .await;

        let ranked = self.ranking.rank(candidates, intent, Utc::now());

        let conflicts = self.conflicts.detect(&ranked);

        let context = self.assembler.assemble(
            message,
            behavior_rules,
            Some(&state),
            &ranked,
            &recent_turns,
            &conflicts,
            Utc::now(),
        );

        let surfaced: Vec<Uuid> = ranked.iter().map(|m| m.item.id).collect();
        if let Err(e) = self.store.record_recall(&surfaced) {
            tracing::warn!(error = %e, "failed to record recall events");
        }

        tracing::debug!(
            owner = owner_id,
            conversation = conversation_id,
            intent = %intent,
            memories = surfaced.len(),
            conflicts = conflicts.len(),
            "assembled context"
        );

        Ok(PipelineOutcome {
            context,
            intent,
            memories_used: surfaced.len(),
            conflicts_found: conflicts.len(),
            state,
        })
    }

    /// Append a turn to the conversation log feeding the recent-turns
    /// window
    pub fn record_turn(&self, turn: &Turn) -> Result<()> {
        self.store.record_turn(turn)
    }

    /// Record the outcome of a surfaced memory once feedback arrives
    pub fn record_outcome(&self, memory_id: Uuid, positive: bool) -> Result<()> {
        self.store.record_outcome(memory_id, positive)
    }

    /// Run the TTL sweep over stored conversation states.
    ///
    /// Failures are logged and left for the next scheduled pass.
    pub fn cleanup_expired_states(&self) -> usize {
        match self.store.cleanup_expired_states() {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(count, "expired conversation states removed");
                }
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "state cleanup failed, will retry next sweep");
                0
            }
        }
    }
}
