//! End-to-end pipeline tests over tempdir-backed stores

mod common;

use std::sync::Arc;

use common::{test_config, CannedGenerator, FailingEmbedder, StubEmbedder};
use vesper_memory::{
    Conflict, ConflictStrategy, ConfidenceLevel, ContextPipeline, Embedder, GenerativeMerger,
    HybridRetrieval, Intent, IntentClassifier, MemoryItem, MemoryStore, MemoryType, Role,
    ScoredMemory, Turn,
};

async fn seed_store(store: &MemoryStore, embedder: &StubEmbedder) {
    let items = [
        (MemoryType::Rule, "Never sign a contract without reading every clause"),
        (MemoryType::Fact, "The Riverside flat lease runs until June"),
        (MemoryType::Decision, "Signed the Riverside flat lease in June"),
        (MemoryType::Hypothesis, "The Riverside flat lease might fall through"),
    ];

    for (memory_type, content) in items {
        let embedding = embedder.embed(content).await.unwrap();
        let item = MemoryItem::new("owner-1", memory_type, content)
            .with_confidence(ConfidenceLevel::High)
            .with_embedding(embedding);
        store.save(item).await.unwrap();
    }
}

#[tokio::test]
async fn process_assembles_context_and_records_usage() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryStore::new(config).await.unwrap());
    let embedder = StubEmbedder::new(8);

    seed_store(&store, &embedder).await;

    store
        .record_turn(&Turn::new("owner-1", "conv-1", Role::User, "how is the flat hunt"))
        .unwrap();
    store
        .record_turn(&Turn::new("owner-1", "conv-1", Role::Assistant, "lease signed last week"))
        .unwrap();

    let merger = GenerativeMerger::new(
        Arc::new(CannedGenerator(
            r#"{"topic": "flat lease", "goal": "keep the Riverside flat"}"#.to_string(),
        )),
        10,
    );

    let pipeline = ContextPipeline::new(store.clone(), Arc::new(StubEmbedder::new(8)), Arc::new(merger));

    let outcome = pipeline
        .process("owner-1", "conv-1", "should we worry about the riverside lease?", &[])
        .await
        .unwrap();

    assert_eq!(outcome.intent, Intent::DecisionRequest);
    assert!(outcome.memories_used > 0);
    assert_eq!(outcome.state.topic, Some("flat lease".to_string()));

    // Overlapping decision and hypothesis were both surfaced
    assert!(outcome.conflicts_found >= 1);
    assert!(outcome.context.contains("## Conflicts detected"));

    // Ordering invariant: state summary before the recent-turns window
    let state_at = outcome.context.find("## Conversation state").unwrap();
    let turns_at = outcome.context.find("## Recent conversation").unwrap();
    assert!(state_at < turns_at);

    // Feedback loop: every surfaced memory gained a recall
    let listed = store.list("owner-1", None, None).unwrap();
    let recalled = listed.iter().filter(|m| m.usage_count > 0).count();
    assert_eq!(recalled, outcome.memories_used);
}

#[tokio::test]
async fn embedding_failure_degrades_to_keyword_search() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryStore::new(config.clone()).await.unwrap());

    seed_store(&store, &StubEmbedder::new(8)).await;

    let retrieval = HybridRetrieval::new(store.clone(), Arc::new(FailingEmbedder), config);

    let results = retrieval
        .search("riverside lease", "owner-1", None, 10)
        .await;

    assert!(!results.is_empty());
    assert!(results
        .iter()
        .all(|(item, _)| item.content.to_lowercase().contains("riverside")));
}

#[tokio::test]
async fn retrieval_never_crosses_owner_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryStore::new(config.clone()).await.unwrap());
    let embedder = StubEmbedder::new(8);

    seed_store(&store, &embedder).await;

    let other = MemoryItem::new("owner-2", MemoryType::Fact, "owner two riverside lease note")
        .with_embedding(embedder.embed("owner two riverside lease note").await.unwrap());
    store.save(other).await.unwrap();

    let retrieval = HybridRetrieval::new(store.clone(), Arc::new(StubEmbedder::new(8)), config);
    let results = retrieval.search("riverside lease", "owner-1", None, 10).await;

    assert!(!results.is_empty());
    assert!(results.iter().all(|(item, _)| item.owner_id == "owner-1"));
}

#[tokio::test]
async fn pipeline_accepts_custom_classifier_and_conflict_strategy() {
    struct NoConflicts;

    impl ConflictStrategy for NoConflicts {
        fn detect(&self, _ranked: &[ScoredMemory]) -> Vec<Conflict> {
            Vec::new()
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryStore::new(config).await.unwrap());
    seed_store(&store, &StubEmbedder::new(8)).await;

    let merger = GenerativeMerger::new(Arc::new(CannedGenerator("{}".to_string())), 10);
    let pipeline = ContextPipeline::new(store, Arc::new(StubEmbedder::new(8)), Arc::new(merger))
        .with_classifier(IntentClassifier::new())
        .with_conflict_strategy(Arc::new(NoConflicts));

    let outcome = pipeline
        .process("owner-1", "conv-1", "tell me about the riverside lease", &[])
        .await
        .unwrap();

    assert_eq!(outcome.conflicts_found, 0);
    assert!(!outcome.context.contains("## Conflicts detected"));
}

#[tokio::test]
async fn only_active_memories_are_retrievable() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryStore::new(config.clone()).await.unwrap());
    let embedder = StubEmbedder::new(8);

    seed_store(&store, &embedder).await;

    let hypothesis = store
        .list("owner-1", None, Some(MemoryType::Hypothesis))
        .unwrap()
        .pop()
        .unwrap();
    store
        .set_status(hypothesis.id, vesper_memory::MemoryStatus::Archived)
        .await
        .unwrap();

    let retrieval = HybridRetrieval::new(store.clone(), Arc::new(StubEmbedder::new(8)), config);
    let results = retrieval.search("riverside lease", "owner-1", None, 10).await;

    assert!(!results.is_empty());
    assert!(results.iter().all(|(item, _)| item.id != hypothesis.id));

    let active = store
        .list("owner-1", Some(vesper_memory::MemoryStatus::Active), None)
        .unwrap();
    assert_eq!(active.len(), 3);
}

#[tokio::test]
async fn turn_log_is_per_conversation_and_deletable() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new(test_config(dir.path())).await.unwrap();

    for i in 0..7 {
        store
            .record_turn(&Turn::new("owner-1", "conv-a", Role::User, format!("a{i}")))
            .unwrap();
    }
    store
        .record_turn(&Turn::new("owner-1", "conv-b", Role::User, "b0"))
        .unwrap();

    let recent = store.recent_turns("owner-1", "conv-a", 5).unwrap();
    assert_eq!(recent.len(), 5);
    assert_eq!(recent.first().unwrap().content, "a2");
    assert_eq!(recent.last().unwrap().content, "a6");

    let mut conversations = store.turns().list_conversations("owner-1").unwrap();
    conversations.sort();
    assert_eq!(conversations, vec!["conv-a".to_string(), "conv-b".to_string()]);

    store.turns().delete_conversation("owner-1", "conv-a").unwrap();
    assert!(store.recent_turns("owner-1", "conv-a", 5).unwrap().is_empty());
}

#[tokio::test]
async fn merge_failure_keeps_pipeline_alive() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryStore::new(config).await.unwrap());

    seed_store(&store, &StubEmbedder::new(8)).await;

    // Merger reply is garbage; the pipeline must still produce a context
    let merger = GenerativeMerger::new(Arc::new(CannedGenerator("][not json".to_string())), 10);
    let pipeline = ContextPipeline::new(store, Arc::new(StubEmbedder::new(8)), Arc::new(merger));

    let outcome = pipeline
        .process("owner-1", "conv-1", "anything new about the riverside lease?", &[])
        .await
        .unwrap();

    assert!(outcome.context.contains("## Current message"));
    assert_eq!(outcome.state.topic, None);
}
