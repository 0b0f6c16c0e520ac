//! Hybrid retrieval: vector similarity fused with keyword relevance
//!
//! Vector and keyword search are independent reads over the same owner
//! scope and run concurrently. If the embedding provider is down the
//! engine degrades to keyword-only search; no error ever reaches the
//! caller, an empty list does.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::memory::{MemoryItem, MemoryStore};
use crate::state::ConversationState;

/// Hybrid search engine over one owner's active memories
pub struct HybridRetrieval {
    store: Arc<MemoryStore>,
    embedder: Arc<dyn Embedder>,
    config: Config,
}

impl HybridRetrieval {
    pub fn new(store: Arc<MemoryStore>, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Retrieve up to `limit` candidates for a query, best first.
    ///
    /// The returned score is the fused hybrid score in (0, 1].
    pub async fn search(
        &self,
        query: &str,
        owner_id: &str,
        state: Option<&ConversationState>,
        limit: usize,
    ) -> Vec<(MemoryItem, f64)> {
        let expanded = expand_query(query, state, self.config.query_expansion_entities);
        let pool = limit * self.config.candidate_multiplier;

        let embedding = match self.embedder.embed(&expanded).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                tracing::warn!(error = %e, "embedding provider failed, degrading to keyword-only search");
                None
            }
        };

        let vector_hits = async {
            match &embedding {
                Some(embedding) => self
                    .store
                    .vector()
                    .search(embedding, owner_id, pool)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "vector search failed");
                        Vec::new()
                    }),
                None => Vec::new(),
            }
        };
        let keyword_hits = async {
            self.store
                .sqlite()
                .keyword_search(owner_id, &expanded, pool)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "keyword search failed");
                    Vec::new()
                })
        };
        let (vector_hits, keyword_hits) = tokio::join!(vector_hits, keyword_hits);

        let fused = fuse(
            vector_hits,
            keyword_hits,
            self.config.vector_weight,
            self.config.keyword_weight,
            self.config.min_similarity,
        );

        let ids: Vec<Uuid> = fused.iter().map(|(id, _)| *id).collect();
        let items = match self.store.sqlite().get_active_memories(&ids) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "candidate hydration failed");
                return Vec::new();
            }
        };

        let mut by_id: HashMap<Uuid, MemoryItem> =
            items.into_iter().map(|item| (item.id, item)).collect();

        fused
            .into_iter()
            .filter_map(|(id, score)| by_id.remove(&id).map(|item| (item, score)))
            .take(limit)
            .collect()
    }
}

/// Append up to `max_entities` active entities from the state to the
/// raw query text
fn expand_query(query: &str, state: Option<&ConversationState>, max_entities: usize) -> String {
    let entities = state
        .map(|s| s.active_entities.as_slice())
        .unwrap_or_default();

    if entities.is_empty() || max_entities == 0 {
        return query.to_string();
    }

    let mut expanded = query.to_string();
    for entity in entities.iter().take(max_entities) {
        expanded.push(' ');
        expanded.push_str(entity);
    }
    expanded
}

/// Fuse vector and keyword hits into one descending-sorted candidate list.
///
/// Keyword scores are normalized against the best keyword hit. A
/// candidate survives when it has a keyword match or its vector
/// similarity clears `min_similarity`.
fn fuse(
    vector_hits: Vec<(Uuid, f64)>,
    keyword_hits: Vec<(Uuid, f64)>,
    vector_weight: f64,
    keyword_weight: f64,
    min_similarity: f64,
) -> Vec<(Uuid, f64)> {
    let max_keyword = keyword_hits
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0_f64, f64::max);

    let mut merged: HashMap<Uuid, (f64, f64)> = HashMap::new();
    for (id, score) in vector_hits {
        merged.entry(id).or_insert((0.0, 0.0)).0 = score;
    }
    for (id, score) in keyword_hits {
        let normalized = if max_keyword > 0.0 { score / max_keyword } else { 0.0 };
        merged.entry(id).or_insert((0.0, 0.0)).1 = normalized;
    }

    let mut fused: Vec<(Uuid, f64)> = merged
        .into_iter()
        .filter(|(_, (vector, keyword))| *keyword > 0.0 || *vector >= min_similarity)
        .map(|(id, (vector, keyword))| (id, vector * vector_weight + keyword * keyword_weight))
        .collect();

    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_expansion_appends_up_to_three_entities() {
        let mut state = ConversationState::new("o", "c", 48);
        state.active_entities = vec![
            "Riverside flat".to_string(),
            "First National Bank".to_string(),
            "June lease".to_string(),
            "ignored".to_string(),
        ];

        let expanded = expand_query("what about the deposit", Some(&state), 3);
        assert_eq!(
            expanded,
            "what about the deposit Riverside flat First National Bank June lease"
        );
    }

    #[test]
    fn query_expansion_is_identity_without_state() {
        assert_eq!(expand_query("hello", None, 3), "hello");
    }

    #[test]
    fn fuse_weights_both_signals() {
        let id = Uuid::new_v4();
        let fused = fuse(vec![(id, 0.8)], vec![(id, 4.0)], 0.7, 0.3, 0.35);

        assert_eq!(fused.len(), 1);
        // keyword normalizes to 1.0: 0.8*0.7 + 1.0*0.3
        assert!((fused[0].1 - 0.86).abs() < 1e-9);
    }

    #[test]
    fn fuse_drops_weak_vector_only_candidates() {
        let weak = Uuid::new_v4();
        let strong = Uuid::new_v4();
        let keyword_only = Uuid::new_v4();

        let fused = fuse(
            vec![(weak, 0.2), (strong, 0.9)],
            vec![(keyword_only, 2.0)],
            0.7,
            0.3,
            0.35,
        );

        let ids: Vec<Uuid> = fused.iter().map(|(id, _)| *id).collect();
        assert!(!ids.contains(&weak));
        assert!(ids.contains(&strong));
        assert!(ids.contains(&keyword_only));
    }

    #[test]
    fn fuse_sorts_descending() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let fused = fuse(vec![(a, 0.5), (b, 0.9)], vec![], 0.7, 0.3, 0.35);
        assert_eq!(fused[0].0, b);
        assert!(fused[0].1 > fused[1].1);
    }
}
