//! Contradiction flagging among surfaced memories
//!
//! The shipped strategy is a token-overlap heuristic over
//! (decision, hypothesis) pairs. It sits behind a strategy trait so a
//! semantic-similarity detector can replace it without touching the
//! assembler or the pipeline.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::memory::MemoryType;
use crate::ranking::ScoredMemory;

/// What kind of contradiction was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DecisionVsHypothesis,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::DecisionVsHypothesis => write!(f, "decision_vs_hypothesis"),
        }
    }
}

/// A flagged pair of plausibly contradicting memories, computed per request
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub memory_a: Uuid,
    pub memory_b: Uuid,
    pub kind: ConflictKind,
    pub confidence: f64,
}

/// Pluggable contradiction detector.
///
/// Implementations must degrade internal failures to an empty list;
/// missing conflict output must never abort context assembly.
pub trait ConflictStrategy: Send + Sync {
    fn detect(&self, ranked: &[ScoredMemory]) -> Vec<Conflict>;
}

/// Flags (decision, hypothesis) pairs whose contents share enough
/// normalized tokens
pub struct TokenOverlap {
    min_shared_tokens: usize,
    confidence: f64,
}

impl Default for TokenOverlap {
    fn default() -> Self {
        Self {
            min_shared_tokens: 3,
            confidence: 0.7,
        }
    }
}

impl ConflictStrategy for TokenOverlap {
    fn detect(&self, ranked: &[ScoredMemory]) -> Vec<Conflict> {
        let decisions: Vec<&ScoredMemory> = ranked
            .iter()
            .filter(|m| m.item.memory_type == MemoryType::Decision)
            .collect();
        let hypotheses: Vec<&ScoredMemory> = ranked
            .iter()
            .filter(|m| m.item.memory_type == MemoryType::Hypothesis)
            .collect();

        let mut conflicts = Vec::new();

        for decision in &decisions {
            let decision_tokens = normalized_tokens(&decision.item.content);
            for hypothesis in &hypotheses {
                let hypothesis_tokens = normalized_tokens(&hypothesis.item.content);
                let shared = decision_tokens.intersection(&hypothesis_tokens).count();

                if shared >= self.min_shared_tokens {
                    conflicts.push(Conflict {
                        memory_a: decision.item.id,
                        memory_b: hypothesis.item.id,
                        kind: ConflictKind::DecisionVsHypothesis,
                        confidence: self.confidence,
                    });
                }
            }
        }

        conflicts
    }
}

/// Lowercased alphanumeric tokens, short stop-like tokens removed
fn normalized_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryItem;

    fn scored(memory_type: MemoryType, content: &str) -> ScoredMemory {
        ScoredMemory {
            item: MemoryItem::new("owner", memory_type, content),
            semantic_score: 0.8,
            final_score: 0.8,
        }
    }

    #[test]
    fn flags_overlapping_decision_hypothesis_pair() {
        let ranked = vec![
            scored(MemoryType::Decision, "Signed the Riverside flat lease in June"),
            scored(MemoryType::Hypothesis, "The Riverside flat lease might fall through"),
        ];

        let conflicts = TokenOverlap::default().detect(&ranked);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DecisionVsHypothesis);
        assert_eq!(conflicts[0].memory_a, ranked[0].item.id);
        assert_eq!(conflicts[0].memory_b, ranked[1].item.id);
        assert!((conflicts[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn too_little_overlap_is_not_a_conflict() {
        let ranked = vec![
            scored(MemoryType::Decision, "Joined the morning gym class"),
            scored(MemoryType::Hypothesis, "The Riverside flat lease might fall through"),
        ];

        assert!(TokenOverlap::default().detect(&ranked).is_empty());
    }

    #[test]
    fn other_type_pairs_are_ignored() {
        let ranked = vec![
            scored(MemoryType::Fact, "Riverside flat lease signed June"),
            scored(MemoryType::Hypothesis, "Riverside flat lease might fall through June"),
        ];

        assert!(TokenOverlap::default().detect(&ranked).is_empty());
    }

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        let ranked = vec![
            scored(MemoryType::Decision, "Chose PostgreSQL, over MongoDB, for analytics!"),
            scored(MemoryType::Hypothesis, "postgresql might not scale for analytics over time"),
        ];

        assert_eq!(TokenOverlap::default().detect(&ranked).len(), 1);
    }
}
