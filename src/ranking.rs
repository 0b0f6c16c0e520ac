//! Intent-aware, time-aware relevance ranking
//!
//! Every retrieval candidate is rescored as
//! `semantic × type_weight(type, intent) × base_intent_weight ×
//! time_decay(type, age) × effectiveness_boost(outcomes)`.
//!
//! The weight matrix and decay table are static lookups over closed enums;
//! adding a memory type or intent without extending them is a compile
//! error.

use chrono::{DateTime, Utc};

use crate::intent::Intent;
use crate::memory::{MemoryItem, MemoryType};

/// Relevance multiplier for a memory type under a given intent.
///
/// Every (type, intent) pair resolves to an explicit value; nothing
/// defaults above neutral 1.0.
pub fn type_weight(memory_type: MemoryType, intent: Intent) -> f64 {
    use MemoryType::*;

    match intent {
        Intent::DecisionRequest => match memory_type {
            Principle => 1.5,
            Rule => 1.4,
            Decision => 1.2,
            Fact => 1.1,
            Insight => 1.1,
            Failure => 0.9,
            Task => 0.8,
            Hypothesis => 0.7,
            Thought => 0.6,
            Reflection => 0.4,
            Emotion => 0.2,
        },
        Intent::Analysis => match memory_type {
            Insight => 1.4,
            Fact => 1.3,
            Hypothesis => 1.2,
            Thought => 1.1,
            Principle => 1.1,
            Rule => 1.0,
            Decision => 1.0,
            Failure => 0.9,
            Reflection => 0.8,
            Task => 0.7,
            Emotion => 0.5,
        },
        Intent::FactCheck => match memory_type {
            Fact => 2.0,
            Insight => 1.2,
            Principle => 1.0,
            Rule => 1.0,
            Decision => 0.9,
            Task => 0.6,
            Failure => 0.5,
            Reflection => 0.4,
            Thought => 0.4,
            Emotion => 0.3,
            Hypothesis => 0.2,
        },
        Intent::Planning => match memory_type {
            Task => 1.5,
            Decision => 1.3,
            Rule => 1.2,
            Principle => 1.2,
            Fact => 1.0,
            Insight => 1.0,
            Hypothesis => 0.8,
            Failure => 0.8,
            Thought => 0.7,
            Reflection => 0.6,
            Emotion => 0.3,
        },
        Intent::Reflection => match memory_type {
            Reflection => 1.6,
            Emotion => 1.4,
            Insight => 1.4,
            Failure => 1.2,
            Thought => 1.1,
            Hypothesis => 0.9,
            Principle => 0.9,
            Fact => 0.8,
            Decision => 0.7,
            Rule => 0.5,
            Task => 0.4,
        },
        Intent::KaizenReview => match memory_type {
            Failure => 1.6,
            Insight => 1.4,
            Reflection => 1.3,
            Decision => 1.1,
            Principle => 1.0,
            Rule => 1.0,
            Hypothesis => 0.9,
            Fact => 0.9,
            Thought => 0.8,
            Task => 0.8,
            Emotion => 0.7,
        },
        Intent::Casual => 1.0,
    }
}

/// Linear decay parameters for one memory type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayParams {
    /// Score lost per day of age
    pub daily_loss: f64,
    /// Minimum multiplier, reached once the decay bottoms out
    pub floor: f64,
}

/// Decay parameters per memory type.
///
/// Principles and rules are immune to age. Facts and insights fade over
/// decades, decisions and tasks over a year or two, speculation within
/// months, and emotional snapshots fastest of all.
pub fn decay_params(memory_type: MemoryType) -> DecayParams {
    use MemoryType::*;

    match memory_type {
        Principle | Rule => DecayParams {
            daily_loss: 0.0,
            floor: 1.0,
        },
        Fact | Insight => DecayParams {
            daily_loss: 0.00003,
            floor: 0.78,
        },
        Decision | Task => DecayParams {
            daily_loss: 0.0006,
            floor: 0.7,
        },
        Reflection | Hypothesis | Thought => DecayParams {
            daily_loss: 0.0028,
            floor: 0.3,
        },
        Emotion | Failure => DecayParams {
            daily_loss: 0.0078,
            floor: 0.2,
        },
    }
}

/// Age multiplier: 1.0 at age zero, non-increasing, clamped at the
/// type's floor
pub fn time_decay(memory_type: MemoryType, age_days: f64) -> f64 {
    let params = decay_params(memory_type);
    (1.0 - params.daily_loss * age_days.max(0.0)).max(params.floor)
}

/// Multiplier from recorded outcomes of past use, bounded [0.85, 1.15]
pub fn effectiveness_boost(positive: u32, negative: u32) -> f64 {
    let total = positive + negative;
    if total == 0 {
        return 1.0;
    }
    let ratio = (f64::from(positive) - f64::from(negative)) / f64::from(total);
    (1.0 + 0.15 * ratio).clamp(0.85, 1.15)
}

/// A retrieval candidate after ranking
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub item: MemoryItem,
    /// Hybrid retrieval score the ranking started from
    pub semantic_score: f64,
    /// Fully weighted score the ordering uses
    pub final_score: f64,
}

/// Reorders retrieval candidates by intent, age and effectiveness
pub struct RankingEngine {
    base_intent_weight: f64,
}

impl RankingEngine {
    pub fn new(base_intent_weight: f64) -> Self {
        Self { base_intent_weight }
    }

    /// Score and sort candidates, best first. Ties go to the more
    /// recently created memory.
    pub fn rank(
        &self,
        candidates: Vec<(MemoryItem, f64)>,
        intent: Intent,
        now: DateTime<Utc>,
    ) -> Vec<ScoredMemory> {
        let mut scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .map(|(item, semantic_score)| {
                let age_days =
                    (now - item.created_at).num_milliseconds().max(0) as f64 / 86_400_000.0;

                let final_score = semantic_score
                    * type_weight(item.memory_type, intent)
                    * self.base_intent_weight
                    * time_decay(item.memory_type, age_days)
                    * effectiveness_boost(item.positive_outcomes, item.negative_outcomes);

                ScoredMemory {
                    item,
                    semantic_score,
                    final_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.item.created_at.cmp(&a.item.created_at))
        });

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALL_TYPES: [MemoryType; 11] = [
        MemoryType::Fact,
        MemoryType::Decision,
        MemoryType::Principle,
        MemoryType::Rule,
        MemoryType::Hypothesis,
        MemoryType::Reflection,
        MemoryType::Emotion,
        MemoryType::Failure,
        MemoryType::Task,
        MemoryType::Insight,
        MemoryType::Thought,
    ];

    #[test]
    fn decay_is_one_at_age_zero() {
        for t in ALL_TYPES {
            assert_eq!(time_decay(t, 0.0), 1.0, "{t}");
        }
    }

    #[test]
    fn decay_is_non_increasing_and_floored() {
        for t in ALL_TYPES {
            let floor = decay_params(t).floor;
            let mut previous = f64::INFINITY;
            for age in [0.0, 1.0, 30.0, 90.0, 180.0, 365.0, 3650.0, 36500.0] {
                let d = time_decay(t, age);
                assert!(d <= previous, "{t} increased at age {age}");
                assert!(d >= floor, "{t} fell below floor at age {age}");
                previous = d;
            }
        }
    }

    #[test]
    fn principles_and_rules_are_age_immune() {
        assert_eq!(time_decay(MemoryType::Principle, 36500.0), 1.0);
        assert_eq!(time_decay(MemoryType::Rule, 36500.0), 1.0);
    }

    #[test]
    fn facts_take_decades_to_reach_floor() {
        // Still above the floor after 19 years
        let nineteen_years = 19.0 * 365.0;
        assert!(time_decay(MemoryType::Fact, nineteen_years) > decay_params(MemoryType::Fact).floor);
    }

    #[test]
    fn speculation_halves_within_half_a_year() {
        let d = time_decay(MemoryType::Hypothesis, 180.0);
        assert!(d <= 0.55, "expected roughly halved, got {d}");
        assert!(d >= 0.45, "expected roughly halved, got {d}");
    }

    #[test]
    fn emotions_lose_most_of_their_weight_within_three_months() {
        let d = time_decay(MemoryType::Emotion, 90.0);
        assert!(d <= 0.35, "expected ~70% lost, got {d}");
    }

    #[test]
    fn weight_contracts_hold() {
        assert!(type_weight(MemoryType::Rule, Intent::DecisionRequest) >= 1.2);
        assert!(type_weight(MemoryType::Principle, Intent::DecisionRequest) >= 1.2);
        assert!(type_weight(MemoryType::Decision, Intent::DecisionRequest) >= 1.0);
        assert!(type_weight(MemoryType::Reflection, Intent::DecisionRequest) <= 0.5);
        assert!(type_weight(MemoryType::Emotion, Intent::DecisionRequest) <= 0.2);

        assert!(
            type_weight(MemoryType::Rule, Intent::DecisionRequest)
                > type_weight(MemoryType::Emotion, Intent::DecisionRequest)
        );
        assert!(
            type_weight(MemoryType::Fact, Intent::FactCheck)
                > type_weight(MemoryType::Hypothesis, Intent::FactCheck)
        );
        assert_eq!(type_weight(MemoryType::Fact, Intent::FactCheck), 2.0);
    }

    #[test]
    fn reflection_intent_elevates_inner_life_and_depresses_chores() {
        for elevated in [MemoryType::Reflection, MemoryType::Emotion, MemoryType::Insight] {
            assert!(type_weight(elevated, Intent::Reflection) > 1.0, "{elevated}");
        }
        for depressed in [MemoryType::Task, MemoryType::Rule] {
            assert!(type_weight(depressed, Intent::Reflection) < 1.0, "{depressed}");
        }
    }

    #[test]
    fn old_principle_outweighs_fresh_hypothesis_for_decisions() {
        let principle =
            type_weight(MemoryType::Principle, Intent::DecisionRequest) * time_decay(MemoryType::Principle, 730.0);
        let hypothesis =
            type_weight(MemoryType::Hypothesis, Intent::DecisionRequest) * time_decay(MemoryType::Hypothesis, 1.0);
        assert!(principle > hypothesis);
    }

    #[test]
    fn effectiveness_boost_is_bounded_and_neutral_without_data() {
        assert_eq!(effectiveness_boost(0, 0), 1.0);
        assert_eq!(effectiveness_boost(10, 0), 1.15);
        assert_eq!(effectiveness_boost(0, 10), 0.85);
        let mixed = effectiveness_boost(3, 1);
        assert!(mixed > 1.0 && mixed < 1.15);
    }

    #[test]
    fn fact_outranks_hypothesis_under_fact_check() {
        let now = Utc::now();
        let fact = MemoryItem::new("o", MemoryType::Fact, "the lease ends in June");
        let hypothesis = MemoryItem::new("o", MemoryType::Hypothesis, "the lease might auto-renew");

        let ranked = RankingEngine::new(1.0).rank(
            vec![(fact, 0.90), (hypothesis, 0.95)],
            Intent::FactCheck,
            now,
        );

        assert_eq!(ranked[0].item.memory_type, MemoryType::Fact);
        assert!(ranked[0].final_score > ranked[1].final_score);
    }

    #[test]
    fn ties_break_toward_the_more_recent_memory() {
        let now = Utc::now();
        // Principles are decay-immune, so equal semantic scores stay equal
        let older = MemoryItem::new("o", MemoryType::Principle, "a")
            .with_created_at(now - Duration::days(100));
        let newer = MemoryItem::new("o", MemoryType::Principle, "b")
            .with_created_at(now - Duration::days(10));
        let newer_id = newer.id;

        let ranked = RankingEngine::new(1.0).rank(
            vec![(older, 0.8), (newer, 0.8)],
            Intent::Casual,
            now,
        );

        assert_eq!(ranked[0].item.id, newer_id);
    }
}
