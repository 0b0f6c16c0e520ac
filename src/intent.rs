//! Intent classification for incoming messages
//!
//! Staged strategy, earlier stages always win: keyword match, then
//! state-based heuristics, then sentence structure, then an optional
//! injected resolver, then the casual default.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::ConversationState;

/// Purpose of a conversational turn; drives ranking weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DecisionRequest,
    Analysis,
    FactCheck,
    Planning,
    Reflection,
    KaizenReview,
    Casual,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Intent::DecisionRequest => "decision_request",
            Intent::Analysis => "analysis",
            Intent::FactCheck => "fact_check",
            Intent::Planning => "planning",
            Intent::Reflection => "reflection",
            Intent::KaizenReview => "kaizen_review",
            Intent::Casual => "casual",
        };
        write!(f, "{}", s)
    }
}

/// Fallback for messages the deterministic stages cannot place.
///
/// Meant for an external generative classifier; tests substitute
/// deterministic stubs. Returning `None` falls through to the casual
/// default.
#[async_trait]
pub trait AmbiguousIntentResolver: Send + Sync {
    async fn classify_ambiguous(
        &self,
        message: &str,
        state: Option<&ConversationState>,
    ) -> Option<Intent>;
}

/// Per-intent keyword lists, checked in priority order; first match wins
const KEYWORD_STAGES: &[(Intent, &[&str])] = &[
    (
        Intent::KaizenReview,
        &[
            "kaizen",
            "retrospective",
            "retro ",
            "post-mortem",
            "postmortem",
            "what went wrong",
            "what went well",
            "improve my process",
        ],
    ),
    (
        Intent::DecisionRequest,
        &[
            "should i",
            "should we",
            "decide",
            "decision",
            "choose",
            "which option",
            "worth it",
            "what do i do",
        ],
    ),
    (
        Intent::FactCheck,
        &[
            "is it true",
            "is that true",
            "fact check",
            "fact-check",
            "verify",
            "did i say",
            "do i remember",
            "correct me",
        ],
    ),
    (
        Intent::Planning,
        &[
            "plan",
            "schedule",
            "roadmap",
            "next steps",
            "next step",
            "organize",
            "how do i start",
        ],
    ),
    (
        Intent::Reflection,
        &[
            "i feel",
            "i felt",
            "i'm feeling",
            "reflect",
            "why do i keep",
            "thinking about my",
        ],
    ),
    (
        Intent::Analysis,
        &[
            "analyze",
            "analysis",
            "compare",
            "pros and cons",
            "tradeoff",
            "trade-off",
            "evaluate",
            "break down",
        ],
    ),
];

const INTERROGATIVE_OPENERS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "is", "are", "was", "were", "do",
    "does", "did", "can", "could", "should",
];

/// Staged intent classifier
pub struct IntentClassifier {
    resolver: Option<Arc<dyn AmbiguousIntentResolver>>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self { resolver: None }
    }

    /// Attach a fallback resolver for ambiguous messages
    pub fn with_resolver(resolver: Arc<dyn AmbiguousIntentResolver>) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Classify a message, using the state when the message alone is
    /// inconclusive
    pub async fn classify(&self, message: &str, state: Option<&ConversationState>) -> Intent {
        if let Some(intent) = keyword_intent(message) {
            return intent;
        }

        if let Some(intent) = state_intent(message, state) {
            return intent;
        }

        if let Some(intent) = structure_intent(message) {
            return intent;
        }

        if let Some(resolver) = &self.resolver {
            if let Some(intent) = resolver.classify_ambiguous(message, state).await {
                return intent;
            }
        }

        Intent::Casual
    }
}

/// Stage 1: deterministic keyword match, first category wins
pub(crate) fn keyword_intent(message: &str) -> Option<Intent> {
    let lower = message.to_lowercase();
    for (intent, keywords) in KEYWORD_STAGES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return Some(*intent);
        }
    }
    None
}

/// Stage 2: state-based heuristics
pub(crate) fn state_intent(message: &str, state: Option<&ConversationState>) -> Option<Intent> {
    let state = state?;

    if !state.open_questions.is_empty() && is_interrogative(message) {
        let lower = message.to_lowercase();
        let first = lower.split_whitespace().next().unwrap_or("");
        return if matches!(
            first,
            "is" | "are" | "was" | "were" | "do" | "does" | "did" | "what" | "when" | "where" | "who"
        ) {
            Some(Intent::FactCheck)
        } else {
            Some(Intent::Analysis)
        };
    }

    if state.goal.is_some() {
        return Some(Intent::Planning);
    }

    None
}

/// Stage 3: sentence-structure heuristics
pub(crate) fn structure_intent(message: &str) -> Option<Intent> {
    if !message.contains('?') {
        return None;
    }

    let lower = message.to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or("");
    if !INTERROGATIVE_OPENERS.contains(&first) {
        return None;
    }

    match first {
        "why" | "how" => Some(Intent::Analysis),
        "can" | "could" | "should" => Some(Intent::DecisionRequest),
        _ => Some(Intent::FactCheck),
    }
}

fn is_interrogative(message: &str) -> bool {
    if message.contains('?') {
        return true;
    }
    let lower = message.to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or("");
    INTERROGATIVE_OPENERS.contains(&first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversationState;

    fn classify_now(message: &str, state: Option<&ConversationState>) -> Intent {
        tokio_test::block_on(IntentClassifier::new().classify(message, state))
    }

    #[test]
    fn keywords_win_over_everything() {
        // "plan" keyword fires even though the state has open questions
        let mut state = ConversationState::new("o", "c", 48);
        state.open_questions.push("which bank?".to_string());

        assert_eq!(
            classify_now("let's plan the kitchen remodel?", Some(&state)),
            Intent::Planning
        );
    }

    #[test]
    fn keyword_priority_order_is_stable() {
        // Contains both a kaizen and a decision cue; kaizen has priority
        assert_eq!(
            classify_now("retrospective time: should i change anything?", None),
            Intent::KaizenReview
        );
    }

    #[test]
    fn open_questions_plus_interrogative_imply_fact_check() {
        let mut state = ConversationState::new("o", "c", 48);
        state.open_questions.push("is the loan approved?".to_string());

        assert_eq!(
            classify_now("did the bank reply yet?", Some(&state)),
            Intent::FactCheck
        );
    }

    #[test]
    fn established_goal_implies_planning() {
        let mut state = ConversationState::new("o", "c", 48);
        state.goal = Some("ship the release".to_string());

        assert_eq!(
            classify_now("ok, moving on to the docs", Some(&state)),
            Intent::Planning
        );
    }

    #[test]
    fn question_structure_maps_by_opener() {
        assert_eq!(classify_now("why does this keep happening?", None), Intent::Analysis);
        assert_eq!(classify_now("when was the meeting?", None), Intent::FactCheck);
    }

    #[test]
    fn default_is_casual() {
        assert_eq!(classify_now("good morning!", None), Intent::Casual);
    }

    #[test]
    fn resolver_runs_only_when_stages_are_inconclusive() {
        struct Always(Intent);

        #[async_trait]
        impl AmbiguousIntentResolver for Always {
            async fn classify_ambiguous(
                &self,
                _message: &str,
                _state: Option<&ConversationState>,
            ) -> Option<Intent> {
                Some(self.0)
            }
        }

        let classifier = IntentClassifier::with_resolver(Arc::new(Always(Intent::Reflection)));

        // Inconclusive message goes to the resolver
        let got = tokio_test::block_on(classifier.classify("hmm, interesting", None));
        assert_eq!(got, Intent::Reflection);

        // Keyword stage still pre-empts it
        let got = tokio_test::block_on(classifier.classify("should i take the job", None));
        assert_eq!(got, Intent::DecisionRequest);
    }
}
