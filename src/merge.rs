//! State merging: fold new turns into the running conversation state
//!
//! The merge itself is delegated to a generative model. Whatever comes
//! back is parsed defensively and folded through
//! [`ConversationState::absorb`], so a malformed reply degrades to keeping
//! the previous state instead of corrupting it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::Generator;
use crate::message::Turn;
use crate::state::{ConversationState, MergedFields};

/// Produces the next conversation state from the previous one plus new turns
#[async_trait]
pub trait StateMerger: Send + Sync {
    /// Merge the current message (and recent turns) into the state.
    ///
    /// Implementations must never drop information without evidence and
    /// must leave topic/goal null when the conversation is ambiguous.
    async fn merge(
        &self,
        previous: &ConversationState,
        recent_turns: &[Turn],
        current_message: &str,
    ) -> Result<ConversationState>;
}

/// Merger that prompts a generative model and absorbs its JSON reply
pub struct GenerativeMerger {
    generator: Arc<dyn Generator>,
    max_list_len: usize,
}

impl GenerativeMerger {
    pub fn new(generator: Arc<dyn Generator>, max_list_len: usize) -> Self {
        Self {
            generator,
            max_list_len,
        }
    }

    fn build_prompt(
        previous: &ConversationState,
        recent_turns: &[Turn],
        current_message: &str,
    ) -> String {
        let state_json =
            serde_json::to_string_pretty(previous).unwrap_or_else(|_| "{}".to_string());

        let transcript: String = recent_turns
            .iter()
            .map(|t| format!("{}: {}\n", t.role, t.content))
            .collect();

        format!(
            "You maintain a structured summary of an ongoing conversation.\n\
             \n\
             Current state:\n{state_json}\n\
             \n\
             Recent turns:\n{transcript}\n\
             Current message:\n{current_message}\n\
             \n\
             Return a JSON object with any of these keys: topic, goal,\n\
             current_step, intent, active_entities, active_objects,\n\
             assumptions, constraints, open_questions, unresolved_points,\n\
             new_decisions, confidence.\n\
             \n\
             Rules:\n\
             - Only include a key when the new message gives explicit evidence it changed.\n\
             - Never invent a topic or goal; when unclear, omit the key.\n\
             - Resolve references like \"this\" or \"it\" into concrete names in active_entities.\n\
             - Add to new_decisions only when the user explicitly confirmed a decision.\n\
             - confidence is one of: high, medium, low, unknown.\n\
             \n\
             Reply with the JSON object only."
        )
    }

    /// Pull the first JSON object out of a model reply
    fn extract_json(reply: &str) -> Option<&str> {
        let start = reply.find('{')?;
        let end = reply.rfind('}')?;
        if end < start {
            return None;
        }
        Some(&reply[start..=end])
    }
}

#[async_trait]
impl StateMerger for GenerativeMerger {
    async fn merge(
        &self,
        previous: &ConversationState,
        recent_turns: &[Turn],
        current_message: &str,
    ) -> Result<ConversationState> {
        let prompt = Self::build_prompt(previous, recent_turns, current_message);

        let reply = match self.generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "state merge generation failed, keeping previous state");
                return Ok(previous.clone());
            }
        };

        let fields: MergedFields = match Self::extract_json(&reply)
            .and_then(|json| serde_json::from_str(json).ok())
        {
            Some(fields) => fields,
            None => {
                tracing::warn!("state merge reply was not valid JSON, keeping previous state");
                return Ok(previous.clone());
            }
        };

        Ok(previous.absorb(&fields, self.max_list_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct CannedGenerator(String);

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::generation("provider down"))
        }
    }

    fn previous() -> ConversationState {
        let mut state = ConversationState::new("owner", "conv", 48);
        state.topic = Some("gym schedule".to_string());
        state
    }

    #[tokio::test]
    async fn merge_applies_parsed_fields() {
        let reply = r#"Here is the update: {"goal": "train three times a week", "active_entities": ["City Gym"]}"#;
        let merger = GenerativeMerger::new(Arc::new(CannedGenerator(reply.to_string())), 10);

        let next = merger.merge(&previous(), &[], "let's aim for three sessions").await.unwrap();

        assert_eq!(next.topic, Some("gym schedule".to_string()));
        assert_eq!(next.goal, Some("train three times a week".to_string()));
        assert_eq!(next.active_entities, vec!["City Gym".to_string()]);
    }

    #[tokio::test]
    async fn malformed_reply_keeps_previous_state() {
        let merger =
            GenerativeMerger::new(Arc::new(CannedGenerator("not json at all".to_string())), 10);

        let prev = previous();
        let next = merger.merge(&prev, &[], "hello").await.unwrap();

        assert_eq!(next, prev);
    }

    #[tokio::test]
    async fn generator_failure_keeps_previous_state() {
        let merger = GenerativeMerger::new(Arc::new(FailingGenerator), 10);

        let prev = previous();
        let next = merger.merge(&prev, &[], "hello").await.unwrap();

        assert_eq!(next, prev);
    }

    #[test]
    fn extract_json_finds_embedded_object() {
        let reply = "Sure thing!\n{\"topic\": \"x\"}\nDone.";
        assert_eq!(GenerativeMerger::extract_json(reply), Some("{\"topic\": \"x\"}"));
        assert_eq!(GenerativeMerger::extract_json("no braces"), None);
    }
}
