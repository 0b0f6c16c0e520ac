//! Conversation state: the structured running summary of a dialog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::ConfidenceLevel;

/// A decision confirmed during the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Deterministic id derived from the normalized summary, so the same
    /// decision confirmed twice maps to the same record
    pub id: Uuid,

    /// One-line summary of what was decided
    pub summary: String,

    /// When the decision was recorded
    pub timestamp: DateTime<Utc>,
}

impl DecisionRecord {
    /// Create a record whose id is a v5 UUID over the normalized summary
    pub fn new(summary: impl Into<String>) -> Self {
        let summary = summary.into();
        let normalized = normalize_summary(&summary);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes()),
            summary,
            timestamp: Utc::now(),
        }
    }
}

fn normalize_summary(summary: &str) -> String {
    summary
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Structured running summary of one conversation.
///
/// Singleton per (owner, conversation): the storage layer enforces at most
/// one live row per pair. Nullable fields mean "not yet established" and
/// are never guessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub owner_id: String,
    pub conversation_id: String,

    pub topic: Option<String>,
    pub goal: Option<String>,
    pub current_step: Option<String>,
    pub intent: Option<String>,

    /// Concrete referents for anaphora like "this" / "it"
    #[serde(default)]
    pub active_entities: Vec<String>,
    #[serde(default)]
    pub active_objects: Vec<String>,

    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,

    #[serde(default)]
    pub decisions_made: Vec<DecisionRecord>,

    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub unresolved_points: Vec<String>,

    pub confidence: ConfidenceLevel,

    pub last_updated: DateTime<Utc>,
    pub ttl_hours: i64,
}

impl ConversationState {
    /// Create an empty state for a conversation
    pub fn new(
        owner_id: impl Into<String>,
        conversation_id: impl Into<String>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            conversation_id: conversation_id.into(),
            topic: None,
            goal: None,
            current_step: None,
            intent: None,
            active_entities: Vec::new(),
            active_objects: Vec::new(),
            assumptions: Vec::new(),
            constraints: Vec::new(),
            decisions_made: Vec::new(),
            open_questions: Vec::new(),
            unresolved_points: Vec::new(),
            confidence: ConfidenceLevel::Unknown,
            last_updated: Utc::now(),
            ttl_hours,
        }
    }

    /// Fold merged fields into this state.
    ///
    /// Guard rails around the generative merge step: an absent or empty
    /// field keeps the previous value, so a merge can never clear
    /// information without supplying a replacement. Decision appends
    /// deduplicate on their content-derived id.
    pub fn absorb(&self, fields: &MergedFields, max_list_len: usize) -> ConversationState {
        let mut next = self.clone();

        if let Some(topic) = non_empty(&fields.topic) {
            next.topic = Some(topic);
        }
        if let Some(goal) = non_empty(&fields.goal) {
            next.goal = Some(goal);
        }
        if let Some(step) = non_empty(&fields.current_step) {
            next.current_step = Some(step);
        }
        if let Some(intent) = non_empty(&fields.intent) {
            next.intent = Some(intent);
        }

        if !fields.active_entities.is_empty() {
            next.active_entities = dedup_capped(&fields.active_entities, max_list_len);
        }
        if !fields.active_objects.is_empty() {
            next.active_objects = dedup_capped(&fields.active_objects, max_list_len);
        }
        if !fields.assumptions.is_empty() {
            next.assumptions = dedup_capped(&fields.assumptions, max_list_len);
        }
        if !fields.constraints.is_empty() {
            next.constraints = dedup_capped(&fields.constraints, max_list_len);
        }
        if !fields.open_questions.is_empty() {
            next.open_questions = dedup_capped(&fields.open_questions, max_list_len);
        }
        if !fields.unresolved_points.is_empty() {
            next.unresolved_points = dedup_capped(&fields.unresolved_points, max_list_len);
        }

        for summary in &fields.new_decisions {
            let record = DecisionRecord::new(summary);
            if !next.decisions_made.iter().any(|d| d.id == record.id) {
                next.decisions_made.push(record);
            }
        }

        if let Some(confidence) = fields.confidence {
            next.confidence = confidence;
        }

        next.last_updated = Utc::now();
        next
    }
}

/// Fields produced by one merge step, all optional.
///
/// This is the shape the state merger parses out of the generative reply;
/// `ConversationState::absorb` decides what actually changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergedFields {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub active_entities: Vec<String>,
    #[serde(default)]
    pub active_objects: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub unresolved_points: Vec<String>,
    #[serde(default)]
    pub new_decisions: Vec<String>,
    #[serde(default)]
    pub confidence: Option<ConfidenceLevel>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn dedup_capped(values: &[String], cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .take(cap)
        .collect()
}
