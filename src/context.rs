//! Context assembly: render state, memories, conflicts and recent turns
//! into one ordered text block
//!
//! Section order is fixed and non-reorderable. Empty sections are
//! omitted except the time context and the current message, which are
//! always present. The conversation-state summary always precedes the
//! recent-turns window.

use chrono::{DateTime, Utc};

use crate::conflict::Conflict;
use crate::memory::MemoryType;
use crate::message::Turn;
use crate::ranking::ScoredMemory;
use crate::state::ConversationState;

/// Renders the final context block handed to the generation step
pub struct ContextAssembler {
    recent_window: usize,
}

impl ContextAssembler {
    pub fn new(recent_window: usize) -> Self {
        Self { recent_window }
    }

    pub fn assemble(
        &self,
        user_message: &str,
        behavior_rules: &[String],
        state: Option<&ConversationState>,
        ranked: &[ScoredMemory],
        recent_turns: &[Turn],
        conflicts: &[Conflict],
        now: DateTime<Utc>,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();

        // 1. Time context, always present
        parts.push(format!(
            "## Time context\nCurrent time: {} ({})\n",
            now.format("%Y-%m-%d %H:%M UTC"),
            now.format("%A")
        ));

        // 2. Behavior rules
        if !behavior_rules.is_empty() {
            let mut section = String::from("## Behavior rules\n");
            for rule in behavior_rules {
                section.push_str(&format!("- {}\n", rule));
            }
            parts.push(section);
        }

        // 3. Conversation state summary
        if let Some(state) = state {
            if let Some(section) = render_state(state) {
                parts.push(section);
            }
        }

        // 4-9. Memory sections, fixed order
        let sections: [(&str, &[MemoryType]); 6] = [
            ("## Rules & principles", &[MemoryType::Principle, MemoryType::Rule]),
            ("## High-confidence facts", &[MemoryType::Fact]),
            ("## Decisions", &[MemoryType::Decision, MemoryType::Task]),
            ("## Hypotheses (unconfirmed)", &[MemoryType::Hypothesis]),
            (
                "## Reflections & failures",
                &[MemoryType::Reflection, MemoryType::Failure, MemoryType::Emotion],
            ),
            ("## Insights", &[MemoryType::Insight, MemoryType::Thought]),
        ];

        for (header, types) in sections {
            let lines: Vec<String> = ranked
                .iter()
                .filter(|m| types.contains(&m.item.memory_type))
                .map(render_memory_line)
                .collect();

            if !lines.is_empty() {
                parts.push(format!("{}\n{}", header, lines.join("")));
            }
        }

        // 10. Conflicts, never suppressed when present
        if !conflicts.is_empty() {
            let mut section = String::from("## Conflicts detected\n");
            for conflict in conflicts {
                section.push_str(&render_conflict_line(conflict, ranked));
            }
            parts.push(section);
        }

        // 11. Recent turns window
        if !recent_turns.is_empty() {
            let start = recent_turns.len().saturating_sub(self.recent_window);
            let mut section = String::from("## Recent conversation\n");
            for turn in &recent_turns[start..] {
                section.push_str(&format!("{}: {}\n", turn.role, turn.content));
            }
            parts.push(section);
        }

        // 12. Current message, always present
        parts.push(format!("## Current message\n{}\n", user_message));

        parts.join("\n")
    }
}

fn render_state(state: &ConversationState) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(topic) = &state.topic {
        lines.push(format!("Topic: {}", topic));
    }
    if let Some(goal) = &state.goal {
        lines.push(format!("Goal: {}", goal));
    }
    if let Some(step) = &state.current_step {
        lines.push(format!("Current step: {}", step));
    }
    if let Some(intent) = &state.intent {
        lines.push(format!("Intent: {}", intent));
    }
    if !state.active_entities.is_empty() {
        lines.push(format!("Active entities: {}", state.active_entities.join(", ")));
    }
    if !state.active_objects.is_empty() {
        lines.push(format!("Active objects: {}", state.active_objects.join(", ")));
    }
    if !state.assumptions.is_empty() {
        lines.push(format!("Assumptions: {}", state.assumptions.join("; ")));
    }
    if !state.constraints.is_empty() {
        lines.push(format!("Constraints: {}", state.constraints.join("; ")));
    }
    if !state.decisions_made.is_empty() {
        let recent: Vec<String> = state
            .decisions_made
            .iter()
            .rev()
            .take(5)
            .map(|d| format!("{} ({})", d.summary, d.timestamp.format("%Y-%m-%d")))
            .collect();
        lines.push(format!("Decisions so far: {}", recent.join("; ")));
    }
    if !state.open_questions.is_empty() {
        lines.push(format!("Open questions: {}", state.open_questions.join("; ")));
    }
    if !state.unresolved_points.is_empty() {
        lines.push(format!("Unresolved: {}", state.unresolved_points.join("; ")));
    }
    lines.push(format!("State confidence: {}", state.confidence));

    if lines.len() == 1 && state.topic.is_none() && state.goal.is_none() {
        // Nothing established yet; omit the section entirely
        return None;
    }

    Some(format!("## Conversation state\n{}\n", lines.join("\n")))
}

fn render_memory_line(memory: &ScoredMemory) -> String {
    format!(
        "- {} [{}] {} ({}, score {:.2}, used {}×)\n",
        memory.item.confidence.glyph(),
        memory.item.memory_type,
        memory.item.content,
        memory.item.created_at.format("%Y-%m-%d"),
        memory.final_score,
        memory.item.usage_count,
    )
}

fn render_conflict_line(conflict: &Conflict, ranked: &[ScoredMemory]) -> String {
    let describe = |id: uuid::Uuid| {
        ranked
            .iter()
            .find(|m| m.item.id == id)
            .map(|m| format!("\"{}\"", m.item.summary))
            .unwrap_or_else(|| id.to_string())
    };

    format!(
        "⚠️ {} may contradict {} ({}, confidence {:.2})\n",
        describe(conflict.memory_a),
        describe(conflict.memory_b),
        conflict.kind,
        conflict.confidence,
    )
}
