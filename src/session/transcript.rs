//! Append-only transcript of a chat session.

use crate::types::{Role, ToolCallResult, Turn};
use serde_json::Value;

/// Ordered user and assistant turns. Entries are never edited once added.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn at the end and return it.
    pub fn append(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// All turns, oldest first.
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn. Only a session reset does this.
    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Markdown listing of the function calls behind an answer.
pub fn render_trace(trace: &[ToolCallResult]) -> String {
    let mut out = String::new();
    for call in trace {
        out.push_str("- Function call:\n");
        out.push_str(&format!("   - Function name: ```{}```\n\n", call.name));
        out.push_str(&format!("   - Function parameters: ```{}```\n\n", call.arguments));
        out.push_str(&format!("   - API response: ```{}```\n\n", render_payload(&call.payload)));
    }
    out
}

fn render_payload(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Re-render a whole transcript as markdown, one section per turn.
pub fn render_transcript(transcript: &Transcript) -> String {
    let mut out = String::new();
    for turn in transcript.all() {
        out.push_str(&format!("### {}\n\n{}\n\n", turn.role, turn.content));
        if turn.role == Role::Assistant && !turn.trace.is_empty() {
            out.push_str("Function calls, parameters, and responses:\n\n");
            out.push_str(&render_trace(&turn.trace));
        }
    }
    out
}
