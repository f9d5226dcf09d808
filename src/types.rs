//! Shared types used across the sqltalk runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Model conversation
// ---------------------------------------------------------------------------

/// Author of a message in the model conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    User,
    Model,
    Function,
}

/// One piece of a conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FunctionCall {
        name: String,
        args: serde_json::Value,
    },
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

/// A message in the multi-turn model conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// The model's own function-call message, replayed before its response.
    pub fn model_call(request: &ToolCallRequest) -> Self {
        Self {
            role: ContentRole::Model,
            parts: vec![Part::FunctionCall {
                name: request.name.clone(),
                args: request.arguments.clone(),
            }],
        }
    }

    /// Wrap a tool result as a function-response message.
    pub fn function_response(result: &ToolCallResult) -> Self {
        Self {
            role: ContentRole::Function,
            parts: vec![Part::FunctionResponse {
                name: result.name.clone(),
                response: serde_json::json!({ "content": result.payload }),
            }],
        }
    }
}

/// What the model asked for on a single call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// The model is done; this is the answer for the user.
    FinalText(String),
    /// The model wants a tool executed before it continues.
    ToolCall(ToolCallRequest),
}

/// A model reply together with its token accounting.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub reply: ModelReply,
    pub usage: TokenUsage,
}

/// Token usage from a model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub candidate_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.candidate_tokens += other.candidate_tokens;
        self.total_tokens += other.total_tokens;
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A tool call request from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Result of executing a tool, echoing the request for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub name: String,
    pub arguments: serde_json::Value,
    pub payload: serde_json::Value,
    pub success: bool,
}

/// Ordered record of the tool calls backing one assistant turn.
pub type CallTrace = Vec<ToolCallResult>;

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry in the session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Tool calls behind an assistant answer; always empty for user turns.
    #[serde(default)]
    pub trace: CallTrace,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            role: Role::User,
            content: content.into(),
            trace: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, trace: CallTrace) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            role: Role::Assistant,
            content: content.into(),
            trace,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Warehouse schema
// ---------------------------------------------------------------------------

/// A column descriptor as returned by the warehouse, possibly nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub fields: Vec<TableField>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_mode() -> String {
    "NULLABLE".into()
}

/// A flattened column descriptor with a dotted name for nested fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: String,
    pub mode: String,
}

impl fmt::Display for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.field_type, self.mode)
    }
}

/// Table metadata used by `get_table`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    pub table_id: String,
    pub description: Option<String>,
    pub num_rows: Option<u64>,
    pub schema: Vec<TableField>,
}

/// A result row: column name to decoded value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;
