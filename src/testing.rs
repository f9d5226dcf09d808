//! Scripted stand-ins for the model and the warehouse.

use crate::model::ChatModel;
use crate::tools::ToolSpec;
use crate::types::*;
use crate::warehouse::{QueryRequest, Warehouse};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A model that plays back a fixed list of replies.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    /// Reply returned forever once the script runs out.
    fallback: Option<ModelReply>,
    seen: Mutex<Vec<Vec<Content>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model that never stops asking for the same tool.
    pub fn repeating(reply: ModelReply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Conversations the model was called with, one per call.
    pub fn conversations(&self) -> Vec<Vec<Content>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, conversation: &[Content], _tools: &[ToolSpec]) -> Result<ModelResponse> {
        self.seen.lock().unwrap().push(conversation.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| anyhow!("script exhausted"))?;
        Ok(ModelResponse {
            reply,
            usage: TokenUsage {
                prompt_tokens: 10,
                candidate_tokens: 2,
                total_tokens: 12,
            },
        })
    }
}

pub fn tool_call(name: &str, arguments: serde_json::Value) -> ModelReply {
    ModelReply::ToolCall(ToolCallRequest {
        name: name.into(),
        arguments,
    })
}

pub fn final_text(text: &str) -> ModelReply {
    ModelReply::FinalText(text.into())
}

/// An in-memory warehouse with one GA4-shaped table.
#[derive(Default)]
pub struct FakeWarehouse {
    tables: Vec<String>,
    rows: Vec<Row>,
    query_error: Option<String>,
    queries: Mutex<Vec<QueryRequest>>,
}

impl FakeWarehouse {
    pub fn with_tables(tables: &[&str]) -> Self {
        Self {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_rows(rows: Vec<serde_json::Value>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .filter_map(|r| r.as_object().cloned())
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing_queries(message: &str) -> Self {
        Self {
            query_error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }
}

fn field(name: &str, ty: &str, mode: &str, fields: Vec<TableField>) -> TableField {
    TableField {
        name: name.into(),
        field_type: ty.into(),
        mode: mode.into(),
        fields,
        description: None,
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn list_tables(&self, _dataset_id: &str) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }

    async fn get_table(&self, table_id: &str) -> Result<TableMetadata> {
        Ok(TableMetadata {
            table_id: table_id.into(),
            description: Some("GA4 export".into()),
            num_rows: Some(26489),
            schema: vec![
                field("event_name", "STRING", "NULLABLE", vec![]),
                field(
                    "event_params",
                    "RECORD",
                    "REPEATED",
                    vec![
                        field("key", "STRING", "NULLABLE", vec![]),
                        field(
                            "value",
                            "RECORD",
                            "NULLABLE",
                            vec![field("string_value", "STRING", "NULLABLE", vec![])],
                        ),
                    ],
                ),
                field("privacy_info", "RECORD", "NULLABLE", vec![]),
            ],
        })
    }

    async fn run_query(&self, query: &QueryRequest) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(message) = &self.query_error {
            bail!("{}", message);
        }
        if self.rows.is_empty() {
            return Ok(vec![json!({"f0_": 1}).as_object().cloned().unwrap_or_default()]);
        }
        Ok(self.rows.clone())
    }
}
