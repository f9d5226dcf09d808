//! The fixed set of tools exposed to the model.
//!
//! Every tool is a `ToolKind` variant. Both the declaration handed to the
//! model and the execution branch are exhaustive matches on that enum, so a
//! tool cannot be declared without being executable.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Definition of a tool exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListDatasets,
    ListTables,
    GetTable,
    SqlQuery,
    AnalyzeMetrics,
    GetDataInsights,
    AnalyzeEventMetrics,
}

impl ToolKind {
    /// Every tool, in the order it is declared to the model.
    pub const ALL: [ToolKind; 7] = [
        ToolKind::ListDatasets,
        ToolKind::ListTables,
        ToolKind::GetTable,
        ToolKind::SqlQuery,
        ToolKind::AnalyzeMetrics,
        ToolKind::GetDataInsights,
        ToolKind::AnalyzeEventMetrics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ListDatasets => "list_datasets",
            Self::ListTables => "list_tables",
            Self::GetTable => "get_table",
            Self::SqlQuery => "sql_query",
            Self::AnalyzeMetrics => "analyze_metrics",
            Self::GetDataInsights => "get_data_insights",
            Self::AnalyzeEventMetrics => "analyze_event_metrics",
        }
    }

    /// The declaration the model sees for this tool.
    pub fn spec(self) -> ToolSpec {
        let (description, parameters) = match self {
            Self::ListDatasets => (
                "Get a list of datasets that will help answer the user's question",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            Self::ListTables => (
                "List tables in a dataset that will help answer the user's question",
                json!({
                    "type": "object",
                    "properties": {
                        "dataset_id": {
                            "type": "string",
                            "description": "Dataset ID to fetch tables from."
                        }
                    },
                    "required": ["dataset_id"]
                }),
            ),
            Self::GetTable => (
                "Get information about a table, including the description, schema, and number \
                 of rows that will help answer the user's question. Always use the fully \
                 qualified dataset and table names.",
                json!({
                    "type": "object",
                    "properties": {
                        "table_id": {
                            "type": "string",
                            "description": "Fully qualified ID of the table to get information about"
                        }
                    },
                    "required": ["table_id"]
                }),
            ),
            Self::SqlQuery => (
                "Get information from data in BigQuery using SQL queries",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "SQL query on a single line that will help give \
                                quantitative answers to the user's question when run on a \
                                BigQuery dataset and table. In the SQL query, always use the \
                                fully qualified dataset and table names."
                        }
                    },
                    "required": ["query"]
                }),
            ),
            Self::AnalyzeMetrics => (
                "Analyze key metrics and their relationships within a table",
                json!({
                    "type": "object",
                    "properties": {
                        "table_id": {
                            "type": "string",
                            "description": "Fully qualified table ID to analyze"
                        },
                        "metric_columns": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "List of columns containing metrics to analyze"
                        }
                    },
                    "required": ["table_id", "metric_columns"]
                }),
            ),
            Self::GetDataInsights => (
                "Generate insights about trends, patterns, and correlations in the data",
                json!({
                    "type": "object",
                    "properties": {
                        "table_id": {
                            "type": "string",
                            "description": "Fully qualified table ID"
                        },
                        "time_column": {
                            "type": "string",
                            "description": "Column containing timestamp or date information"
                        },
                        "metric_column": {
                            "type": "string",
                            "description": "Column containing the metric to analyze"
                        }
                    },
                    "required": ["table_id", "time_column", "metric_column"]
                }),
            ),
            Self::AnalyzeEventMetrics => (
                "Analyze metrics for specific events in GA4 data",
                json!({
                    "type": "object",
                    "properties": {
                        "table_id": {
                            "type": "string",
                            "description": "Fully qualified table ID"
                        },
                        "event_name": {
                            "type": "string",
                            "description": "Name of the event to analyze"
                        },
                        "metric_path": {
                            "type": "string",
                            "description": "Nested path to the metric (e.g., 'event_params.value.string_value')"
                        }
                    },
                    "required": ["table_id", "event_name"]
                }),
            ),
        };

        ToolSpec {
            name: self.name().into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Build the list of tool definitions exposed to the model.
pub fn tool_definitions() -> Vec<ToolSpec> {
    ToolKind::ALL.iter().map(|k| k.spec()).collect()
}

/// Tool declarations plus the name lookup used for dispatch.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
    by_name: HashMap<&'static str, ToolKind>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        let by_name: HashMap<_, _> = ToolKind::ALL.iter().map(|k| (k.name(), *k)).collect();
        debug_assert_eq!(by_name.len(), ToolKind::ALL.len(), "duplicate tool name");
        Self {
            specs: tool_definitions(),
            by_name,
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Resolve a model-supplied tool name.
    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        self.by_name.get(name).copied()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}
