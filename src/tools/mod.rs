pub mod catalog;
pub mod query;

pub use catalog::{tool_definitions, ToolCatalog, ToolKind, ToolSpec};

use crate::types::{ToolCallRequest, ToolCallResult};
use crate::warehouse::{flatten_schema, QueryRequest, Warehouse};
use serde_json::{json, Value};
use tracing::debug;

/// Why a tool call could not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing '{0}' argument")]
    MissingArgument(&'static str),

    #[error("Invalid '{name}' argument: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{0:#}")]
    Warehouse(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Tool execution engine
// ---------------------------------------------------------------------------

/// Handles a tool needs for one submission.
pub struct ToolContext<'a> {
    pub warehouse: &'a dyn Warehouse,
    /// Dataset reported by `list_datasets`.
    pub dataset_id: &'a str,
    pub max_bytes_billed: u64,
}

/// Execute a tool call by name. Failures come back as an unsuccessful result
/// whose payload is the error text.
pub async fn execute_tool(
    ctx: &ToolContext<'_>,
    catalog: &ToolCatalog,
    request: &ToolCallRequest,
) -> ToolCallResult {
    let result = match catalog.lookup(&request.name) {
        Some(kind) => run_tool(ctx, kind, &request.arguments).await,
        None => Err(ToolError::UnknownTool(request.name.clone())),
    };

    match result {
        Ok(payload) => ToolCallResult {
            name: request.name.clone(),
            arguments: request.arguments.clone(),
            payload,
            success: true,
        },
        Err(e) => ToolCallResult {
            name: request.name.clone(),
            arguments: request.arguments.clone(),
            payload: Value::String(e.to_string()),
            success: false,
        },
    }
}

async fn run_tool(ctx: &ToolContext<'_>, kind: ToolKind, args: &Value) -> Result<Value, ToolError> {
    match kind {
        ToolKind::ListDatasets => Ok(Value::String(ctx.dataset_id.to_string())),
        ToolKind::ListTables => {
            let dataset_id = required_str(args, "dataset_id")?;
            let tables = ctx.warehouse.list_tables(dataset_id).await?;
            Ok(json!(tables))
        }
        ToolKind::GetTable => {
            let table_id = required_str(args, "table_id")?;
            let table = ctx.warehouse.get_table(table_id).await?;
            Ok(json!({
                "description": table.description,
                "num_rows": table.num_rows,
                "schema": flatten_schema(&table.schema),
            }))
        }
        ToolKind::SqlQuery => {
            let sql = query::clean_sql(required_str(args, "query")?);
            run_rows(ctx, QueryRequest::new(sql, ctx.max_bytes_billed)).await
        }
        ToolKind::AnalyzeMetrics => {
            let request = query::analyze_metrics(
                required_str(args, "table_id")?,
                &required_str_list(args, "metric_columns")?,
                ctx.max_bytes_billed,
            )?;
            run_rows(ctx, request).await
        }
        ToolKind::GetDataInsights => {
            let request = query::data_insights(
                required_str(args, "table_id")?,
                required_str(args, "time_column")?,
                required_str(args, "metric_column")?,
                ctx.max_bytes_billed,
            )?;
            run_rows(ctx, request).await
        }
        ToolKind::AnalyzeEventMetrics => {
            let request = query::event_metrics(
                required_str(args, "table_id")?,
                required_str(args, "event_name")?,
                args["metric_path"].as_str(),
                ctx.max_bytes_billed,
            )?;
            run_rows(ctx, request).await
        }
    }
}

async fn run_rows(ctx: &ToolContext<'_>, request: QueryRequest) -> Result<Value, ToolError> {
    debug!("Running query: {}", request.sql);
    let rows = ctx.warehouse.run_query(&request).await?;
    Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
}

fn required_str<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    args[name]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ToolError::MissingArgument(name))
}

/// A string list argument; a comma-separated string is accepted too.
fn required_str_list(args: &Value, name: &'static str) -> Result<Vec<String>, ToolError> {
    match &args[name] {
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| ToolError::InvalidArgument {
                    name,
                    reason: format!("expected a list of strings, found {}", v),
                })
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => {
            Ok(s.split(',').map(|c| c.trim().to_string()).collect())
        }
        _ => Err(ToolError::MissingArgument(name)),
    }
}
