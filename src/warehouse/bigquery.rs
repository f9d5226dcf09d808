//! BigQuery v2 REST client for table listing, metadata and query jobs.

use crate::config::SqlTalkConfig;
use crate::types::{Row, TableField, TableMetadata};
use crate::warehouse::{DatasetRef, QueryRequest, TableRef, Warehouse};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// How long a single jobs.query / getQueryResults call may wait server-side.
const JOB_WAIT_MS: u64 = 10_000;

/// BigQuery REST client.
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    base_url: String,
    access_token: String,
    /// Project used to resolve unqualified dataset and table ids.
    default_project: String,
    /// Project that query jobs are created (and billed) in.
    billing_project: String,
    location: Option<String>,
    http: reqwest::Client,
}

// -- Request / response types -----------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryJobRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    /// int64 values travel as strings in the REST API.
    maximum_bytes_billed: String,
    timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_parameters: Vec<QueryParameterPayload<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameterPayload<'a> {
    name: &'a str,
    parameter_type: ParameterTypePayload,
    parameter_value: ParameterValuePayload<'a>,
}

#[derive(Debug, Serialize)]
struct ParameterTypePayload {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValuePayload<'a> {
    value: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<SchemaPayload>,
    #[serde(default)]
    rows: Vec<Value>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaPayload {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableListResponse {
    #[serde(default)]
    tables: Vec<TableListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableListEntry {
    table_reference: TableReferencePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReferencePayload {
    table_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResponse {
    description: Option<String>,
    num_rows: Option<String>,
    #[serde(default)]
    schema: SchemaPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

impl BigQueryClient {
    /// Create a client from the runtime configuration.
    pub fn new(config: &SqlTalkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build BigQuery HTTP client")?;

        let location = Some(config.query_location.clone()).filter(|l| !l.is_empty());

        Ok(Self {
            base_url: config.warehouse_api_url.trim_end_matches('/').to_string(),
            access_token: config.resolved_warehouse_token(),
            default_project: config.dataset_project().unwrap_or_default().to_string(),
            billing_project: config.effective_billing_project().to_string(),
            location,
            http,
        })
    }

    /// Send a request and decode the JSON body, turning API errors into messages.
    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder, op: &str) -> Result<T> {
        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("BigQuery {} request failed", op))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            bail!("BigQuery {} failed ({}): {}", op, status, message);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse BigQuery {} response", op))
    }

    /// Fetch a further page (or completion) of a running query job.
    async fn query_results(&self, job: &JobReference, page_token: Option<&str>) -> Result<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, job.project_id, job.job_id
        );
        let mut query: Vec<(&str, String)> = vec![("timeoutMs", JOB_WAIT_MS.to_string())];
        if let Some(location) = &job.location {
            query.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        self.send(self.http.get(url).query(&query), "getQueryResults")
            .await
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>> {
        let dataset = DatasetRef::parse(dataset_id, &self.default_project)?;
        let url = format!(
            "{}/projects/{}/datasets/{}/tables",
            self.base_url, dataset.project, dataset.dataset
        );
        debug!("BigQuery list_tables: {}.{}", dataset.project, dataset.dataset);

        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.http.get(&url);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let page: TableListResponse = self.send(req, "list_tables").await?;
            tables.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(tables)
    }

    async fn get_table(&self, table_id: &str) -> Result<TableMetadata> {
        let table = TableRef::parse(table_id, &self.default_project)?;
        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}",
            self.base_url, table.project, table.dataset, table.table
        );
        debug!("BigQuery get_table: {}", table_id);

        let body: TableResponse = self.send(self.http.get(url), "get_table").await?;

        Ok(TableMetadata {
            table_id: format!("{}.{}.{}", table.project, table.dataset, table.table),
            description: body.description,
            num_rows: body.num_rows.and_then(|n| n.parse().ok()),
            schema: body.schema.fields,
        })
    }

    async fn run_query(&self, query: &QueryRequest) -> Result<Vec<Row>> {
        if self.billing_project.is_empty() {
            bail!("No billing project configured for query jobs");
        }

        let url = format!("{}/projects/{}/queries", self.base_url, self.billing_project);
        let request = QueryJobRequest {
            query: &query.sql,
            use_legacy_sql: false,
            maximum_bytes_billed: query.max_bytes_billed.to_string(),
            timeout_ms: JOB_WAIT_MS,
            location: self.location.as_deref(),
            parameter_mode: (!query.params.is_empty()).then_some("NAMED"),
            query_parameters: query
                .params
                .iter()
                .map(|p| QueryParameterPayload {
                    name: &p.name,
                    parameter_type: ParameterTypePayload { r#type: "STRING" },
                    parameter_value: ParameterValuePayload { value: &p.value },
                })
                .collect(),
        };

        debug!("BigQuery query: {}", query.sql);

        let mut resp: QueryResponse = self
            .send(self.http.post(url).json(&request), "query")
            .await?;

        // Wait for the job, then drain any remaining pages.
        while !resp.job_complete {
            let job = resp
                .job_reference
                .clone()
                .context("Incomplete BigQuery job without a job reference")?;
            resp = self.query_results(&job, None).await?;
        }

        let fields = resp.schema.take().unwrap_or_default().fields;
        let mut rows = decode_rows(&fields, &resp.rows);

        while let Some(token) = resp.page_token.take() {
            let job = resp
                .job_reference
                .clone()
                .context("Paged BigQuery result without a job reference")?;
            resp = self.query_results(&job, Some(&token)).await?;
            rows.extend(decode_rows(&fields, &resp.rows));
        }

        debug!("BigQuery query returned {} rows", rows.len());
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Decode `{"f": [{"v": ...}]}` rows into column-name maps using the schema.
fn decode_rows(fields: &[TableField], rows: &[Value]) -> Vec<Row> {
    rows.iter()
        .map(|row| decode_record(fields, row))
        .collect()
}

fn decode_record(fields: &[TableField], record: &Value) -> Row {
    let cells = record["f"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| (field.name.clone(), decode_cell(field, &cell["v"])))
        .collect()
}

fn decode_cell(field: &TableField, value: &Value) -> Value {
    if field.mode == "REPEATED" {
        let items = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
        return Value::Array(
            items
                .iter()
                .map(|item| decode_scalar(field, &item["v"]))
                .collect(),
        );
    }
    decode_scalar(field, value)
}

fn decode_scalar(field: &TableField, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match field.field_type.as_str() {
        "RECORD" | "STRUCT" => Value::Object(decode_record(&field.fields, value)),
        "INTEGER" | "INT64" => value
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| value.clone()),
        "FLOAT" | "FLOAT64" => value
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        "BOOLEAN" | "BOOL" => match value.as_str() {
            Some("true") => Value::Bool(true),
            Some("false") => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, ty: &str, mode: &str, fields: Vec<TableField>) -> TableField {
        TableField {
            name: name.into(),
            field_type: ty.into(),
            mode: mode.into(),
            fields,
            description: None,
        }
    }

    #[test]
    fn decodes_typed_scalars_in_column_order() {
        let fields = vec![
            field("event_name", "STRING", "NULLABLE", vec![]),
            field("event_count", "INTEGER", "NULLABLE", vec![]),
            field("avg_value", "FLOAT", "NULLABLE", vec![]),
            field("is_active", "BOOLEAN", "NULLABLE", vec![]),
            field("note", "STRING", "NULLABLE", vec![]),
        ];
        let rows = vec![json!({"f": [
            {"v": "page_view"}, {"v": "42"}, {"v": "1.5"}, {"v": "true"}, {"v": null}
        ]})];

        let decoded = decode_rows(&fields, &rows);
        assert_eq!(
            Value::Object(decoded[0].clone()),
            json!({
                "event_name": "page_view",
                "event_count": 42,
                "avg_value": 1.5,
                "is_active": true,
                "note": null
            })
        );
        let keys: Vec<&String> = decoded[0].keys().collect();
        assert_eq!(keys[0], "event_name");
        assert_eq!(keys[4], "note");
    }

    #[test]
    fn decodes_repeated_records() {
        let fields = vec![field(
            "event_params",
            "RECORD",
            "REPEATED",
            vec![
                field("key", "STRING", "NULLABLE", vec![]),
                field("int_value", "INTEGER", "NULLABLE", vec![]),
            ],
        )];
        let rows = vec![json!({"f": [{"v": [
            {"v": {"f": [{"v": "ga_session_id"}, {"v": "7"}]}},
            {"v": {"f": [{"v": "engaged"}, {"v": null}]}}
        ]}]})];

        let decoded = decode_rows(&fields, &rows);
        assert_eq!(
            decoded[0]["event_params"],
            json!([
                {"key": "ga_session_id", "int_value": 7},
                {"key": "engaged", "int_value": null}
            ])
        );
    }

    #[test]
    fn query_request_serializes_named_parameters() {
        let request = QueryJobRequest {
            query: "SELECT 1 WHERE x = @event_name",
            use_legacy_sql: false,
            maximum_bytes_billed: 100_000_000u64.to_string(),
            timeout_ms: JOB_WAIT_MS,
            location: None,
            parameter_mode: Some("NAMED"),
            query_parameters: vec![QueryParameterPayload {
                name: "event_name",
                parameter_type: ParameterTypePayload { r#type: "STRING" },
                parameter_value: ParameterValuePayload { value: "purchase" },
            }],
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["maximumBytesBilled"], "100000000");
        assert_eq!(v["useLegacySql"], false);
        assert_eq!(v["queryParameters"][0]["parameterType"]["type"], "STRING");
        assert_eq!(v["queryParameters"][0]["parameterValue"]["value"], "purchase");
        assert!(v.get("location").is_none());
    }

    #[tokio::test]
    async fn query_without_billing_project_fails_before_sending() {
        let cfg = SqlTalkConfig {
            dataset_id: "bare_dataset".into(),
            ..Default::default()
        };
        let client = BigQueryClient::new(&cfg).unwrap();
        let err = client
            .run_query(&QueryRequest::new("SELECT 1", 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("billing project"));
    }
}
