//! Warehouse boundary: the operations the tools need from BigQuery.

pub mod bigquery;
pub mod schema;

pub use bigquery::BigQueryClient;
pub use schema::flatten_schema;

use crate::types::{Row, TableMetadata};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

/// A named, string-typed query parameter (`@name` in the SQL text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

/// A read-only query together with its bound parameters and byte quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub max_bytes_billed: u64,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, max_bytes_billed: u64) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            max_bytes_billed,
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.push(QueryParam {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }
}

/// Operations the orchestration loop can run against the warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Table ids within a dataset (`project.dataset` or bare `dataset`).
    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>>;

    /// Description, row count and nested schema of a table.
    async fn get_table(&self, table_id: &str) -> Result<TableMetadata>;

    /// Run a read-only query and return its rows.
    async fn run_query(&self, query: &QueryRequest) -> Result<Vec<Row>>;
}

/// A dataset reference, resolved against a default project when unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub project: String,
    pub dataset: String,
}

impl DatasetRef {
    pub fn parse(id: &str, default_project: &str) -> Result<Self> {
        let parts = split_id(id);
        match parts.as_slice() {
            [dataset] if !default_project.is_empty() => Ok(Self {
                project: default_project.to_string(),
                dataset: dataset.to_string(),
            }),
            [project, dataset] => Ok(Self {
                project: project.to_string(),
                dataset: dataset.to_string(),
            }),
            _ => bail!("Invalid dataset id '{}': expected project.dataset", id),
        }
    }
}

/// A table reference, resolved against a default project when unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn parse(id: &str, default_project: &str) -> Result<Self> {
        let parts = split_id(id);
        match parts.as_slice() {
            [dataset, table] if !default_project.is_empty() => Ok(Self {
                project: default_project.to_string(),
                dataset: dataset.to_string(),
                table: table.to_string(),
            }),
            [project, dataset, table] => Ok(Self {
                project: project.to_string(),
                dataset: dataset.to_string(),
                table: table.to_string(),
            }),
            _ => bail!(
                "Invalid table id '{}': expected project.dataset.table",
                id
            ),
        }
    }
}

fn split_id(id: &str) -> Vec<&str> {
    id.trim()
        .trim_matches('`')
        .split('.')
        .filter(|s| !s.is_empty())
        .collect()
}
