//! SQL construction for the analysis tools.
//!
//! Values are bound as named parameters. Identifiers cannot be bound, so
//! they are checked against a strict grammar and backtick-quoted.

use crate::tools::ToolError;
use crate::warehouse::QueryRequest;

/// Metric path used by `analyze_event_metrics` when the model omits one.
pub const DEFAULT_METRIC_PATH: &str = "event_params.value.string_value";

/// Groups returned by the trend and event queries.
const TOP_GROUPS: u32 = 10;

/// Normalize model-written SQL: escaped newlines become spaces, raw newlines
/// and remaining backslashes are dropped.
pub fn clean_sql(raw: &str) -> String {
    raw.replace("\\n", " ").replace('\n', "").replace('\\', "")
}

/// Quote a `project.dataset.table` (or `dataset.table`) id.
pub fn quote_table(id: &str) -> Result<String, ToolError> {
    let trimmed = id.trim().trim_matches('`');
    let segments: Vec<&str> = trimmed.split('.').collect();
    let last = segments.len().saturating_sub(1);

    let valid = (2..=3).contains(&segments.len())
        && segments.iter().enumerate().all(|(i, seg)| {
            !seg.is_empty()
                && seg.chars().all(|c| {
                    c.is_ascii_alphanumeric()
                        || c == '_'
                        || c == '-'
                        || (c == '*' && i == last)
                })
        });

    if !valid {
        return Err(ToolError::InvalidArgument {
            name: "table_id",
            reason: format!("'{}' is not a project.dataset.table id", id),
        });
    }
    Ok(format!("`{}`", trimmed))
}

/// Quote a column or dotted field path, one backtick pair per segment.
pub fn quote_column(name: &'static str, path: &str) -> Result<String, ToolError> {
    let path = path.trim();
    let valid = !path.is_empty()
        && path.split('.').all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if !valid {
        return Err(ToolError::InvalidArgument {
            name,
            reason: format!("'{}' is not a column name", path),
        });
    }
    Ok(path
        .split('.')
        .map(|seg| format!("`{}`", seg))
        .collect::<Vec<_>>()
        .join("."))
}

fn alias(prefix: &str, column: &str) -> String {
    format!("{}_{}", prefix, column.trim().replace('.', "_"))
}

/// `AVG`/`MAX`/`MIN` for each metric column.
pub fn analyze_metrics(
    table_id: &str,
    metric_columns: &[String],
    max_bytes_billed: u64,
) -> Result<QueryRequest, ToolError> {
    let table = quote_table(table_id)?;

    let mut seen = Vec::new();
    for col in metric_columns {
        if !seen.contains(&col.trim()) {
            seen.push(col.trim());
        }
    }
    if seen.is_empty() {
        return Err(ToolError::InvalidArgument {
            name: "metric_columns",
            reason: "at least one column is required".into(),
        });
    }

    let mut select = Vec::with_capacity(seen.len() * 3);
    for col in seen {
        let quoted = quote_column("metric_columns", col)?;
        for func in ["AVG", "MAX", "MIN"] {
            select.push(format!(
                "{}({}) AS {}",
                func,
                quoted,
                alias(&func.to_lowercase(), col)
            ));
        }
    }

    Ok(QueryRequest::new(
        format!("SELECT {} FROM {}", select.join(", "), table),
        max_bytes_billed,
    ))
}

/// Average metric and row count per time value, newest first.
pub fn data_insights(
    table_id: &str,
    time_column: &str,
    metric_column: &str,
    max_bytes_billed: u64,
) -> Result<QueryRequest, ToolError> {
    let table = quote_table(table_id)?;
    let time = quote_column("time_column", time_column)?;
    let metric = quote_column("metric_column", metric_column)?;

    Ok(QueryRequest::new(
        format!(
            "SELECT {time}, AVG({metric}) AS avg_metric, COUNT(*) AS count \
             FROM {table} GROUP BY {time} ORDER BY {time} DESC LIMIT {TOP_GROUPS}"
        ),
        max_bytes_billed,
    ))
}

/// Most frequent (event, metric value) pairs for one event.
pub fn event_metrics(
    table_id: &str,
    event_name: &str,
    metric_path: Option<&str>,
    max_bytes_billed: u64,
) -> Result<QueryRequest, ToolError> {
    let table = quote_table(table_id)?;
    let metric = quote_column(
        "metric_path",
        metric_path.filter(|p| !p.trim().is_empty()).unwrap_or(DEFAULT_METRIC_PATH),
    )?;

    Ok(QueryRequest::new(
        format!(
            "SELECT event_name, {metric} AS metric_value, COUNT(*) AS event_count \
             FROM {table}, UNNEST(event_params) AS event_params \
             WHERE event_name = @event_name \
             GROUP BY 1, 2 ORDER BY event_count DESC LIMIT {TOP_GROUPS}"
        ),
        max_bytes_billed,
    )
    .bind("event_name", event_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTA: u64 = 100_000_000;

    #[test]
    fn clean_sql_strips_escapes_and_newlines() {
        let raw = "SELECT *\\nFROM `p.d.t`\nWHERE name = \\'x\\'";
        assert_eq!(clean_sql(raw), "SELECT * FROM `p.d.t`WHERE name = 'x'");
    }

    #[test]
    fn analyze_metrics_builds_six_aggregates_for_two_columns() {
        let q = analyze_metrics("p.d.t", &["a".into(), "b".into()], QUOTA).unwrap();
        assert_eq!(
            q.sql,
            "SELECT AVG(`a`) AS avg_a, MAX(`a`) AS max_a, MIN(`a`) AS min_a, \
             AVG(`b`) AS avg_b, MAX(`b`) AS max_b, MIN(`b`) AS min_b FROM `p.d.t`"
        );
        assert_eq!(q.sql.matches(" AS ").count(), 6);
        assert_eq!(q.max_bytes_billed, QUOTA);
        assert!(q.params.is_empty());
    }

    #[test]
    fn analyze_metrics_handles_nested_and_duplicate_columns() {
        let q = analyze_metrics(
            "p.d.t",
            &["ecommerce.purchase_revenue".into(), "ecommerce.purchase_revenue".into()],
            QUOTA,
        )
        .unwrap();
        assert_eq!(q.sql.matches(" AS ").count(), 3);
        assert!(q
            .sql
            .contains("AVG(`ecommerce`.`purchase_revenue`) AS avg_ecommerce_purchase_revenue"));
    }

    #[test]
    fn analyze_metrics_rejects_empty_and_injected_columns() {
        assert!(analyze_metrics("p.d.t", &[], QUOTA).is_err());
        let err = analyze_metrics("p.d.t", &["a) FROM x; --".into()], QUOTA).unwrap_err();
        assert!(err.to_string().contains("metric_columns"));
    }

    #[test]
    fn data_insights_groups_by_time_descending() {
        let q = data_insights("p.d.events_*", "event_date", "engagement_time", QUOTA).unwrap();
        assert_eq!(
            q.sql,
            "SELECT `event_date`, AVG(`engagement_time`) AS avg_metric, COUNT(*) AS count \
             FROM `p.d.events_*` GROUP BY `event_date` ORDER BY `event_date` DESC LIMIT 10"
        );
    }

    #[test]
    fn event_metrics_binds_event_name() {
        let q = event_metrics("p.d.t", "purchase' OR '1'='1", None, QUOTA).unwrap();
        assert!(q.sql.contains("WHERE event_name = @event_name"));
        assert!(q
            .sql
            .contains("`event_params`.`value`.`string_value` AS metric_value"));
        assert!(q.sql.contains("UNNEST(event_params) AS event_params"));
        assert!(q.sql.ends_with("LIMIT 10"));
        assert!(!q.sql.contains("OR '1'"));
        assert_eq!(q.params.len(), 1);
        assert_eq!(q.params[0].value, "purchase' OR '1'='1");
    }

    #[test]
    fn event_metrics_uses_custom_path() {
        let q = event_metrics("p.d.t", "scroll", Some("event_params.value.int_value"), QUOTA).unwrap();
        assert!(q.sql.contains("`event_params`.`value`.`int_value` AS metric_value"));
    }

    #[test]
    fn table_ids_are_validated() {
        assert_eq!(quote_table("`p-1.d.t`").unwrap(), "`p-1.d.t`");
        assert_eq!(quote_table("d.t").unwrap(), "`d.t`");
        assert!(quote_table("t").is_err());
        assert!(quote_table("p.d.t` WHERE 1=1 --").is_err());
        assert!(quote_table("p.d*.t").is_err());
    }
}
