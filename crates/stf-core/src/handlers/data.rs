use serde_json::{json, Map, Value};

use super::statement::{literal, quote_ident};
use super::{required_str, HandlerContext, STATUS_SUCCESS};
use crate::error::{Result, StfError};
use crate::operation::Operation;

pub(super) const DEFAULT_LIMIT: u64 = 100;
pub(super) const MAX_LIMIT: u64 = 10_000;

// ---------------------------------------------------------------------------
// query_data
// ---------------------------------------------------------------------------

pub(super) fn query_data(cx: &HandlerContext<'_>) -> Result<Value> {
    let table = required_str(cx.request, "table")?;
    let quoted_table = quote_ident(table)?;
    let columns = select_list(cx.request.param("columns"))?;
    let limit = limit(cx.request.param("limit"))?;

    let sql = format!("SELECT {columns} FROM {quoted_table} LIMIT {limit}");
    tracing::info!(table, limit, "Query operation");

    let result = cx.sql.execute(cx.invocation, &sql)?;
    let count = result.rows.len();
    Ok(json!({
        "status": STATUS_SUCCESS,
        "operation": Operation::QueryData.as_str(),
        "table": table,
        "rows": result.rows,
        "count": count,
    }))
}

fn select_list(columns: Option<&Value>) -> Result<String> {
    let Some(columns) = columns else {
        return Ok("*".to_string());
    };
    let Value::Array(items) = columns else {
        return Err(StfError::validation(
            "parameter 'columns' must be an array of strings",
        ));
    };
    if items.is_empty() {
        return Err(StfError::validation("parameter 'columns' must not be empty"));
    }
    let quoted = items
        .iter()
        .map(|item| match item {
            Value::String(name) => quote_ident(name),
            _ => Err(StfError::validation(
                "parameter 'columns' must be an array of strings",
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

fn limit(value: Option<&Value>) -> Result<u64> {
    match value {
        None => Ok(DEFAULT_LIMIT),
        Some(v) => v
            .as_u64()
            .filter(|n| (1..=MAX_LIMIT).contains(n))
            .ok_or_else(|| {
                StfError::validation(format!(
                    "parameter 'limit' must be an integer between 1 and {MAX_LIMIT}"
                ))
            }),
    }
}

// ---------------------------------------------------------------------------
// insert_data
// ---------------------------------------------------------------------------

pub(super) fn insert_data(cx: &HandlerContext<'_>) -> Result<Value> {
    let table = required_str(cx.request, "table")?;
    let quoted_table = quote_ident(table)?;
    let records = match cx.request.param("records") {
        None => return Err(StfError::validation("missing required parameter: records")),
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => {
            return Err(StfError::validation(
                "parameter 'records' must be a non-empty array of objects",
            ))
        }
    };

    // Build every statement up front so a bad record fails before any write.
    let statements = records
        .iter()
        .enumerate()
        .map(|(index, record)| insert_statement(&quoted_table, index, record))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(table, records = statements.len(), "Insert operation");

    let mut inserted = 0i64;
    let mut results = Vec::with_capacity(statements.len());
    for (index, sql) in statements.iter().enumerate() {
        let result = cx.sql.execute(cx.invocation, sql)?;
        let affected = result.affected_rows.unwrap_or(0);
        inserted = inserted.saturating_add(affected);
        tracing::debug!(index, affected, "record inserted");
        results.push(json!({ "index": index, "affected_rows": affected }));
    }

    Ok(json!({
        "status": STATUS_SUCCESS,
        "operation": Operation::InsertData.as_str(),
        "table": table,
        "inserted": inserted,
        "results": results,
    }))
}

fn insert_statement(quoted_table: &str, index: usize, record: &Value) -> Result<String> {
    let fields: &Map<String, Value> = match record {
        Value::Object(map) if !map.is_empty() => map,
        _ => {
            return Err(StfError::validation(format!(
                "record {index} must be a non-empty object"
            )))
        }
    };
    let mut columns = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        columns.push(quote_ident(name)?);
        values.push(literal(value));
    }
    Ok(format!(
        "INSERT INTO {quoted_table} ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
