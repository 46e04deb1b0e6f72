use serde_json::{json, Value};

use super::{required_str, HandlerContext, STATUS_SUCCESS};
use crate::error::{Result, StfError};
use crate::operation::Operation;

pub(super) fn read_source(cx: &HandlerContext<'_>) -> Result<Value> {
    let source = required_str(cx.request, "source")?;
    let data = cx.sources.get(source).ok_or_else(|| {
        let available: Vec<&str> = cx.sources.names().collect();
        StfError::validation(format!(
            "unknown source '{source}' (available: {})",
            if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            }
        ))
    })?;
    tracing::info!(source, "Read source operation");

    Ok(json!({
        "status": STATUS_SUCCESS,
        "operation": Operation::ReadSource.as_str(),
        "source": source,
        "data": data,
    }))
}
