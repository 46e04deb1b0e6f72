//! Operation handlers.
//!
//! Each handler receives the request, upstream outputs, invocation context
//! and a SQL executor, and returns the `output` payload or a classified error.

mod data;
mod describe;
mod sources;
pub mod statement;
mod text;

use serde_json::Value;

use crate::envelope::{InvocationContext, OperationRequest, UpstreamStepOutputs};
use crate::error::{Result, StfError};
use crate::operation::Operation;
use crate::sql::SqlExecutor;

pub const STATUS_SUCCESS: &str = "success";

/// Everything a handler may read.
pub struct HandlerContext<'a> {
    pub request: &'a OperationRequest,
    pub sources: &'a UpstreamStepOutputs,
    pub invocation: &'a InvocationContext,
    pub sql: &'a dyn SqlExecutor,
}

pub fn dispatch(op: Operation, cx: &HandlerContext<'_>) -> Result<Value> {
    match op {
        Operation::Echo => text::echo(cx.request),
        Operation::Uppercase => text::uppercase(cx.request),
        Operation::Lowercase => text::lowercase(cx.request),
        Operation::Describe => Ok(describe::describe()),
        Operation::QueryData => data::query_data(cx),
        Operation::InsertData => data::insert_data(cx),
        Operation::ReadSource => sources::read_source(cx),
    }
}

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

fn required_str<'a>(request: &'a OperationRequest, key: &str) -> Result<&'a str> {
    match request.param(key) {
        None => Err(StfError::validation(format!("missing required parameter: {key}"))),
        Some(Value::String(s)) if s.is_empty() => Err(StfError::validation(format!(
            "parameter '{key}' must not be empty"
        ))),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(StfError::validation(format!(
            "parameter '{key}' must be a string"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
