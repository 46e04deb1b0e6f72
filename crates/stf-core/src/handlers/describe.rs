use serde_json::{json, Map, Value};

use super::STATUS_SUCCESS;
use crate::operation::Operation;

/// Self-description of the accepted input, generated from the registry.
pub(super) fn describe() -> Value {
    tracing::info!("Describe operation");

    let names: Vec<&str> = Operation::all().iter().map(|op| op.as_str()).collect();

    let operations: Map<String, Value> = Operation::all()
        .iter()
        .map(|op| {
            let spec = op.spec();
            (
                op.as_str().to_string(),
                json!({
                    "description": spec.description,
                    "required": spec.required,
                    "optional": spec.optional,
                }),
            )
        })
        .collect();

    json!({
        "status": STATUS_SUCCESS,
        "operation": Operation::Describe.as_str(),
        "data": {
            "input_schema": {
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": names,
                        "description": "The operation to perform"
                    },
                    "message": {
                        "type": "string",
                        "description": "The message to process"
                    },
                    "table": {
                        "type": "string",
                        "description": "Workspace table name, optionally schema-qualified"
                    },
                    "columns": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Columns to select (default: all)"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": super::data::MAX_LIMIT,
                        "description": "Maximum number of rows to return"
                    },
                    "records": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "Records to insert"
                    },
                    "source": {
                        "type": "string",
                        "description": "Name of an upstream step"
                    }
                },
                "required": ["operation"]
            },
            "operations": operations,
        }
    })
}
