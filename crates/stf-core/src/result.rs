use serde::Serialize;
use serde_json::Value;

use crate::error::StfError;

/// The single document written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvocationResult {
    Success {
        output: Value,
    },
    Failure {
        error: String,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl InvocationResult {
    pub fn success(output: Value) -> Self {
        InvocationResult::Success { output }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    /// `0` on success, `1` on failure.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// Compact single-line JSON. Serialising a `Value` tree cannot fail.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| fallback_failure())
    }
}

impl From<&StfError> for InvocationResult {
    fn from(err: &StfError) -> Self {
        InvocationResult::Failure {
            error: err.to_string(),
            kind: Some(err.kind().to_string()),
            details: err.details(),
        }
    }
}

impl From<StfError> for InvocationResult {
    fn from(err: StfError) -> Self {
        InvocationResult::from(&err)
    }
}

fn fallback_failure() -> String {
    r#"{"error":"failed to serialize result","type":"InternalError"}"#.to_string()
}
