//! Decoding of the stdin envelope.
//!
//! The envelope is parsed in two passes: first as a generic JSON value (so a
//! syntax problem is always a `ParseError`), then field by field so every
//! shape problem is a `ValidationError` naming the offending field.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, StfError};

// ---------------------------------------------------------------------------
// SecretToken
// ---------------------------------------------------------------------------

/// Bearer token for the SQL-proxy.
///
/// Deliberately has no `Serialize` or `Display` impl; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// InvocationContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub workspace_id: String,
    pub step_id: String,
    pub caller_id: Option<String>,
    pub endpoint_base_url: String,
    pub auth_token: SecretToken,
}

// ---------------------------------------------------------------------------
// OperationRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub operation: String,
    /// Every field of `input` other than `operation`.
    pub params: Map<String, Value>,
}

impl OperationRequest {
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }
}

// ---------------------------------------------------------------------------
// UpstreamStepOutputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamStepOutputs(Map<String, Value>);

impl UpstreamStepOutputs {
    pub fn get(&self, step: &str) -> Option<&Value> {
        self.0.get(step)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for UpstreamStepOutputs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Envelope {
    pub context: InvocationContext,
    pub request: OperationRequest,
    pub sources: UpstreamStepOutputs,
}

impl Envelope {
    /// Parse and validate a complete stdin document.
    ///
    /// `default_operation` is used when `input.operation` is absent.
    pub fn parse(input: &[u8], default_operation: &str) -> Result<Self> {
        let doc: Value = serde_json::from_slice(input).map_err(StfError::Parse)?;
        Self::from_value(doc, default_operation)
    }

    pub fn from_value(doc: Value, default_operation: &str) -> Result<Self> {
        let Value::Object(mut doc) = doc else {
            return Err(StfError::validation("input document must be a JSON object"));
        };

        let context = InvocationContext {
            workspace_id: required_str(&doc, "workspace_id")?,
            step_id: required_str(&doc, "stf_id")?,
            caller_id: optional_str(&doc, "caller")?,
            endpoint_base_url: required_str(&doc, "api_url")?,
            auth_token: SecretToken::new(required_str(&doc, "api_token")?),
        };

        let request = parse_request(doc.remove("input"), default_operation)?;
        let sources = parse_sources(doc.remove("sources"))?;

        Ok(Self {
            context,
            request,
            sources,
        })
    }
}

fn required_str(doc: &Map<String, Value>, field: &str) -> Result<String> {
    match doc.get(field) {
        None | Some(Value::Null) => Err(StfError::validation(format!(
            "missing required field: {field}"
        ))),
        Some(Value::String(s)) if s.is_empty() => Err(StfError::validation(format!(
            "field '{field}' must not be empty"
        ))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(StfError::validation(format!(
            "field '{field}' must be a string"
        ))),
    }
}

fn optional_str(doc: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(StfError::validation(format!(
            "field '{field}' must be a string or null"
        ))),
    }
}

fn parse_request(input: Option<Value>, default_operation: &str) -> Result<OperationRequest> {
    let mut params = match input {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(StfError::validation("field 'input' must be an object")),
    };

    let operation = match params.remove("operation") {
        None | Some(Value::Null) => default_operation.to_string(),
        Some(Value::String(op)) => op,
        Some(_) => {
            return Err(StfError::validation(
                "field 'input.operation' must be a string",
            ))
        }
    };

    Ok(OperationRequest { operation, params })
}

fn parse_sources(sources: Option<Value>) -> Result<UpstreamStepOutputs> {
    let map = match sources {
        None | Some(Value::Null) => return Ok(UpstreamStepOutputs::default()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(StfError::validation("field 'sources' must be an object")),
    };

    map.into_iter()
        .map(|(name, entry)| match entry {
            Value::Object(mut obj) => {
                let output = obj.remove("output").unwrap_or(Value::Null);
                Ok((name, output))
            }
            _ => Err(StfError::validation(format!(
                "source '{name}' must be an object with an 'output' field"
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
