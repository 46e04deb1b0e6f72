//! Building SQL text for the built-in data handlers.
//!
//! The proxy takes raw statement text, so identifiers are validated against a
//! conservative pattern and double-quoted, and literals are single-quoted with
//! embedded quotes doubled.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{Result, StfError};

static IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn ident_re() -> &'static Regex {
    IDENT_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
    })
}

/// Validate and quote a (optionally schema-qualified) identifier.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.len() > 128 || !ident_re().is_match(name) {
        return Err(StfError::validation(format!("invalid identifier: '{name}'")));
    }
    Ok(name
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

pub fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render a JSON value as a SQL literal.
///
/// Arrays and objects are stored as their JSON text.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_str(s),
        Value::Array(_) | Value::Object(_) => quote_str(&value.to_string()),
    }
}
