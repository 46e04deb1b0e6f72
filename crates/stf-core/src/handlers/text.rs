use serde_json::{json, Value};

use super::STATUS_SUCCESS;
use crate::envelope::OperationRequest;
use crate::error::{Result, StfError};
use crate::operation::Operation;

fn message(request: &OperationRequest) -> Result<&str> {
    match request.param("message") {
        None => Err(StfError::validation("Message is required")),
        Some(Value::String(s)) if s.is_empty() => Err(StfError::validation("Message is required")),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(StfError::validation("parameter 'message' must be a string")),
    }
}

fn respond(op: Operation, message: String) -> Value {
    json!({
        "status": STATUS_SUCCESS,
        "operation": op.as_str(),
        "message": message,
    })
}

pub(super) fn echo(request: &OperationRequest) -> Result<Value> {
    let message = message(request)?;
    tracing::info!("Echo operation: {message}");
    Ok(respond(Operation::Echo, message.to_string()))
}

pub(super) fn uppercase(request: &OperationRequest) -> Result<Value> {
    let message = message(request)?;
    tracing::info!("Uppercase operation: {message}");
    Ok(respond(Operation::Uppercase, message.to_uppercase()))
}

pub(super) fn lowercase(request: &OperationRequest) -> Result<Value> {
    let message = message(request)?;
    tracing::info!("Lowercase operation: {message}");
    Ok(respond(Operation::Lowercase, message.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::request;

    #[test]
    fn echo_preserves_field_order() {
        let out = echo(&request(json!({"message": "Hello, D6E!"}))).unwrap();
        assert_eq!(
            out.to_string(),
            r#"{"status":"success","operation":"echo","message":"Hello, D6E!"}"#
        );
    }

    #[test]
    fn case_conversions() {
        let req = request(json!({"message": "MiXeD ß"}));
        assert_eq!(uppercase(&req).unwrap()["message"], "MIXED SS");
        assert_eq!(lowercase(&req).unwrap()["message"], "mixed ß");
        assert_eq!(uppercase(&req).unwrap()["operation"], "uppercase");
    }

    #[test]
    fn missing_or_empty_message_is_rejected() {
        for input in [json!({}), json!({"message": ""}), json!({"message": null})] {
            let err = echo(&request(input)).unwrap_err();
            assert_eq!(err.kind(), "ValidationError");
            assert_eq!(err.to_string(), "Message is required");
        }
    }

    #[test]
    fn non_string_message_is_rejected() {
        let err = lowercase(&request(json!({"message": 12}))).unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
