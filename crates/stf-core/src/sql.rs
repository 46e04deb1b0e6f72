//! Client for the workspace SQL-proxy.
//!
//! # Protocol
//! - `POST {api_url}/api/v1/workspaces/{workspace_id}/sql`
//! - Body: `{"sql": "<statement>"}`
//! - Success: `{"rows"?: [...], "affected_rows"?: n}`
//! - Rejection: 2xx with an `error` field (DDL, permission denied, syntax)
//!
//! Statements are sent verbatim; quoting is the caller's job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

use crate::config::{SqlConfig, WORKSPACE_PLACEHOLDER};
use crate::envelope::{InvocationContext, SecretToken};
use crate::error::{Result, StfError};

/// Tokens shorter than this are not scrubbed from upstream text.
const MIN_REDACT_LEN: usize = 8;
const REDACTED: &str = "[REDACTED]";

// ---------------------------------------------------------------------------
// SqlExecutionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlExecutionResult {
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<i64>,
}

#[derive(Serialize)]
struct SqlRequest<'a> {
    sql: &'a str,
}

// ---------------------------------------------------------------------------
// SqlExecutor
// ---------------------------------------------------------------------------

/// Anything that can run one statement on behalf of an invocation.
pub trait SqlExecutor {
    fn execute(&self, ctx: &InvocationContext, statement: &str) -> Result<SqlExecutionResult>;
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget_secs: u64,
}

impl Deadline {
    pub fn after_secs(secs: u64) -> Result<Self> {
        let at = Instant::now()
            .checked_add(Duration::from_secs(secs))
            .ok_or_else(|| {
                StfError::Config(format!("invocation timeout of {secs}s is out of range"))
            })?;
        Ok(Self {
            at,
            budget_secs: secs,
        })
    }

    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

// ---------------------------------------------------------------------------
// SqlClient
// ---------------------------------------------------------------------------

pub struct SqlClient {
    http: reqwest::blocking::Client,
    config: SqlConfig,
    deadline: Option<Deadline>,
}

impl SqlClient {
    pub fn new(config: SqlConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StfError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            deadline: None,
        })
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Full request URL for the invocation's workspace.
    pub fn endpoint(&self, ctx: &InvocationContext) -> String {
        let path = self
            .config
            .path_template
            .replace(WORKSPACE_PLACEHOLDER, &ctx.workspace_id);
        let base = ctx.endpoint_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Parsed endpoint; `api_url` must be an absolute http(s) URL.
    fn endpoint_url(&self, ctx: &InvocationContext) -> Result<reqwest::Url> {
        let invalid = || {
            StfError::validation(format!(
                "field 'api_url' is not a valid http(s) URL: {}",
                ctx.endpoint_base_url
            ))
        };
        let url = reqwest::Url::parse(&self.endpoint(ctx)).map_err(|_| invalid())?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(invalid()),
        }
    }

    /// Per-attempt timeout, shortened to whatever is left of the deadline.
    fn attempt_timeout(&self) -> Result<Duration> {
        let timeout = self.config.timeout();
        match self.deadline {
            None => Ok(timeout),
            Some(d) => {
                let remaining = d.remaining();
                if remaining.is_zero() {
                    return Err(StfError::DeadlineExceeded(d.budget_secs));
                }
                Ok(timeout.min(remaining))
            }
        }
    }

    fn send_once(
        &self,
        url: &reqwest::Url,
        ctx: &InvocationContext,
        statement: &str,
        attempt: u32,
    ) -> Result<SqlExecutionResult> {
        let timeout = self.attempt_timeout()?;
        let response = self
            .http
            .post(url.clone())
            .timeout(timeout)
            .bearer_auth(ctx.auth_token.expose())
            .header("X-Internal-Bypass", "true")
            .header("X-Workspace-ID", &ctx.workspace_id)
            .header("X-STF-ID", &ctx.step_id)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&SqlRequest { sql: statement })
            .send()
            .map_err(|e| self.transport_error(url, e, attempt))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| self.transport_error(url, e, attempt))?;
        let text = scrub(&text, &ctx.auth_token);

        if !status.is_success() {
            let body = error_body(&text);
            let message = body
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(StfError::DatabaseStatus {
                status: status.as_u16(),
                message,
                body,
                retryable: self.config.retry.is_retryable_status(status.as_u16()),
                attempts: attempt,
            });
        }

        decode_success(url.as_str(), &text)
    }

    fn transport_error(&self, url: &reqwest::Url, err: reqwest::Error, attempt: u32) -> StfError {
        if err.is_builder() {
            // The URL is parsed up front, so this is a header value from the envelope.
            return StfError::validation(
                "envelope fields contain characters not allowed in HTTP headers",
            );
        }
        if let Some(d) = self.deadline {
            if d.remaining().is_zero() {
                return StfError::DeadlineExceeded(d.budget_secs);
            }
        }
        StfError::Transport {
            endpoint: url.to_string(),
            message: err.to_string(),
            timed_out: err.is_timeout(),
            attempts: attempt,
        }
    }

    fn pause_before_retry(&self, attempt: u32) {
        let mut delay = self.config.retry.backoff(attempt);
        if let Some(d) = self.deadline {
            delay = delay.min(d.remaining());
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl SqlExecutor for SqlClient {
    fn execute(&self, ctx: &InvocationContext, statement: &str) -> Result<SqlExecutionResult> {
        let url = self.endpoint_url(ctx)?;
        let max_attempts = self.config.retry.max_attempts();
        let mut attempt = 1;

        loop {
            tracing::debug!(%url, attempt, statement_len = statement.len(), "executing SQL statement");
            match self.send_once(&url, ctx, statement, attempt) {
                Ok(result) => {
                    tracing::debug!(
                        rows = result.rows.len(),
                        affected_rows = ?result.affected_rows,
                        "SQL statement succeeded"
                    );
                    return Ok(result);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(attempt, max_attempts, error = %err, "SQL call failed, retrying");
                    self.pause_before_retry(attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

fn decode_success(url: &str, text: &str) -> Result<SqlExecutionResult> {
    let invalid = |message: String| StfError::InvalidResponse {
        endpoint: url.to_string(),
        message,
    };

    let value: Value =
        serde_json::from_str(text).map_err(|e| invalid(format!("body is not JSON: {e}")))?;
    if let Some(message) = rejection_message(&value) {
        return Err(StfError::DatabaseRejected {
            message,
            body: value,
        });
    }
    serde_json::from_value(value).map_err(|e| invalid(format!("unexpected body shape: {e}")))
}

/// An `error` field on a 2xx body means the proxy refused the statement.
fn rejection_message(body: &Value) -> Option<String> {
    body.as_object()?.get("error").filter(|e| !e.is_null())?;
    error_message(body)
}

/// Best-effort human message from an error body.
fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => match obj.get("error").or_else(|| obj.get("message"))? {
            Value::String(s) => Some(s.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| Some(Value::Object(inner.clone()).to_string())),
            Value::Null => None,
            other => Some(other.to_string()),
        },
        _ => None,
    }
}

fn error_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

fn scrub(text: &str, token: &SecretToken) -> String {
    let token = token.expose();
    if token.len() >= MIN_REDACT_LEN && text.contains(token) {
        text.replace(token, REDACTED)
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use mockito::Matcher;
    use serde_json::json;

    const SQL_PATH: &str = "/api/v1/workspaces/ws-1/sql";

    fn ctx(api_url: &str) -> InvocationContext {
        InvocationContext {
            workspace_id: "ws-1".into(),
            step_id: "stf-1".into(),
            caller_id: None,
            endpoint_base_url: api_url.into(),
            auth_token: SecretToken::new("tok-0123456789"),
        }
    }

    fn client(retry: RetryPolicy) -> SqlClient {
        SqlClient::new(SqlConfig {
            timeout_secs: 5,
            retry,
            ..SqlConfig::default()
        })
        .unwrap()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn endpoint_joins_base_and_template() {
        let c = client(RetryPolicy::none());
        assert_eq!(
            c.endpoint(&ctx("http://proxy:8080/")),
            "http://proxy:8080/api/v1/workspaces/ws-1/sql"
        );
        assert_eq!(
            c.endpoint(&ctx("http://proxy:8080")),
            "http://proxy:8080/api/v1/workspaces/ws-1/sql"
        );
    }

    #[test]
    fn sends_contract_headers_and_decodes_rows() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", SQL_PATH)
            .match_header("authorization", "Bearer tok-0123456789")
            .match_header("x-internal-bypass", "true")
            .match_header("x-workspace-id", "ws-1")
            .match_header("x-stf-id", "stf-1")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"sql": "SELECT 1"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"rows":[{"id":"1","name":"Test 1","value":100}],"affected_rows":0}"#)
            .create();

        let result = client(RetryPolicy::none())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap();
        mock.assert();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0]["name"], "Test 1");
        assert_eq!(result.affected_rows, Some(0));
    }

    #[test]
    fn missing_rows_decode_as_empty() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", SQL_PATH)
            .with_status(200)
            .with_body(r#"{"affected_rows":3}"#)
            .create();

        let result = client(RetryPolicy::none())
            .execute(&ctx(&server.url()), "UPDATE t SET a = 1")
            .unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.affected_rows, Some(3));
    }

    #[test]
    fn server_error_is_database_error_without_retry() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", SQL_PATH)
            .with_status(500)
            .with_body(r#"{"error":"internal failure"}"#)
            .expect(1)
            .create();

        let err = client(fast_retry())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        mock.assert();
        assert_eq!(err.kind(), "DatabaseError");
        assert!(!err.is_retryable());
        let details = err.details().unwrap();
        assert_eq!(details["status"], 500);
        assert_eq!(details["body"]["error"], "internal failure");
        assert!(err.to_string().contains("internal failure"));
    }

    #[test]
    fn retryable_status_is_retried_up_to_the_limit() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", SQL_PATH)
            .with_status(503)
            .with_body("upstream unavailable")
            .expect(3)
            .create();

        let err = client(fast_retry())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        mock.assert();
        assert_eq!(err.kind(), "DatabaseError");
        let details = err.details().unwrap();
        assert_eq!(details["attempts"], 3);
        assert_eq!(details["body"], "upstream unavailable");
    }

    #[test]
    fn rejection_with_success_status_is_not_retried() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", SQL_PATH)
            .with_status(200)
            .with_body(r#"{"error":{"code":"forbidden","message":"DDL statements are not allowed"}}"#)
            .expect(1)
            .create();

        let err = client(fast_retry())
            .execute(&ctx(&server.url()), "DROP TABLE t")
            .unwrap_err();
        mock.assert();
        assert!(matches!(err, StfError::DatabaseRejected { .. }));
        assert_eq!(
            err.to_string(),
            "SQL proxy rejected statement: DDL statements are not allowed"
        );
    }

    #[test]
    fn non_json_success_body_is_external_api_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", SQL_PATH)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create();

        let err = client(RetryPolicy::none())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        assert_eq!(err.kind(), "ExternalAPIError");
        assert!(matches!(err, StfError::InvalidResponse { .. }));
    }

    #[test]
    fn empty_success_body_is_external_api_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", SQL_PATH)
            .with_status(200)
            .with_body("")
            .create();

        let err = client(RetryPolicy::none())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        assert_eq!(err.kind(), "ExternalAPIError");
        assert!(matches!(err, StfError::InvalidResponse { .. }));
    }

    #[test]
    fn wrong_shape_is_external_api_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", SQL_PATH)
            .with_status(200)
            .with_body(r#"{"rows":"not-a-list"}"#)
            .create();

        let err = client(RetryPolicy::none())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        assert!(matches!(err, StfError::InvalidResponse { .. }));
    }

    #[test]
    fn connection_failure_is_retryable_transport_error() {
        let err = client(fast_retry())
            .execute(&ctx("http://127.0.0.1:1"), "SELECT 1")
            .unwrap_err();
        assert_eq!(err.kind(), "ExternalAPIError");
        assert!(err.is_retryable());
        assert_eq!(err.details().unwrap()["attempts"], 3);
    }

    #[test]
    fn unparseable_api_url_is_named_in_validation_error() {
        for api_url in ["not a url", "ftp://proxy"] {
            let err = client(RetryPolicy::none())
                .execute(&ctx(api_url), "SELECT 1")
                .unwrap_err();
            assert_eq!(err.kind(), "ValidationError");
            assert!(err.to_string().contains("api_url"), "{err}");
        }
    }

    #[test]
    fn out_of_range_deadline_is_config_error() {
        let err = Deadline::after_secs(u64::MAX).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert!(Deadline::after_secs(60).is_ok());
    }

    #[test]
    fn elapsed_deadline_stops_before_sending() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", SQL_PATH).expect(0).create();

        let err = client(RetryPolicy::none())
            .with_deadline(Deadline {
                at: Instant::now(),
                budget_secs: 1,
            })
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        mock.assert();
        assert_eq!(err.kind(), "TimeoutError");
    }

    #[test]
    fn token_echoed_by_upstream_is_scrubbed() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", SQL_PATH)
            .with_status(401)
            .with_body(r#"{"error":"bad token tok-0123456789"}"#)
            .create();

        let err = client(RetryPolicy::none())
            .execute(&ctx(&server.url()), "SELECT 1")
            .unwrap_err();
        let rendered = format!("{} {}", err, err.details().unwrap());
        assert!(!rendered.contains("tok-0123456789"));
        assert!(rendered.contains(REDACTED));
    }

    #[test]
    fn short_tokens_are_not_scrubbed() {
        let text = "status ok";
        assert_eq!(scrub(text, &SecretToken::new("t")), text);
    }
}
