//! One invocation: decode, validate, dispatch, classify.
//!
//! Every path through [`run`] ends in exactly one [`InvocationResult`]; no
//! error escapes as a panic or a native fault.

use crate::config::RunnerConfig;
use crate::envelope::Envelope;
use crate::error::{Result, StfError};
use crate::handlers::{self, HandlerContext};
use crate::operation::Operation;
use crate::result::InvocationResult;
use crate::sql::{Deadline, SqlClient, SqlExecutor};

/// Run one invocation against the real SQL-proxy client.
///
/// The config is validated first; a bad config is reported as a
/// `ConfigError` document before the input is looked at.
pub fn run(input: &[u8], config: &RunnerConfig) -> InvocationResult {
    match sql_client(config) {
        Ok(client) => run_with(input, config, &client),
        Err(e) => failure(e),
    }
}

fn sql_client(config: &RunnerConfig) -> Result<SqlClient> {
    config.validate()?;
    let client = SqlClient::new(config.sql.clone())?;
    Ok(match config.invocation_timeout_secs {
        Some(secs) => client.with_deadline(Deadline::after_secs(secs)?),
        None => client,
    })
}

/// Run one invocation with a caller-supplied SQL executor.
pub fn run_with(input: &[u8], config: &RunnerConfig, sql: &dyn SqlExecutor) -> InvocationResult {
    match execute(input, config, sql) {
        Ok(output) => {
            tracing::info!("Processing completed successfully");
            InvocationResult::success(output)
        }
        Err(e) => failure(e),
    }
}

fn execute(input: &[u8], config: &RunnerConfig, sql: &dyn SqlExecutor) -> Result<serde_json::Value> {
    tracing::info!(bytes = input.len(), "Reading input");
    let envelope = Envelope::parse(input, &config.default_operation)?;

    let ctx = &envelope.context;
    tracing::info!(
        workspace_id = %ctx.workspace_id,
        stf_id = %ctx.step_id,
        caller = ctx.caller_id.as_deref().unwrap_or("-"),
        sources = envelope.sources.len(),
        "Envelope accepted"
    );

    let op: Operation = envelope.request.operation.parse()?;
    tracing::info!(operation = %op, "Dispatching");

    handlers::dispatch(
        op,
        &HandlerContext {
            request: &envelope.request,
            sources: &envelope.sources,
            invocation: ctx,
            sql,
        },
    )
}

fn failure(err: StfError) -> InvocationResult {
    tracing::error!(kind = err.kind(), retryable = err.is_retryable(), "{err}");
    InvocationResult::from(err)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
