use crate::error::{Result, StfError};
use crate::operation::Operation;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const WORKSPACE_PLACEHOLDER: &str = "{workspace_id}";

/// Upper bound for every timeout setting, one day.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// SqlConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Appended to `api_url`; `{workspace_id}` is substituted per call.
    #[serde(default = "default_path_template")]
    pub path_template: String,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_path_template() -> String {
    "/api/v1/workspaces/{workspace_id}/sql".to_string()
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            path_template: default_path_template(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SqlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// RunnerConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Operation used when `input.operation` is absent.
    #[serde(default = "default_operation")]
    pub default_operation: String,
    /// Optional wall-clock bound on the whole invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub sql: SqlConfig,
}

fn default_operation() -> String {
    Operation::Echo.as_str().to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_operation: default_operation(),
            invocation_timeout_secs: None,
            sql: SqlConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StfError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        // An empty file deserialises to unit, not to an all-default map.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: RunnerConfig = serde_yaml::from_str(data)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_operation.parse::<Operation>().is_err() {
            return Err(StfError::Config(format!(
                "default_operation '{}' is not a known operation",
                self.default_operation
            )));
        }
        if self.sql.timeout_secs == 0 {
            return Err(StfError::Config("sql.timeout_secs must be > 0".into()));
        }
        if self.sql.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(StfError::Config(format!(
                "sql.timeout_secs must not exceed {MAX_TIMEOUT_SECS}"
            )));
        }
        if !self.sql.path_template.contains(WORKSPACE_PLACEHOLDER) {
            return Err(StfError::Config(format!(
                "sql.path_template must contain {WORKSPACE_PLACEHOLDER}"
            )));
        }
        if self.sql.retry.initial_backoff_ms > self.sql.retry.max_backoff_ms {
            return Err(StfError::Config(
                "sql.retry.initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }
        match self.invocation_timeout_secs {
            Some(0) => {
                return Err(StfError::Config(
                    "invocation_timeout_secs must be > 0 when set".into(),
                ))
            }
            Some(secs) if secs > MAX_TIMEOUT_SECS => {
                return Err(StfError::Config(format!(
                    "invocation_timeout_secs must not exceed {MAX_TIMEOUT_SECS}"
                )))
            }
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
