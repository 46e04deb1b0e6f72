pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod operation;
pub mod result;
pub mod retry;
pub mod runner;
pub mod sql;

pub use config::RunnerConfig;
pub use error::{Result, StfError};
pub use result::InvocationResult;
pub use runner::{run, run_with};
