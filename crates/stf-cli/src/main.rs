mod logging;
mod output;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use stf_core::{InvocationResult, RunnerConfig, StfError};

#[derive(Parser)]
#[command(
    name = "stf",
    about = "Run one containerized transform step: JSON envelope on stdin, one JSON document on stdout",
    version
)]
struct Cli {
    /// Read the envelope from a file instead of stdin
    #[arg(long, env = "STF_INPUT")]
    input: Option<PathBuf>,

    /// YAML runner config
    #[arg(long, env = "STF_CONFIG")]
    config: Option<PathBuf>,

    /// Operation used when input.operation is absent
    #[arg(long, env = "STF_DEFAULT_OPERATION")]
    default_operation: Option<String>,

    /// SQL-proxy request timeout in seconds
    #[arg(long = "sql-timeout", env = "STF_SQL_TIMEOUT_SECS", value_name = "SECS")]
    sql_timeout: Option<u64>,

    /// Pretty-print the result document
    #[arg(long)]
    pretty: bool,
}

fn main() {
    logging::init(std::io::stderr);

    let (result, pretty) = match Cli::try_parse() {
        Ok(cli) => {
            let result = invoke(&cli).unwrap_or_else(|e| output::failure_from(&e));
            (result, cli.pretty)
        }
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => (argument_failure(&e), false),
    };

    if let Err(e) = output::write_document(std::io::stdout().lock(), &result, pretty) {
        tracing::error!("failed to write result: {e:#}");
        std::process::exit(1);
    }
    std::process::exit(result.exit_code());
}

fn invoke(cli: &Cli) -> anyhow::Result<InvocationResult> {
    let config = load_config(cli).context("failed to load config")?;
    let input = read_input(cli.input.as_deref())?;
    Ok(stf_core::run(&input, &config))
}

fn load_config(cli: &Cli) -> stf_core::Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(op) = &cli.default_operation {
        config.default_operation = op.clone();
    }
    if let Some(secs) = cli.sql_timeout {
        config.sql.timeout_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

/// Reads to end-of-stream before anything is parsed.
fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn argument_failure(err: &clap::Error) -> InvocationResult {
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string();
    InvocationResult::from(StfError::Config(message))
}
