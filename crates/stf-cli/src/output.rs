use serde::Serialize;
use std::io::Write;
use stf_core::{InvocationResult, StfError};

/// Write one JSON document followed by a newline.
pub fn write_document<W: Write, T: Serialize>(mut w: W, doc: &T, pretty: bool) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut w, doc)?;
    } else {
        serde_json::to_writer(&mut w, doc)?;
    }
    writeln!(w)?;
    w.flush()?;
    Ok(())
}

/// Classify an error raised by the CLI itself (config, stdin) as a Failure.
pub fn failure_from(err: &anyhow::Error) -> InvocationResult {
    let (kind, details) = if let Some(e) = err.downcast_ref::<StfError>() {
        (e.kind(), e.details())
    } else if err.downcast_ref::<std::io::Error>().is_some() {
        ("IOError", None)
    } else {
        ("InternalError", None)
    };
    InvocationResult::Failure {
        // Alternate Display includes the context chain.
        error: format!("{err:#}"),
        kind: Some(kind.to_string()),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use serde_json::json;

    #[test]
    fn compact_document_is_one_line() {
        let mut buf = Vec::new();
        let doc = InvocationResult::success(json!({"a": [1, 2]}));
        write_document(&mut buf, &doc, false).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"output\":{\"a\":[1,2]}}\n");
    }

    #[test]
    fn pretty_document_parses_back() {
        let mut buf = Vec::new();
        let doc = InvocationResult::success(json!({"a": 1}));
        write_document(&mut buf, &doc, true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().count() > 1);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["output"]["a"], 1);
    }

    #[test]
    fn stf_errors_keep_their_kind_through_context() {
        let err = Err::<(), _>(StfError::Config("bad timeout".into()))
            .context("failed to load config")
            .unwrap_err();
        let InvocationResult::Failure { error, kind, .. } = failure_from(&err) else {
            panic!("expected failure")
        };
        assert_eq!(kind.as_deref(), Some("ConfigError"));
        assert!(error.starts_with("failed to load config: "));
        assert!(error.contains("bad timeout"));
    }

    #[test]
    fn io_errors_are_classified() {
        let err = anyhow::Error::new(std::io::Error::other("broken pipe"));
        let InvocationResult::Failure { kind, .. } = failure_from(&err) else {
            panic!("expected failure")
        };
        assert_eq!(kind.as_deref(), Some("IOError"));
    }

    #[test]
    fn anything_else_is_internal() {
        let err = anyhow::anyhow!("something unexpected");
        let InvocationResult::Failure { kind, .. } = failure_from(&err) else {
            panic!("expected failure")
        };
        assert_eq!(kind.as_deref(), Some("InternalError"));
    }
}
