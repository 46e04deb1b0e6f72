use std::fmt;

use crate::error::StfError;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Every operation the runner can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Echo,
    Uppercase,
    Lowercase,
    Describe,
    QueryData,
    InsertData,
    ReadSource,
}

/// Static description of one operation, used by `describe`.
#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl Operation {
    pub fn all() -> &'static [Operation] {
        &[
            Operation::Echo,
            Operation::Uppercase,
            Operation::Lowercase,
            Operation::Describe,
            Operation::QueryData,
            Operation::InsertData,
            Operation::ReadSource,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Echo => "echo",
            Operation::Uppercase => "uppercase",
            Operation::Lowercase => "lowercase",
            Operation::Describe => "describe",
            Operation::QueryData => "query_data",
            Operation::InsertData => "insert_data",
            Operation::ReadSource => "read_source",
        }
    }

    pub fn spec(self) -> OperationSpec {
        match self {
            Operation::Echo => OperationSpec {
                description: "Returns the input message as-is",
                required: &["message"],
                optional: &[],
            },
            Operation::Uppercase => OperationSpec {
                description: "Converts message to uppercase",
                required: &["message"],
                optional: &[],
            },
            Operation::Lowercase => OperationSpec {
                description: "Converts message to lowercase",
                required: &["message"],
                optional: &[],
            },
            Operation::Describe => OperationSpec {
                description: "Returns the input schema and available operations",
                required: &[],
                optional: &[],
            },
            Operation::QueryData => OperationSpec {
                description: "Selects rows from a workspace table",
                required: &["table"],
                optional: &["columns", "limit"],
            },
            Operation::InsertData => OperationSpec {
                description: "Inserts records into a workspace table, one statement per record",
                required: &["table", "records"],
                optional: &[],
            },
            Operation::ReadSource => OperationSpec {
                description: "Returns the output of an upstream step",
                required: &["source"],
                optional: &[],
            },
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = StfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::all()
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| StfError::UnknownOperation(s.to_string()))
    }
}
