use std::fmt::{self, Display};

/// Errors raised while building an NNF graph from the small text format
/// `builder` understands. Propagation-time conditions (conflict, cutoff,
/// arena exhaustion) are never `Result` errors; they are sticky flags
/// reported on `PassReport` instead, since they are expected outcomes of
/// the algorithm rather than failures of the caller's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    UnknownLiteral(String),
    UnexpectedToken { expected: &'static str, found: String },
    EmptyOperator(&'static str),
    NoRoot,
    DuplicateLiteral(String),
}

impl Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::UnknownLiteral(name) => write!(f, "unknown literal '{}'", name),
            BuilderError::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found '{}'", expected, found)
            }
            BuilderError::EmptyOperator(kind) => write!(f, "'{}' requires at least one argument", kind),
            BuilderError::NoRoot => write!(f, "formula text produced no root node"),
            BuilderError::DuplicateLiteral(name) => write!(f, "literal '{}' declared twice", name),
        }
    }
}

impl std::error::Error for BuilderError {}
