//! maidkit - Dataset error types

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The unit of input a parse error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// 1-based line number in a line-delimited file
    Line(usize),
    /// The whole file parsed as a single JSON value
    TopLevel,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Line(n) => write!(f, "L{}", n),
            Unit::TopLevel => write!(f, "top-level"),
        }
    }
}

/// Errors raised while loading, validating or building a dataset.
///
/// Every variant is fatal for the current run.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Format { message: String },

    #[error("{unit}: JSON parse error: {message}")]
    Parse { unit: Unit, message: String },

    #[error("record {index}: missing 'messages' list")]
    Schema { index: usize },
}

impl DatasetError {
    /// Process exit status the CLI reports for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            DatasetError::NotFound { .. } => 2,
            DatasetError::Schema { .. } => 3,
            _ => 1,
        }
    }
}

/// Result type for dataset operations
pub type Result<T> = std::result::Result<T, DatasetError>;
