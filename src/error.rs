//! Error types for the record storage engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no page admits a record of {requested} bytes")]
    OutOfSpace { requested: u32 },

    #[error("record {0} not found")]
    NotFound(crate::types::RecordId),

    #[error("cannot compare {lhs} with {rhs}")]
    TypeMismatch { lhs: &'static str, rhs: &'static str },

    #[error("column '{column}': {reason}")]
    SchemaViolation { column: String, reason: String },

    #[error("duplicate value for primary column '{column}'")]
    UniquenessViolation { column: String },

    #[error("malformed expression: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
