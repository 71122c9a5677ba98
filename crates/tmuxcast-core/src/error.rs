//! Error types for the recording engine's pure domain.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("cannot combine key `{key}` with {operand}")]
    UnsupportedOperand { key: String, operand: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum TimingError {
    #[error("invalid {name}: {value} (expected a positive number)")]
    InvalidArgument { name: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write capture {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write capture line: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to encode capture line: {0}")]
    Json(#[from] serde_json::Error),
}
