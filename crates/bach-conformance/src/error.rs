//! Error types for conformance runs

use std::path::PathBuf;
use thiserror::Error;

/// Conformance error type
#[derive(Error, Debug)]
pub enum ConformanceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex decoding error
    #[error("Hex error: {0}")]
    Hex(String),

    /// Fixture parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Fixture preparation failed before execution
    #[error("Setup error: {0}")]
    Setup(String),

    /// Unknown category or missing runner
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Fixture file could not be found
    #[error("Fixture not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl From<hex::FromHexError> for ConformanceError {
    fn from(e: hex::FromHexError) -> Self {
        ConformanceError::Hex(e.to_string())
    }
}

/// Conformance result type
pub type ConformanceResult<T> = Result<T, ConformanceError>;

/// Error raised by a VM or state collaborator
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// VM raised an unexpected error
    #[error("vm: {0}")]
    Vm(String),

    /// External process could not be spawned or talked to
    #[error("process: {0}")]
    Process(#[from] std::io::Error),

    /// External process replied with something undecodable
    #[error("protocol: {0}")]
    Protocol(String),

    /// Collaborator does not implement the requested operation
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Collaborator result type
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_error_converts() {
        let err: ConformanceError = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, ConformanceError::Hex(_)));
    }

    #[test]
    fn test_error_messages() {
        let missing = ConformanceError::NotFound(PathBuf::from("/corpus/a.json"));
        assert_eq!(missing.to_string(), "Fixture not found: /corpus/a.json");
        assert_eq!(
            CollaboratorError::Unsupported("blocks".into()).to_string(),
            "unsupported: blocks"
        );
    }
}
