//! Error module for the Rusty Spinal library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum SpinalError {
    /// Error for an empty input, e.g., no traces, no slices or no dots.
    EmptyInput(String),
    /// Error for incompatible traces, e.g., different number of samples within one dataset.
    IncompatibleTraces(String),
    /// Error for a ragged or otherwise malformed array.
    InvalidShape(String),
    /// Error for invalid parameters.
    InvalidParameter(String),
    /// Error for a matrix that cannot be inverted or decomposed.
    SingularMatrix(String),
    /// Not implemented operation.
    NotImplemented(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SpinalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpinalError::EmptyInput(e) => write!(f, "Empty input: {}", e),
            SpinalError::IncompatibleTraces(e) => write!(f, "Incompatible traces: {}", e),
            SpinalError::InvalidShape(e) => write!(f, "Invalid shape: {}", e),
            SpinalError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            SpinalError::SingularMatrix(e) => write!(f, "Singular matrix: {}", e),
            SpinalError::NotImplemented(e) => write!(f, "Not implemented: {}", e),
            SpinalError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SpinalError {}

impl From<std::io::Error> for SpinalError {
    fn from(e: std::io::Error) -> Self {
        SpinalError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for SpinalError {
    fn from(e: serde_json::Error) -> Self {
        SpinalError::IOError(e.to_string())
    }
}
