// Analysis error taxonomy
// The boundary type surfaced to CLI and HTTP callers

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Analysis failed: {0:#}")]
    Parse(anyhow::Error),

    #[error("Analysis failed: could not store assessment: {0:#}")]
    Persistence(anyhow::Error),
}

impl AnalysisError {
    /// Stable machine-readable code for this failure
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::UnsupportedFormat(_) => "unsupported_format",
            AnalysisError::Parse(_) => "parse_error",
            AnalysisError::Persistence(_) => "persistence_error",
        }
    }
}

/// Error payload: `{"error": "...", "kind": "..."}`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind: kind.to_string(),
        }
    }
}

impl From<&AnalysisError> for ErrorResponse {
    fn from(err: &AnalysisError) -> Self {
        ErrorResponse::new(err.kind(), err.to_string())
    }
}
