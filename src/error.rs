//! Domain-specific error types for clarity-mind

use thiserror::Error;

/// Main error type for the research orchestrator
#[derive(Error, Debug)]
pub enum ClarityMindError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Oracle error: {message}")]
    Oracle { message: String },

    #[error("Ingest error: {message}")]
    Ingest { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },
}

impl From<anyhow::Error> for ClarityMindError {
    fn from(err: anyhow::Error) -> Self {
        ClarityMindError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClarityMindError {
    fn from(err: serde_json::Error) -> Self {
        ClarityMindError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ClarityMindError {
    fn from(err: toml::de::Error) -> Self {
        ClarityMindError::Config {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for ClarityMindError {
    fn from(err: csv::Error) -> Self {
        ClarityMindError::Ingest {
            message: format!("CSV parsing failed: {}", err),
        }
    }
}

impl From<crate::ingest::IngestError> for ClarityMindError {
    fn from(err: crate::ingest::IngestError) -> Self {
        ClarityMindError::Ingest {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ClarityMindError {
    fn from(err: std::io::Error) -> Self {
        ClarityMindError::Ingest {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClarityMindError {
    fn from(err: reqwest::Error) -> Self {
        ClarityMindError::Oracle {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

impl From<crate::clients::OracleError> for ClarityMindError {
    fn from(err: crate::clients::OracleError) -> Self {
        match err {
            crate::clients::OracleError::Timeout { timeout_ms } => ClarityMindError::Timeout {
                operation: "oracle call".to_string(),
                timeout_ms,
            },
            other => ClarityMindError::Oracle {
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for clarity-mind operations
pub type Result<T> = std::result::Result<T, ClarityMindError>;
