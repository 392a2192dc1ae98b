use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("oracle returned an empty response")]
    Empty,
    #[error("oracle not configured: {0}")]
    NotConfigured(String),
}

/// Black-box natural-language reasoning service.
///
/// Calls are treated as slow, fallible and non-deterministic; callers bound
/// them with [`invoke_with_timeout`].
#[async_trait]
pub trait SynthesisOracle: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, OracleError>;

    /// Short provider label for logs.
    fn name(&self) -> &str {
        "oracle"
    }
}

/// Single bounded round-trip to the oracle. No retries.
pub async fn invoke_with_timeout(
    oracle: &dyn SynthesisOracle,
    prompt: &str,
    timeout_ms: u64,
) -> Result<String, OracleError> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), oracle.invoke(prompt)).await {
        Ok(Ok(text)) if text.trim().is_empty() => Err(OracleError::Empty),
        Ok(res) => res,
        Err(_) => {
            tracing::warn!(oracle = oracle.name(), timeout_ms, "oracle call timed out");
            Err(OracleError::Timeout { timeout_ms })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl SynthesisOracle for Slow {
        async fn invoke(&self, _prompt: &str) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    struct Blank;

    #[async_trait]
    impl SynthesisOracle for Blank {
        async fn invoke(&self, _prompt: &str) -> Result<String, OracleError> {
            Ok("   ".into())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let res = invoke_with_timeout(&Slow, "hello", 20).await;
        assert!(matches!(res, Err(OracleError::Timeout { timeout_ms: 20 })));
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_error() {
        let res = invoke_with_timeout(&Blank, "hello", 1000).await;
        assert!(matches!(res, Err(OracleError::Empty)));
    }
}
