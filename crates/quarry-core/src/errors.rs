//! Error types for endpoint querying and reply recovery
//!
//! Only a small part of what can go wrong while talking to a serving endpoint
//! is ever surfaced to a caller. Metadata lookups fail open, rejected request
//! encodings fall back to the next encoding, and malformed stream fragments are
//! skipped. What remains is collected here, categorized by source so callers
//! can decide between reporting, retrying with a different configuration, or
//! giving up.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("Failed to query endpoint {endpoint} with custom format: {detail}")]
    Endpoint { endpoint: String, detail: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl QueryError {
    /// Message suitable for showing to an end user, with troubleshooting tips
    /// for failures that reached the endpoint.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::Endpoint { .. } | QueryError::Transport(_) => format!(
                "Error querying endpoint: {}\n\
                 Troubleshooting tips:\n\
                 - Verify your endpoint is running and accessible\n\
                 - Check that you have the correct permissions\n\
                 - Review the endpoint configuration",
                self
            ),
            QueryError::Config(msg) => format!(
                "Invalid configuration: {}. Set SERVING_ENDPOINT to the name of your serving endpoint.",
                msg
            ),
            other => format!("Error: {}", other),
        }
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_error_display_carries_detail() {
        let err = QueryError::Endpoint {
            endpoint: "rag-agent".to_string(),
            detail: "400 Bad Request".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to query endpoint rag-agent with custom format: 400 Bad Request"
        );
    }

    #[test]
    fn test_user_message_has_tips_for_endpoint_failures() {
        let err = QueryError::Transport("connection refused".to_string());
        let msg = err.user_message();
        assert!(msg.starts_with("Error querying endpoint: Transport error: connection refused"));
        assert!(msg.contains("Verify your endpoint is running"));

        let err = QueryError::Decode("eof".to_string());
        assert_eq!(err.user_message(), "Error: Decode error: eof");
    }
}
