// MCP transport error types

use thiserror::Error;

/// Errors that end an MCP serving session
#[derive(Error, Debug)]
pub enum McpError {
    #[error("IO error on MCP transport while {context}: {source}")]
    IoError {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization/deserialization error: {reason}")]
    JsonError {
        reason: String,
        #[source]
        source: serde_json::Error,
    },
}

impl McpError {
    /// Create an IO error
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// Create a JSON error
    pub fn json_error(reason: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonError {
            reason: reason.into(),
            source,
        }
    }
}
