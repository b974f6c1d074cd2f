// Mackerel API client error types

use thiserror::Error;

/// Result alias for Mackerel API operations
pub type Result<T> = std::result::Result<T, MackerelError>;

/// Errors raised by the Mackerel API client
#[derive(Error, Debug)]
pub enum MackerelError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Invalid argument '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Request to Mackerel API '{path}' failed: {detail}")]
    Transport {
        path: String,
        /// The cause chain rendered as one line
        detail: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{message}")]
    Provider {
        status: u16,
        body: String,
        message: String,
    },
}

impl MackerelError {
    /// Create a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a validation error for a caller-supplied field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error wrapping the underlying cause
    pub fn transport(
        path: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::transport_labeled(path, None, source)
    }

    /// Create a transport error whose message starts with a short failure class,
    /// e.g. "timed out"
    pub fn transport_labeled(
        path: impl Into<String>,
        label: Option<&str>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        let chain = error_chain(&*source);
        let detail = match label {
            Some(label) => format!("{label}: {chain}"),
            None => chain,
        };
        Self::Transport {
            path: path.into(),
            detail,
            source,
        }
    }

    /// Create a provider error for a non-success HTTP status
    pub fn provider_status(path: &str, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::Provider {
            message: format!("Mackerel API returned HTTP {status} for '{path}': {body}"),
            status,
            body,
        }
    }

    /// Create a provider error for a body that is not valid JSON
    pub fn provider_decode(
        path: &str,
        status: u16,
        body: impl Into<String>,
        source: &serde_json::Error,
    ) -> Self {
        let body = body.into();
        Self::Provider {
            message: format!(
                "Mackerel API returned an undecodable body for '{path}' (HTTP {status}): {source}"
            ),
            status,
            body,
        }
    }

    /// Short category name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::Transport { .. } => "transport",
            Self::Provider { .. } => "provider",
        }
    }

    /// HTTP status reported by the provider, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Render an error and every `source()` below it, skipping causes whose text
/// is already part of the message
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !text.is_empty() && !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = cause.source();
    }
    rendered
}
