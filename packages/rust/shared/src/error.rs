//! Error types for TexCal.
//!
//! Library crates use [`TexcalError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only pipeline-aborting failures live here. A missing or malformed field in
//! an otherwise well-formed extraction is never an error: the resolver
//! substitutes a default and reports it as a `Fallback` instead.

use std::path::PathBuf;

/// Failure of the extraction gateway. Every variant aborts the invocation.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The call could not complete (connectivity, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote service answered with a non-success status.
    #[error("request rejected with HTTP {status}: {body}")]
    RequestRejected { status: u16, body: String },

    /// Success status, but the body was empty.
    #[error("empty response from extraction service")]
    EmptyResponse,

    /// The envelope is malformed or its content is not a JSON object.
    #[error("malformed extraction envelope: {0}")]
    EnvelopeParse(String),
}

impl GatewayError {
    /// Create an envelope parse error from any displayable message.
    pub fn envelope(msg: impl Into<String>) -> Self {
        Self::EnvelopeParse(msg.into())
    }

    /// HTTP status of a rejected request, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Variant name for logs. Carries no response content.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::RequestRejected { .. } => "request_rejected",
            Self::EmptyResponse => "empty_response",
            Self::EnvelopeParse(_) => "envelope_parse",
        }
    }

    /// Byte length of the attached message or body.
    pub fn detail_len(&self) -> usize {
        match self {
            Self::Transport(msg) | Self::EnvelopeParse(msg) => msg.len(),
            Self::RequestRejected { body, .. } => body.len(),
            Self::EmptyResponse => 0,
        }
    }
}

/// Top-level error type for all TexCal operations.
#[derive(Debug, thiserror::Error)]
pub enum TexcalError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The extraction gateway failed; no schedule was resolved.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The input text was empty or whitespace-only.
    #[error("no text to extract a schedule from")]
    EmptyInput,

    /// Data validation error (bad date flag, unknown zone, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TexcalError>;

impl TexcalError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TexcalError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = TexcalError::validation("unknown time zone 'Mars/Olympus'");
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn gateway_error_is_transparent() {
        let err = TexcalError::from(GatewayError::RequestRejected {
            status: 401,
            body: "invalid api key".into(),
        });
        assert_eq!(
            err.to_string(),
            "request rejected with HTTP 401: invalid api key"
        );
    }

    #[test]
    fn status_only_for_rejections() {
        let rejected = GatewayError::RequestRejected {
            status: 429,
            body: String::new(),
        };
        assert_eq!(rejected.status(), Some(429));
        assert_eq!(GatewayError::EmptyResponse.status(), None);
        assert_eq!(GatewayError::envelope("no choices").status(), None);
    }

    #[test]
    fn kind_and_detail_len_omit_content() {
        let err = GatewayError::envelope("content is not JSON (got: dinner with Mina)");
        assert_eq!(err.kind(), "envelope_parse");
        assert_eq!(err.detail_len(), 43);
        assert_eq!(GatewayError::EmptyResponse.detail_len(), 0);
        assert_eq!(GatewayError::Transport("timed out".into()).kind(), "transport");
    }
}
