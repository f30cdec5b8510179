//! Error taxonomy shared by the HTTP and WebSocket surfaces.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    /// No playable track, unknown resource
    #[error("{0}")]
    NotFound(String),

    /// The catalog provider failed (network, auth, malformed response, timeout)
    #[error("{0}")]
    Upstream(String),

    /// A WebSocket frame that is not a valid envelope
    #[error("Invalid message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// A request missing required fields or carrying out-of-range values
    #[error("{0}")]
    Validation(String),
}

impl RelayError {
    /// Wrap a provider failure, keeping the whole context chain in the message.
    pub fn upstream(err: anyhow::Error) -> Self {
        RelayError::Upstream(format!("{:#}", err))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        RelayError::NotFound(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_upstream_keeps_context_chain() {
        let err = Err::<(), _>(anyhow::anyhow!("connection refused"))
            .context("yt-dlp search failed")
            .unwrap_err();

        let relay = RelayError::upstream(err);
        assert_eq!(relay.to_string(), "yt-dlp search failed: connection refused");
    }

    #[test]
    fn test_protocol_from_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let relay: RelayError = err.into();
        assert!(matches!(relay, RelayError::Protocol(_)));
        assert!(relay.to_string().starts_with("Invalid message"));
    }
}
