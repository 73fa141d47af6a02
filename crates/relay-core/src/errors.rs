use crate::provider::Provider;

/// Errors raised while talking to a vendor or decoding its response.
///
/// Only [`ProviderError::Transport`] and [`ProviderError::HttpStatus`] end a
/// query. The other two are recovered where they occur and only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Connection, TLS, timeout, or mid-stream read failure.
    #[error("transport error ({provider}): {message}")]
    Transport { provider: Provider, message: String },
    /// Vendor answered with a non-2xx status. `body` is kept verbatim.
    #[error("http status {status} ({provider}): {body}")]
    HttpStatus {
        provider: Provider,
        status: u16,
        body: String,
    },
    /// A single frame or object could not be parsed.
    #[error("malformed frame ({provider}): {message}")]
    MalformedFrame { provider: Provider, message: String },
    /// A batch vendor returned no extractable text.
    #[error("empty response ({provider})")]
    EmptyResponse { provider: Provider },
}

impl ProviderError {
    /// Creates a transport-level error.
    pub fn transport(provider: Provider, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    /// Creates a non-2xx status error.
    pub fn http_status(provider: Provider, status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            provider,
            status,
            body: body.into(),
        }
    }

    /// Creates a per-frame parse error.
    pub fn malformed(provider: Provider, message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            provider,
            message: message.into(),
        }
    }

    /// Creates an empty-response marker.
    pub fn empty(provider: Provider) -> Self {
        Self::EmptyResponse { provider }
    }

    /// Returns the provider associated with this error.
    pub fn provider(&self) -> Provider {
        match self {
            Self::Transport { provider, .. }
            | Self::HttpStatus { provider, .. }
            | Self::MalformedFrame { provider, .. }
            | Self::EmptyResponse { provider } => *provider,
        }
    }

    /// Whether the pipeline recovers locally instead of ending the query.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame { .. } | Self::EmptyResponse { .. }
        )
    }

    /// Short message shown to the user, at most `max_len` characters.
    pub fn user_message(&self, max_len: usize) -> String {
        let name = self.provider().display_name();
        let detail = match self {
            Self::Transport { message, .. } => format!("connection failed: {message}"),
            Self::HttpStatus { status, body, .. } if body.trim().is_empty() => {
                format!("API returned error code {status}")
            }
            Self::HttpStatus { status, body, .. } => {
                format!("API returned error code {status}: {}", body.trim())
            }
            Self::MalformedFrame { message, .. } => format!("unreadable response: {message}"),
            Self::EmptyResponse { .. } => "empty response".to_string(),
        };
        let message = format!("Error talking to {name}: {detail}");
        match message.char_indices().nth(max_len) {
            Some((cut, _)) => message[..cut].to_string(),
            None => message,
        }
    }
}

/// Top-level error type for the public relay API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Invalid relay or provider configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid query input.
    #[error("validation error: {0}")]
    Validation(String),
    /// Vendor call failed; the query ended early.
    #[error(transparent)]
    Provider(ProviderError),
    /// The query was aborted by the caller.
    #[error("cancelled")]
    Cancelled,
    /// Internal misuse or invariant violation (closed queue, lost task).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RelayError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<ProviderError> for RelayError {
    fn from(value: ProviderError) -> Self {
        RelayError::Provider(value)
    }
}
