use thiserror::Error;

/// Transport-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The transport refused the URL (no host, unsupported form).
    MalformedUrl,
    /// Connection could not be established.
    Connect,
    /// Connect or read timed out.
    Timeout,
    /// Local I/O failed (download destination, file payload).
    Io,
    /// The response body stream broke mid-transfer.
    Body,
    /// The exchange was aborted.
    Cancelled,
    /// Anything the transport could not categorize.
    Other,
}

/// An error reported by the underlying transport for one attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed_url(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MalformedUrl, message)
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "request cancelled")
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors delivered through a task's result channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    /// A string could not be converted into a URL.
    #[error("Invalid URL: {0}")]
    UrlConversion(String),

    /// The request payload could not be constructed.
    #[error("Request encoding failed: {0}")]
    Encoding(String),

    /// The transport rejected the URL as malformed.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// The server answered outside the 2xx range.
    #[error("Unacceptable status code {0}")]
    StatusCode(u16),

    /// A 2xx response arrived without a usable body.
    #[error("Response carried no data")]
    MissingData,

    /// A received body could not be projected into text or a typed value.
    #[error("Response decoding failed: {0}")]
    Decoding(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl NetError {
    pub fn encoding(message: impl Into<String>) -> Self {
        NetError::Encoding(message.into())
    }

    /// Stable numeric code, grouped the way Chromium groups `net_error_list.h`.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Transport(err) => match err.kind() {
                TransportErrorKind::Connect => -104,
                TransportErrorKind::Timeout => -118,
                TransportErrorKind::Io => -160,
                TransportErrorKind::Cancelled => -3,
                TransportErrorKind::Body => -355,
                TransportErrorKind::MalformedUrl => -300,
                TransportErrorKind::Other => -2,
            },
            NetError::UrlConversion(_) => -300,
            NetError::MalformedUrl(_) => -300,
            NetError::Encoding(_) => -340,
            NetError::StatusCode(_) => -320,
            NetError::MissingData => -324,
            NetError::Decoding(_) => -330,
            NetError::Unknown(_) => -1,
        }
    }

    /// Whether a failed attempt may be re-issued by the retry path.
    ///
    /// Errors raised before dispatch are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::UrlConversion(_) | NetError::Encoding(_) | NetError::Decoding(_) => false,
            NetError::Transport(err) => err.kind() != TransportErrorKind::Cancelled,
            NetError::MalformedUrl(_)
            | NetError::StatusCode(_)
            | NetError::MissingData
            | NetError::Unknown(_) => true,
        }
    }

    /// The transport error behind this failure, if there was one.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            NetError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for NetError {
    fn from(err: TransportError) -> Self {
        match err.kind() {
            TransportErrorKind::MalformedUrl => NetError::MalformedUrl(err.message),
            _ => NetError::Transport(err),
        }
    }
}

impl From<url::ParseError> for NetError {
    fn from(err: url::ParseError) -> Self {
        NetError::UrlConversion(err.to_string())
    }
}
