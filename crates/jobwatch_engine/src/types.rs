use std::fmt;

use jobwatch_core::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportFailure,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The response body did not have the expected shape.
    Decode,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::InvalidUrl => write!(f, "invalid url"),
            TransportFailure::HttpStatus(code) => write!(f, "http status {code}"),
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Network => write!(f, "network error"),
            TransportFailure::Decode => write!(f, "unexpected response body"),
        }
    }
}

/// Errors from [`crate::JobApi::create_job`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A stream message that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("stream line is not valid utf-8")]
    InvalidUtf8,
    #[error("stream line is not a valid message: {0}")]
    InvalidMessage(String),
    #[error("stream line exceeds {max_bytes} bytes")]
    LineTooLong { max_bytes: usize },
}

impl ProtocolError {
    /// Only an unbounded line ends the subscription; anything else is dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::LineTooLong { .. })
    }
}

/// Why a subscription ended. Reported to `on_error` exactly once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("event stream transport failed: {0}")]
    Transport(TransportError),
    #[error("event stream protocol failure: {0}")]
    Protocol(ProtocolError),
    #[error("event stream closed by the server")]
    Closed,
}

/// Errors returned by [`crate::JobTracker::start`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid job request: {0}")]
    Validation(#[from] ValidationError),
    #[error("a job is already in flight on this tracker")]
    AlreadyRunning,
    #[error("could not create the job: {0}")]
    Transport(TransportError),
    #[error("tracker was disposed before the job was created")]
    Disposed,
}

impl From<ApiError> for TrackerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(err) => TrackerError::Validation(err),
            ApiError::Transport(err) => TrackerError::Transport(err),
        }
    }
}
