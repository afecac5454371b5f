use std::fmt;
use thiserror::Error as ThisError;

/// The error type for reqflow operations.
///
/// Besides the kind/message/source triple, a failed remote call carries the
/// HTTP status, the service error code, the request-tracking id, and how many
/// retries were performed, so callers can branch on cause without parsing
/// strings.
#[derive(ThisError, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<http::StatusCode>,
    code: Option<String>,
    request_id: Option<String>,
    attempts: u32,
    exhausted: bool,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input, detected before any network I/O. Never retried.
    Validation,

    /// Credentials could not be loaded, or are invalid/expired.
    Credential,

    /// Network or connection failure while sending the request.
    Transport,

    /// A structured error returned by the remote peer.
    Service,

    /// A successful transport response whose body could not be decoded.
    /// Always fatal: retrying would reproduce the same bytes.
    Protocol,

    /// Everything else.
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            request_id: None,
            attempts: 0,
            exhausted: false,
            source: None,
        }
    }

    /// Add a source error.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the HTTP status code of the failed response.
    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the service-defined error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<http::StatusCode> {
        self.status
    }

    /// Service-defined error code, if the error body carried one.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Request-tracking id reported by the remote service.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Number of retries performed before this error was returned.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True if the error was retryable but the retry budget ran out.
    ///
    /// Lets callers distinguish "service is down" from "my request is
    /// malformed".
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Replace the service error code. Used by error-unmarshal handlers.
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = Some(code.into());
    }

    /// Replace the message. Used by error-unmarshal handlers once the error
    /// body has been decoded.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Record the request-tracking id.
    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = Some(id.into());
    }

    /// Record how many retries were performed.
    pub fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
    }

    /// Mark the error as retried to exhaustion.
    pub fn set_exhausted(&mut self, exhausted: bool) {
        self.exhausted = exhausted;
    }
}

// Convenience constructors
impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a credential error.
    pub fn credential(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Credential, message)
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a service error.
    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Service, message)
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Create an unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "invalid request input"),
            ErrorKind::Credential => write!(f, "credential failure"),
            ErrorKind::Transport => write!(f, "transport failure"),
            ErrorKind::Service => write!(f, "service error"),
            ErrorKind::Protocol => write!(f, "protocol mismatch"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::validation(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
