//! Protocol errors.
//!
//! Every failure that reaches a client is a [`StrestError`]: a status code, a
//! message and, for errors that started life as something else, the original
//! error kept as the cause so it can be logged.

use std::fmt;
use std::sync::Arc;

/// Result alias used by the dispatch pipeline.
pub type StrestResult<T> = Result<T, StrestError>;

/// A protocol error carrying the status code and message sent to the client.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code} {message}")]
pub struct StrestError {
    code: u16,
    message: String,
    #[source]
    cause: Option<Cause>,
}

/// Wrapped original error; `Arc` keeps [`StrestError`] cheap to clone while
/// error filters and logs borrow it.
#[derive(Clone)]
struct Cause(Arc<anyhow::Error>);

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for Cause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl StrestError {
    /// Create a protocol error with an explicit status code and message.
    #[must_use]
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request")
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(401, "Unauthorized")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(403, "Forbidden")
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(405, "Method Not Allowed")
    }

    #[must_use]
    pub fn internal_server_error() -> Self {
        Self::new(500, "Internal Server Error")
    }

    #[must_use]
    pub fn service_unavailable() -> Self {
        Self::new(503, "Service Unavailable")
    }

    /// Attach the error that caused this one.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(Cause(Arc::new(cause.into())));
        self
    }

    /// Normalize an arbitrary error raised by controller or filter code.
    ///
    /// A `StrestError` is returned unchanged; anything else becomes an
    /// internal server error with the original kept as the cause.
    #[must_use]
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<StrestError>() {
            Ok(protocol) => protocol,
            Err(other) => Self::internal_server_error().with_cause(other),
        }
    }

    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped original error, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref().map(|c| &*c.0)
    }
}
