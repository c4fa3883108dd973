//! Backend adapter error types.

/// Errors surfaced by a backend adapter.
///
/// The first four variants mirror the status codes of the common adapter
/// contract; the rest cover transport and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The requested date lies outside the data the backend holds
    #[error("date out of scope: {0}")]
    DateOutOfScope(String),

    /// The backend rejected the request shape
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Invalid or missing credential
    #[error("unauthorized (invalid credential)")]
    Unauthorized,

    /// The backend reported an internal failure
    #[error("internal backend error: {0}")]
    Internal(String),

    /// HTTP request failed (network error, timeout, unexpected status)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded
    #[error("JSON decode error: {message}")]
    Decode {
        message: String,
        body: Option<String>,
    },

    /// No adapter is registered for the backend's family
    #[error("no adapter registered for family {0:?}")]
    UnknownAdapter(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Http(err.to_string())
    }
}
