use thiserror::Error;

/// Errors raised while talking to the archive services.
///
/// Everything here is transient from the pipeline's point of view: callers
/// either retry (band downloads) or degrade to an empty result with a
/// logged warning (observation lookup, product listing).
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Network-level failure (connection, TLS, timeout, bad status).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered but reported a failure of its own.
    #[error("service error: {0}")]
    Service(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Parse(String),

    /// Local filesystem failure while caching a download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for ArchiveError {
    fn from(err: ureq::Error) -> Self {
        ArchiveError::Transport(err.to_string())
    }
}
