use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid search mode: {0} (expected dense, sparse or hybrid)")]
    InvalidMode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of an external collaborator (embedding API, vector index,
/// term-suggestion model). Adapters return these instead of panicking or
/// swallowing; the engine matches on them and degrades to the documented
/// fallback, so they never surface as query-level errors.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{0} is not configured")]
    Unconfigured(&'static str),

    #[error("collaborator timed out: {0}")]
    Timeout(String),

    #[error("collaborator returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed collaborator response: {0}")]
    BadResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl CollaboratorError {
    /// Collapse a transport-layer error, classifying timeouts separately
    /// so callers can observe them in logs.
    pub fn transport(e: impl std::fmt::Display, timed_out: bool) -> Self {
        if timed_out {
            CollaboratorError::Timeout(e.to_string())
        } else {
            CollaboratorError::Transport(e.to_string())
        }
    }
}
