//! Error types for the texforge server.

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// IO error while binding or serving.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured host and port do not form a socket address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
