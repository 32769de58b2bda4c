use thiserror::Error;

#[derive(Debug, Error)]
pub enum NntpError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("authentication failed ({code}): {message}")]
    Auth { code: u16, message: String },

    #[error("post failed: {0}")]
    Post(String),

    #[error("unexpected response {code}: {message}")]
    UnexpectedResponse { code: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NntpError {
    /// Whether the connection must be abandoned. Only a failed post leaves it usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, NntpError::Post(_))
    }
}
