use thiserror::Error;

/// Longest accepted question, in characters.
pub const MAX_QUERY_CHARS: usize = 10_000;

/// Local validation failures. Never retried and never sent to the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a question")]
    Empty,
    #[error("Question is too long. Please limit to 10,000 characters.")]
    TooLong { length: usize, limit: usize },
    #[error("Invalid response format: {detail}")]
    MalformedResponse { detail: String },
}

/// Classified failures of a single call to the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The backend answered with a non-2xx status.
    #[error("Backend error: {status} - {message}")]
    Server { status: u16, message: String },
    /// No response was received (unreachable host, refused connection, timeout).
    #[error("Network error: Unable to reach the RAG backend ({message})")]
    Network { message: String },
    /// The request could not be built locally.
    #[error("Request error: {message}")]
    Request { message: String },
}

impl TransportError {
    /// 4xx responses mean the request itself is wrong; everything else may be transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Server { status, .. } => !(400..500).contains(status),
            TransportError::Network { .. } | TransportError::Request { .. } => true,
        }
    }
}

/// Terminal failure of a widget submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
