//! Discussion service error types

use conversation_tree::TreeError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Discussion not found: {0}")]
    DiscussionNotFound(Uuid),

    #[error("Discussion {discussion} is busy: lock not acquired within {waited_ms} ms")]
    LockContention { discussion: Uuid, waited_ms: u64 },

    #[error("Message content cannot be empty")]
    EmptyMessageContent,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// How a transport layer should surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request referenced something that does not exist or was invalid.
    Client,
    /// Stored data is unusable or the backend failed; needs operator attention.
    Server,
    /// Transient contention; the same request may succeed later.
    Retryable,
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::Tree(TreeError::Serialization(_)) => ErrorClass::Server,
            ServiceError::Tree(_)
            | ServiceError::DiscussionNotFound(_)
            | ServiceError::EmptyMessageContent => ErrorClass::Client,
            ServiceError::LockContention { .. } => ErrorClass::Retryable,
            ServiceError::Storage(_)
            | ServiceError::Config(_)
            | ServiceError::Json(_)
            | ServiceError::Io(_) => ErrorClass::Server,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}
