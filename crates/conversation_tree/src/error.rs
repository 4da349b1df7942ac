//! Tree engine error types

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while manipulating or restoring a `DiscussionTree`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// An append referenced a parent that is not in the node store.
    #[error("parent node not found: {0}")]
    ParentNotFound(Uuid),

    /// A select, path or children query referenced an absent node.
    #[error("node not found: {0}")]
    NodeNotFound(Uuid),

    /// The persisted structure is malformed, truncated or violates a tree invariant.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The current path holds no user message to regenerate a reply from.
    #[error("no user message on the current path")]
    NoUserMessage,
}

pub type Result<T> = std::result::Result<T, TreeError>;

impl TreeError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        TreeError::Serialization(reason.into())
    }
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        TreeError::Serialization(err.to_string())
    }
}
