use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::structs::metadata::LlmMetadata;

/// A node in the discussion tree, stored in the `NodeStore`.
///
/// Nodes are immutable once created. The only field that grows is
/// `children`, which the store appends to when a reply is added.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageNode {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// `None` only for the root.
    pub parent_id: Option<Uuid>,
    /// Replies to this node, in creation order.
    pub children: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_metadata: Option<LlmMetadata>,
}

impl MessageNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("{other} is not a valid role")),
        }
    }
}
