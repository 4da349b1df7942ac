use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::structs::message::MessageNode;
use crate::structs::node_store::NodeStore;

/// One discussion: a tree of messages plus the pointer to the active position.
///
/// Fields are crate-private so the pointer and the arena can only change
/// through the branching operations (`append_message`, `select`), which
/// keep every tree invariant intact.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscussionTree {
    pub(crate) uuid: Uuid,
    pub(crate) title: Option<String>,
    pub(crate) system_prompt: String,
    pub(crate) root_id: Uuid,
    pub(crate) current_node_id: Uuid,
    pub(crate) nodes: NodeStore,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Everything needed to rebuild a tree, handed over by the deserializer
/// once the structure has been validated.
pub(crate) struct TreeParts {
    pub uuid: Uuid,
    pub title: Option<String>,
    pub system_prompt: String,
    pub root_id: Uuid,
    pub current_node_id: Uuid,
    pub nodes: NodeStore,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscussionTree {
    pub(crate) fn from_parts(parts: TreeParts) -> Self {
        Self {
            uuid: parts.uuid,
            title: parts.title,
            system_prompt: parts.system_prompt,
            root_id: parts.root_id,
            current_node_id: parts.current_node_id,
            nodes: parts.nodes,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn root_id(&self) -> Uuid {
        self.root_id
    }

    pub fn current_node_id(&self) -> Uuid {
        self.current_node_id
    }

    pub fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn root(&self) -> &MessageNode {
        // root_id is validated at construction and nodes are never removed
        self.nodes
            .get_node(self.root_id)
            .unwrap_or_else(|_| unreachable!("root node missing from store"))
    }

    pub fn current_node(&self) -> &MessageNode {
        self.nodes
            .get_node(self.current_node_id)
            .unwrap_or_else(|_| unreachable!("current node missing from store"))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
