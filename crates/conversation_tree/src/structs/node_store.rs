use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Result, TreeError};
use crate::structs::message::{MessageNode, Role};
use crate::structs::metadata::LlmMetadata;

/// The arena holding every message of one discussion, keyed by id.
///
/// Nodes only ever enter the store; there is no removal. Referential
/// integrity is enforced on insertion: a node can only be attached to a
/// parent that is already present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStore {
    nodes: HashMap<Uuid, MessageNode>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from already-validated nodes.
    pub(crate) fn from_nodes(nodes: HashMap<Uuid, MessageNode>) -> Self {
        Self { nodes }
    }

    /// Inserts a parentless node. Only tree creation calls this.
    pub(crate) fn insert_root(&mut self, role: Role, content: String) -> Uuid {
        let id = self.fresh_id();
        self.nodes.insert(
            id,
            MessageNode {
                id,
                role,
                content,
                parent_id: None,
                children: Vec::new(),
                created_at: Utc::now(),
                llm_metadata: None,
            },
        );
        id
    }

    /// Creates a node under `parent_id` and returns its id.
    ///
    /// The new id is appended to the parent's `children`, so sibling order
    /// is the order in which this method was called.
    pub fn add_node(
        &mut self,
        parent_id: Uuid,
        role: Role,
        content: impl Into<String>,
        llm_metadata: Option<LlmMetadata>,
    ) -> Result<Uuid> {
        if !self.nodes.contains_key(&parent_id) {
            return Err(TreeError::ParentNotFound(parent_id));
        }

        let id = self.fresh_id();
        let node = MessageNode {
            id,
            role,
            content: content.into(),
            parent_id: Some(parent_id),
            children: Vec::new(),
            created_at: Utc::now(),
            llm_metadata,
        };
        self.nodes.insert(id, node);

        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.push(id);
        }

        tracing::debug!(
            node_id = %id,
            parent_id = %parent_id,
            role = %role,
            pool_size = self.nodes.len(),
            "NodeStore: node added"
        );

        Ok(id)
    }

    pub fn get_node(&self, node_id: Uuid) -> Result<&MessageNode> {
        self.nodes
            .get(&node_id)
            .ok_or(TreeError::NodeNotFound(node_id))
    }

    pub fn get_children(&self, node_id: Uuid) -> Result<&[Uuid]> {
        self.get_node(node_id).map(|node| node.children.as_slice())
    }

    pub fn contains(&self, node_id: Uuid) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates nodes in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.values()
    }

    /// Depth-first pre-order walk from `root_id`, visiting children in
    /// creation order. Iterative, so deep conversations cannot overflow
    /// the stack. Unknown ids are skipped.
    pub fn preorder(&self, root_id: Uuid) -> Vec<&MessageNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![root_id];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            ordered.push(node);
            stack.extend(node.children.iter().rev().copied());
        }

        ordered
    }

    fn fresh_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }
}
