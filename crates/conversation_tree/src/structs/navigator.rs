use uuid::Uuid;

use crate::error::{Result, TreeError};
use crate::structs::discussion::DiscussionTree;
use crate::structs::message::{MessageNode, Role};

/// Read-only traversal over a `DiscussionTree`. Never mutates.
#[derive(Clone, Copy, Debug)]
pub struct TreeNavigator<'a> {
    tree: &'a DiscussionTree,
}

impl DiscussionTree {
    pub fn navigator(&self) -> TreeNavigator<'_> {
        TreeNavigator { tree: self }
    }
}

impl<'a> TreeNavigator<'a> {
    /// Root-to-node sequence of messages ending at `node_id`.
    ///
    /// This is exactly the ordered context a model would receive for a
    /// reply at `node_id`.
    pub fn get_path(&self, node_id: Uuid) -> Result<Vec<&'a MessageNode>> {
        let nodes = &self.tree.nodes;
        let mut current = nodes.get_node(node_id)?;
        let mut path = vec![current];

        while let Some(parent_id) = current.parent_id {
            // a valid tree is never deeper than its node count
            if path.len() > nodes.len() {
                return Err(TreeError::corrupt(format!(
                    "parent chain from {node_id} does not terminate"
                )));
            }
            current = nodes
                .get_node(parent_id)
                .map_err(|_| TreeError::corrupt(format!("dangling parent {parent_id}")))?;
            path.push(current);
        }

        path.reverse();
        Ok(path)
    }

    pub fn path_ids(&self, node_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.get_path(node_id)?.iter().map(|n| n.id).collect())
    }

    pub fn current_path(&self) -> Vec<&'a MessageNode> {
        self.get_path(self.tree.current_node_id)
            .unwrap_or_default()
    }

    /// Whether `node_id` lies in the subtree rooted at `ancestor_id`.
    /// A node counts as its own descendant.
    pub fn is_descendant(&self, ancestor_id: Uuid, node_id: Uuid) -> Result<bool> {
        self.tree.nodes.get_node(ancestor_id)?;
        let path = self.get_path(node_id)?;
        Ok(path.iter().any(|n| n.id == ancestor_id))
    }

    /// The node and its siblings in creation order. The root is its own
    /// only sibling.
    pub fn siblings(&self, node_id: Uuid) -> Result<Vec<Uuid>> {
        let node = self.tree.nodes.get_node(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(self.tree.nodes.get_children(parent_id)?.to_vec()),
            None => Ok(vec![node.id]),
        }
    }

    /// The most recently created node. Equal timestamps resolve to the
    /// node that comes later in pre-order.
    pub fn latest_node(&self) -> &'a MessageNode {
        let ordered = self.tree.nodes.preorder(self.tree.root_id);
        let mut latest = self.tree.root();
        for node in ordered {
            if node.created_at >= latest.created_at {
                latest = node;
            }
        }
        latest
    }

    /// The last user message on the current path; regenerating an
    /// assistant reply starts from here.
    pub fn retry_anchor(&self) -> Result<&'a MessageNode> {
        self.current_path()
            .into_iter()
            .rev()
            .find(|n| n.role == Role::User)
            .ok_or(TreeError::NoUserMessage)
    }

    /// Case-insensitive substring search over message content, in pre-order.
    pub fn search(&self, query: &str) -> Vec<&'a MessageNode> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.tree
            .nodes
            .preorder(self.tree.root_id)
            .into_iter()
            .filter(|n| n.content.to_lowercase().contains(&needle))
            .collect()
    }
}
