//! Persisted byte representation of a `DiscussionTree`.
//!
//! The blob is a versioned JSON document. Nodes are written in pre-order
//! from the root, following each node's recorded `children` order, so the
//! output never depends on hash-map iteration order. Loading parses plain
//! data only and then re-checks every structural invariant; a blob that
//! fails any check is rejected rather than repaired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::error::{Result, TreeError};
use crate::structs::discussion::{DiscussionTree, TreeParts};
use crate::structs::message::MessageNode;
use crate::structs::node_store::NodeStore;

pub const FORMAT_VERSION: u32 = 1;

/// Converts discussion trees to and from an opaque persisted blob.
pub trait TreeSerializer: Send + Sync {
    fn serialize(&self, tree: &DiscussionTree) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> Result<DiscussionTree>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTreeSerializer {
    pretty: bool,
}

impl JsonTreeSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

#[derive(Serialize)]
struct PersistedTreeRef<'a> {
    format_version: u32,
    uuid: Uuid,
    title: Option<&'a str>,
    system_prompt: &'a str,
    root_id: Uuid,
    current_node_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    nodes: Vec<&'a MessageNode>,
}

#[derive(Deserialize)]
struct PersistedTree {
    format_version: u32,
    uuid: Uuid,
    title: Option<String>,
    system_prompt: String,
    root_id: Uuid,
    current_node_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    nodes: Vec<MessageNode>,
}

impl TreeSerializer for JsonTreeSerializer {
    fn serialize(&self, tree: &DiscussionTree) -> Result<Vec<u8>> {
        let persisted = PersistedTreeRef {
            format_version: FORMAT_VERSION,
            uuid: tree.uuid,
            title: tree.title.as_deref(),
            system_prompt: &tree.system_prompt,
            root_id: tree.root_id,
            current_node_id: tree.current_node_id,
            created_at: tree.created_at,
            updated_at: tree.updated_at,
            nodes: tree.nodes.preorder(tree.root_id),
        };

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&persisted)?
        } else {
            serde_json::to_vec(&persisted)?
        };

        tracing::debug!(
            discussion_id = %tree.uuid,
            node_count = persisted.nodes.len(),
            blob_len = bytes.len(),
            "TreeSerializer: serialized"
        );

        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<DiscussionTree> {
        let persisted: PersistedTree = serde_json::from_slice(bytes)?;

        if persisted.format_version != FORMAT_VERSION {
            return Err(TreeError::corrupt(format!(
                "unsupported format version {}",
                persisted.format_version
            )));
        }

        let discussion_id = persisted.uuid;
        let tree = rebuild(persisted).inspect_err(|err| {
            tracing::warn!(
                discussion_id = %discussion_id,
                error = %err,
                "TreeSerializer: rejected persisted structure"
            );
        })?;

        tracing::debug!(
            discussion_id = %tree.uuid,
            node_count = tree.nodes.len(),
            "TreeSerializer: deserialized"
        );

        Ok(tree)
    }
}

/// Serializes with the default JSON format.
pub fn serialize(tree: &DiscussionTree) -> Result<Vec<u8>> {
    JsonTreeSerializer::new().serialize(tree)
}

/// Restores a tree written by [`serialize`], validating its structure.
pub fn deserialize(bytes: &[u8]) -> Result<DiscussionTree> {
    JsonTreeSerializer::new().deserialize(bytes)
}

fn rebuild(persisted: PersistedTree) -> Result<DiscussionTree> {
    let mut nodes: HashMap<Uuid, MessageNode> = HashMap::with_capacity(persisted.nodes.len());
    for node in persisted.nodes {
        let id = node.id;
        if nodes.insert(id, node).is_some() {
            return Err(TreeError::corrupt(format!("duplicate node id {id}")));
        }
    }

    validate_structure(&nodes, persisted.root_id)?;

    if !nodes.contains_key(&persisted.current_node_id) {
        return Err(TreeError::corrupt(format!(
            "current node {} is not in the tree",
            persisted.current_node_id
        )));
    }

    Ok(DiscussionTree::from_parts(TreeParts {
        uuid: persisted.uuid,
        title: persisted.title,
        system_prompt: persisted.system_prompt,
        root_id: persisted.root_id,
        current_node_id: persisted.current_node_id,
        nodes: NodeStore::from_nodes(nodes),
        created_at: persisted.created_at,
        updated_at: persisted.updated_at,
    }))
}

/// Checks single root, parent references, children/parent agreement and
/// that every node is reachable from the root exactly once.
fn validate_structure(nodes: &HashMap<Uuid, MessageNode>, root_id: Uuid) -> Result<()> {
    let root = nodes
        .get(&root_id)
        .ok_or_else(|| TreeError::corrupt(format!("root node {root_id} is missing")))?;
    if root.parent_id.is_some() {
        return Err(TreeError::corrupt("root node has a parent"));
    }

    let mut expected_children: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    for node in nodes.values() {
        match node.parent_id {
            None if node.id != root_id => {
                return Err(TreeError::corrupt(format!(
                    "node {} has no parent but is not the root",
                    node.id
                )));
            }
            None => {}
            Some(parent_id) => {
                if !nodes.contains_key(&parent_id) {
                    return Err(TreeError::corrupt(format!(
                        "node {} references missing parent {parent_id}",
                        node.id
                    )));
                }
                expected_children.entry(parent_id).or_default().insert(node.id);
            }
        }
    }

    let empty = HashSet::new();
    for node in nodes.values() {
        let recorded: HashSet<Uuid> = node.children.iter().copied().collect();
        if recorded.len() != node.children.len() {
            return Err(TreeError::corrupt(format!(
                "node {} lists a child more than once",
                node.id
            )));
        }
        let expected = expected_children.get(&node.id).unwrap_or(&empty);
        if &recorded != expected {
            return Err(TreeError::corrupt(format!(
                "children of node {} disagree with parent links",
                node.id
            )));
        }
    }

    let mut visited: HashSet<Uuid> = HashSet::with_capacity(nodes.len());
    let mut queue = VecDeque::from([root_id]);
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            return Err(TreeError::corrupt(format!("node {id} is reachable twice")));
        }
        if let Some(node) = nodes.get(&id) {
            queue.extend(node.children.iter().copied());
        }
    }

    if visited.len() != nodes.len() {
        return Err(TreeError::corrupt(format!(
            "{} node(s) are not reachable from the root",
            nodes.len() - visited.len()
        )));
    }

    Ok(())
}
