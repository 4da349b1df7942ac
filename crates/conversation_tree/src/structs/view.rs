use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use uuid::Uuid;

use crate::structs::discussion::DiscussionTree;
use crate::structs::message::{MessageNode, Role};

/// Nested projection of a discussion for presentation.
///
/// Use [`TreeView::write_json`] to export: it walks the tree with an
/// explicit stack, while the derived serde impls recurse once per level
/// and are only suitable for shallow trees.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TreeView {
    pub current_node_id: Uuid,
    pub root: NestedNode,
}

/// Construction, cloning, comparison and dropping are all iterative, so
/// arbitrarily deep discussions are safe to handle.
#[derive(Serialize, Deserialize, Debug)]
pub struct NestedNode {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub children: Vec<NestedNode>,
}

impl NestedNode {
    /// Total number of nodes in this subtree, itself included.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(&node.children);
        }
        count
    }

    /// Pre-order listing of the subtree.
    fn preorder(&self) -> Vec<&NestedNode> {
        let mut ordered = Vec::new();
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            ordered.push(node);
            pending.extend(node.children.iter().rev());
        }
        ordered
    }

    fn shallow(&self, children: Vec<NestedNode>) -> NestedNode {
        NestedNode {
            id: self.id,
            role: self.role,
            content: self.content.clone(),
            children,
        }
    }
}

impl Clone for NestedNode {
    fn clone(&self) -> Self {
        // Rebuild bottom-up: walking the pre-order backwards finishes every
        // child before its parent, leaving siblings on `built` last-first.
        let ordered = self.preorder();
        let mut built: Vec<NestedNode> = Vec::with_capacity(ordered.len());
        for node in ordered.iter().skip(1).rev() {
            let mut children = built.split_off(built.len() - node.children.len());
            children.reverse();
            built.push(node.shallow(children));
        }
        built.reverse();
        self.shallow(built)
    }
}

impl PartialEq for NestedNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.id != b.id
                || a.role != b.role
                || a.content != b.content
                || a.children.len() != b.children.len()
            {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Drop for NestedNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl DiscussionTree {
    /// Expands the tree from the root following each node's children order.
    pub fn build_view(&self) -> TreeView {
        let ordered = self.nodes.preorder(self.root_id);
        let mut built: HashMap<Uuid, NestedNode> = HashMap::with_capacity(ordered.len());

        // Descendants follow their ancestors in pre-order, so walking it
        // backwards assembles each node after all of its children.
        for node in ordered.iter().skip(1).rev() {
            let view = assemble(node, &mut built);
            built.insert(node.id, view);
        }

        TreeView {
            current_node_id: self.current_node_id,
            root: assemble(self.root(), &mut built),
        }
    }
}

fn assemble(node: &MessageNode, built: &mut HashMap<Uuid, NestedNode>) -> NestedNode {
    NestedNode {
        id: node.id,
        role: node.role,
        content: node.content.clone(),
        children: node
            .children
            .iter()
            .filter_map(|child_id| built.remove(child_id))
            .collect(),
    }
}

impl TreeView {
    /// Writes the view as compact JSON, byte-identical to `serde_json::to_writer`.
    pub fn write_json<W: io::Write>(&self, writer: W) -> io::Result<()> {
        self.write_with(writer, CompactFormatter)
    }

    /// Writes the view as indented JSON, byte-identical to
    /// `serde_json::to_writer_pretty`.
    pub fn write_json_pretty<W: io::Write>(&self, writer: W) -> io::Result<()> {
        self.write_with(writer, PrettyFormatter::new())
    }

    pub fn to_json_string(&self) -> String {
        let mut out = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_json(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    fn write_with<W: io::Write, F: Formatter>(&self, mut w: W, mut f: F) -> io::Result<()> {
        f.begin_object(&mut w)?;
        write_field(&mut w, &mut f, "current_node_id", &self.current_node_id, true)?;
        write_key(&mut w, &mut f, "root", false)?;
        write_nested(&mut w, &mut f, &self.root)?;
        f.end_object_value(&mut w)?;
        f.end_object(&mut w)
    }
}

/// Emits a `NestedNode` using an explicit stack of (node, next child) frames.
fn write_nested<W: io::Write, F: Formatter>(
    w: &mut W,
    f: &mut F,
    root: &NestedNode,
) -> io::Result<()> {
    open_node(w, f, root)?;
    let mut stack: Vec<(&NestedNode, usize)> = vec![(root, 0)];

    while let Some(frame) = stack.last_mut() {
        let node: &NestedNode = frame.0;
        let index = frame.1;
        if let Some(child) = node.children.get(index) {
            frame.1 += 1;
            f.begin_array_value(w, index == 0)?;
            open_node(w, f, child)?;
            stack.push((child, 0));
            continue;
        }

        stack.pop();
        close_node(w, f)?;
        if !stack.is_empty() {
            f.end_array_value(w)?;
        }
    }
    Ok(())
}

fn open_node<W: io::Write, F: Formatter>(w: &mut W, f: &mut F, node: &NestedNode) -> io::Result<()> {
    f.begin_object(w)?;
    write_field(w, f, "id", &node.id, true)?;
    write_field(w, f, "role", &node.role, false)?;
    write_field(w, f, "content", &node.content, false)?;
    write_key(w, f, "children", false)?;
    f.begin_array(w)
}

fn close_node<W: io::Write, F: Formatter>(w: &mut W, f: &mut F) -> io::Result<()> {
    f.end_array(w)?;
    f.end_object_value(w)?;
    f.end_object(w)
}

fn write_key<W: io::Write, F: Formatter>(
    w: &mut W,
    f: &mut F,
    key: &str,
    first: bool,
) -> io::Result<()> {
    f.begin_object_key(w, first)?;
    serde_json::to_writer(&mut *w, key)?;
    f.end_object_key(w)?;
    f.begin_object_value(w)
}

fn write_field<W: io::Write, F: Formatter, T: Serialize>(
    w: &mut W,
    f: &mut F,
    key: &str,
    value: &T,
    first: bool,
) -> io::Result<()> {
    write_key(w, f, key, first)?;
    serde_json::to_writer(&mut *w, value)?;
    f.end_object_value(w)
}
