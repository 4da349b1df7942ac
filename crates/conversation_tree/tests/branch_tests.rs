//! Tests for append/select branching semantics

use conversation_tree::{DiscussionTree, LlmMetadata, Role, TreeError};
use uuid::Uuid;

#[test]
fn test_append_advances_pointer_and_links_parent() {
    let mut tree = DiscussionTree::create("sys");
    let root = tree.root_id();

    let a = tree.append_message(Role::User, "Hi", None).unwrap();

    assert_eq!(tree.current_node_id(), a);
    let node = tree.nodes().get_node(a).unwrap();
    assert_eq!(node.parent_id, Some(root));
    assert_eq!(tree.nodes().get_children(root).unwrap(), &[a]);
}

#[test]
fn test_select_then_append_creates_sibling_after_existing_child() {
    let mut tree = DiscussionTree::create("sys");
    let a = tree.append_message(Role::User, "A", None).unwrap();
    let b = tree.append_message(Role::Assistant, "B", None).unwrap();
    let d = tree.append_message(Role::User, "D", None).unwrap();
    assert_eq!(tree.nodes().get_children(b).unwrap(), &[d]);

    tree.select(b).unwrap();
    let c = tree.append_message(Role::User, "C", None).unwrap();

    assert_eq!(tree.nodes().get_node(c).unwrap().parent_id, Some(b));
    assert_eq!(tree.nodes().get_children(b).unwrap(), &[d, c]);
    assert_eq!(tree.current_node_id(), c);
    assert_eq!(tree.nodes().get_children(a).unwrap(), &[b]);
}

#[test]
fn test_select_current_is_noop() {
    let mut tree = DiscussionTree::create("sys");
    tree.append_message(Role::User, "A", None).unwrap();
    tree.append_message(Role::Assistant, "B", None).unwrap();
    let before = tree.clone();

    tree.select(tree.current_node_id()).unwrap();

    assert_eq!(tree, before);
}

#[test]
fn test_select_nonexistent_fails_and_keeps_pointer() {
    let mut tree = DiscussionTree::create("sys");
    let a = tree.append_message(Role::User, "A", None).unwrap();
    let missing = Uuid::new_v4();

    let result = tree.select(missing);

    assert_eq!(result, Err(TreeError::NodeNotFound(missing)));
    assert_eq!(tree.current_node_id(), a);
    assert_eq!(tree.node_count(), 2);
}

#[test]
fn test_select_does_not_alter_structure() {
    let mut tree = DiscussionTree::create("sys");
    let a = tree.append_message(Role::User, "A", None).unwrap();
    tree.append_message(Role::Assistant, "B", None).unwrap();
    let nodes_before = tree.nodes().clone();

    tree.select(a).unwrap();
    tree.select(tree.root_id()).unwrap();

    assert_eq!(tree.nodes(), &nodes_before);
    assert_eq!(tree.current_node_id(), tree.root_id());
}

#[test]
fn test_llm_metadata_is_carried_verbatim() {
    let mut tree = DiscussionTree::create("sys");
    tree.append_message(Role::User, "question", None).unwrap();
    let metadata = LlmMetadata::for_model("gpt-4o", "openrouter").with_usage(120, 30);

    let reply = tree
        .append_message(Role::Assistant, "answer", Some(metadata.clone()))
        .unwrap();

    let stored = tree.nodes().get_node(reply).unwrap();
    assert_eq!(stored.llm_metadata.as_ref(), Some(&metadata));
    assert_eq!(metadata.total_tokens, Some(150));
}

#[test]
fn test_many_branches_from_root_keep_creation_order() {
    let mut tree = DiscussionTree::create("sys");
    let root = tree.root_id();
    let mut expected = Vec::new();

    for i in 0..10 {
        tree.select(root).unwrap();
        expected.push(tree.append_message(Role::User, format!("opening {i}"), None).unwrap());
    }

    assert_eq!(tree.nodes().get_children(root).unwrap(), expected.as_slice());
    assert_eq!(tree.node_count(), 11);
}

#[test]
fn test_end_to_end_osaka_scenario() {
    let mut tree = DiscussionTree::create("You are helpful");
    let r = tree.root_id();

    let a = tree.append_message(Role::User, "Hi", None).unwrap();
    assert_eq!(tree.nodes().get_node(a).unwrap().parent_id, Some(r));
    assert_eq!(tree.current_node_id(), a);

    let b = tree.append_message(Role::Assistant, "Hello", None).unwrap();
    assert_eq!(tree.nodes().get_node(b).unwrap().parent_id, Some(a));
    assert_eq!(tree.current_node_id(), b);

    tree.select(a).unwrap();
    let c = tree
        .append_message(Role::User, "What about Osaka?", None)
        .unwrap();
    assert_eq!(tree.nodes().get_node(c).unwrap().parent_id, Some(a));
    assert_eq!(tree.current_node_id(), c);
    assert_eq!(tree.nodes().get_children(a).unwrap(), &[b, c]);

    let view = tree.build_view();
    assert_eq!(view.current_node_id, c);
    assert_eq!(view.root.id, r);
    assert_eq!(view.root.children.len(), 1);
    let view_a = &view.root.children[0];
    assert_eq!(view_a.id, a);
    let grandchildren: Vec<Uuid> = view_a.children.iter().map(|n| n.id).collect();
    assert_eq!(grandchildren, vec![b, c]);
    assert_eq!(view_a.children[1].content, "What about Osaka?");
}
