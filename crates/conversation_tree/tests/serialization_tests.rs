//! Tests for the persisted blob format

use conversation_tree::{
    deserialize, serialize, DiscussionTree, LlmMetadata, Role, TreeError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use uuid::Uuid;

fn sample_tree() -> DiscussionTree {
    let mut tree = DiscussionTree::create("You are helpful").with_title("Japan trip");
    let a = tree.append_message(Role::User, "Hi", None).unwrap();
    tree.append_message(
        Role::Assistant,
        "Hello",
        Some(LlmMetadata::for_model("claude", "anthropic").with_usage(10, 5)),
    )
    .unwrap();
    tree.select(a).unwrap();
    tree.append_message(Role::User, "What about Osaka?", None)
        .unwrap();
    tree
}

fn to_value(tree: &DiscussionTree) -> Value {
    serde_json::from_slice(&serialize(tree).unwrap()).unwrap()
}

fn expect_rejected(value: &Value) {
    let bytes = serde_json::to_vec(value).unwrap();
    match deserialize(&bytes) {
        Err(TreeError::Serialization(_)) => {}
        other => panic!("expected serialization error, got {other:?}"),
    }
}

fn node_index(value: &Value, id: Uuid) -> usize {
    value["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .position(|n| n["id"] == json!(id))
        .unwrap()
}

#[test]
fn test_round_trip_preserves_structure() {
    let tree = sample_tree();

    let restored = deserialize(&serialize(&tree).unwrap()).unwrap();

    assert_eq!(restored, tree);
    assert_eq!(restored.current_node_id(), tree.current_node_id());
    assert_eq!(restored.title(), Some("Japan trip"));
    let a = tree.nodes().get_children(tree.root_id()).unwrap()[0];
    assert_eq!(
        restored.nodes().get_children(a).unwrap(),
        tree.nodes().get_children(a).unwrap()
    );
}

#[test]
fn test_serialization_is_deterministic() {
    let tree = sample_tree();
    let restored = deserialize(&serialize(&tree).unwrap()).unwrap();

    assert_eq!(serialize(&tree).unwrap(), serialize(&restored).unwrap());
}

#[test]
fn test_metadata_extra_keys_serialize_in_stable_order() {
    let mut meta = LlmMetadata::for_model("gpt-4o", "openai").with_usage(40, 12);
    let keys = [
        "temperature",
        "top_p",
        "seed",
        "finish_reason",
        "latency_ms",
        "region",
        "cache_hit",
        "request_id",
    ];
    for (i, key) in keys.into_iter().enumerate() {
        meta.extra.insert(key.to_string(), json!({ "v": i, "k": key }));
    }
    let mut tree = DiscussionTree::create("sys");
    tree.append_message(Role::User, "Hi", None).unwrap();
    tree.append_message(Role::Assistant, "Hello", Some(meta.clone()))
        .unwrap();

    let original = serialize(&tree).unwrap();
    let mut current = original.clone();
    for _ in 0..20 {
        current = serialize(&deserialize(&current).unwrap()).unwrap();
        assert_eq!(current, original);
    }

    let text = String::from_utf8(original).unwrap();
    let mut sorted = keys;
    sorted.sort_unstable();
    let positions: Vec<usize> = sorted
        .iter()
        .map(|k| text.find(&format!("\"{k}\":")).unwrap())
        .collect();
    assert_eq!(positions.len(), 8);
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_round_trip_random_trees() {
    let mut rng = StdRng::seed_from_u64(0x7ee5);

    for _ in 0..25 {
        let mut tree = DiscussionTree::create("sys");
        let mut ids = vec![tree.root_id()];
        let size = rng.gen_range(1..60);
        for i in 0..size {
            let target = ids[rng.gen_range(0..ids.len())];
            tree.select(target).unwrap();
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            ids.push(tree.append_message(role, format!("m{i}"), None).unwrap());
        }
        tree.select(ids[rng.gen_range(0..ids.len())]).unwrap();

        let restored = deserialize(&serialize(&tree).unwrap()).unwrap();

        assert_eq!(restored, tree);
        assert_eq!(restored.build_view(), tree.build_view());
    }
}

#[test]
fn test_rejects_malformed_and_truncated_input() {
    let bytes = serialize(&sample_tree()).unwrap();

    assert!(matches!(deserialize(b"not json"), Err(TreeError::Serialization(_))));
    assert!(matches!(deserialize(b""), Err(TreeError::Serialization(_))));
    assert!(matches!(
        deserialize(&bytes[..bytes.len() / 2]),
        Err(TreeError::Serialization(_))
    ));
    assert!(matches!(deserialize(b"null"), Err(TreeError::Serialization(_))));
}

#[test]
fn test_rejects_unknown_format_version() {
    let mut value = to_value(&sample_tree());
    value["format_version"] = json!(99);

    expect_rejected(&value);
}

#[test]
fn test_rejects_missing_current_node() {
    let mut value = to_value(&sample_tree());
    value["current_node_id"] = json!(Uuid::new_v4());

    expect_rejected(&value);
}

#[test]
fn test_rejects_orphan_parent_reference() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let idx = node_index(&value, tree.current_node_id());
    value["nodes"][idx]["parent_id"] = json!(Uuid::new_v4());

    expect_rejected(&value);
}

#[test]
fn test_rejects_second_root() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let leaf = tree.current_node_id();
    let parent = tree.nodes().get_node(leaf).unwrap().parent_id.unwrap();
    let leaf_idx = node_index(&value, leaf);
    let parent_idx = node_index(&value, parent);
    value["nodes"][leaf_idx]["parent_id"] = Value::Null;
    let children: Vec<Value> = value["nodes"][parent_idx]["children"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| **c != json!(leaf))
        .cloned()
        .collect();
    value["nodes"][parent_idx]["children"] = Value::Array(children);

    expect_rejected(&value);
}

#[test]
fn test_rejects_duplicate_child_entry() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let root_idx = node_index(&value, tree.root_id());
    let first = value["nodes"][root_idx]["children"][0].clone();
    value["nodes"][root_idx]["children"]
        .as_array_mut()
        .unwrap()
        .push(first);

    expect_rejected(&value);
}

#[test]
fn test_rejects_children_disagreeing_with_parent_links() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let root_idx = node_index(&value, tree.root_id());
    value["nodes"][root_idx]["children"] = json!([]);

    expect_rejected(&value);
}

#[test]
fn test_rejects_detached_cycle() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    let stamp = value["created_at"].clone();
    for (id, parent, child) in [(x, y, y), (y, x, x)] {
        value["nodes"].as_array_mut().unwrap().push(json!({
            "id": id,
            "role": "user",
            "content": "loop",
            "parent_id": parent,
            "children": [child],
            "created_at": stamp,
        }));
    }

    expect_rejected(&value);
}

#[test]
fn test_rejects_duplicate_node_ids() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let idx = node_index(&value, tree.current_node_id());
    let copy = value["nodes"][idx].clone();
    value["nodes"].as_array_mut().unwrap().push(copy);

    expect_rejected(&value);
}

#[test]
fn test_rejects_root_with_parent() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let root_idx = node_index(&value, tree.root_id());
    let child = value["nodes"][root_idx]["children"][0].clone();
    value["nodes"][root_idx]["parent_id"] = child;

    expect_rejected(&value);
}

#[test]
fn test_unknown_role_is_rejected() {
    let tree = sample_tree();
    let mut value = to_value(&tree);
    let idx = node_index(&value, tree.current_node_id());
    value["nodes"][idx]["role"] = json!("tool");

    expect_rejected(&value);
}
