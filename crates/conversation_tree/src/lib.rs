//! `conversation_tree` models a discussion as a tree of messages where any
//! earlier message can be selected and replied to again, forking a new
//! branch, and persists that tree as a validated, self-describing blob.

pub mod error;
pub mod serialization;
pub mod structs;

// Re-export the public API
pub use error::{Result, TreeError};
pub use serialization::{deserialize, serialize, JsonTreeSerializer, TreeSerializer, FORMAT_VERSION};
pub use structs::discussion::DiscussionTree;
pub use structs::message::{MessageNode, Role};
pub use structs::metadata::LlmMetadata;
pub use structs::navigator::TreeNavigator;
pub use structs::node_store::NodeStore;
pub use structs::view::{NestedNode, TreeView};
