pub mod discussion;
pub mod discussion_branches;
pub mod message;
pub mod metadata;
pub mod navigator;
pub mod node_store;
pub mod view;
