use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::structs::discussion::DiscussionTree;
use crate::structs::message::Role;
use crate::structs::metadata::LlmMetadata;
use crate::structs::node_store::NodeStore;

impl DiscussionTree {
    /// Starts a discussion holding only the system-prompt root.
    pub fn create(system_prompt: impl Into<String>) -> Self {
        Self::create_with_id(Uuid::new_v4(), system_prompt)
    }

    pub fn create_with_id(uuid: Uuid, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let mut nodes = NodeStore::new();
        let root_id = nodes.insert_root(Role::System, system_prompt.clone());
        let now = Utc::now();

        tracing::info!(
            discussion_id = %uuid,
            root_id = %root_id,
            prompt_len = system_prompt.len(),
            "DiscussionTree: created"
        );

        Self {
            uuid,
            title: None,
            system_prompt,
            root_id,
            current_node_id: root_id,
            nodes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a message under the current node and moves the pointer to it.
    ///
    /// After a `select` of an earlier node this creates a sibling of the
    /// previous continuation, which is how a new branch comes into being.
    pub fn append_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        llm_metadata: Option<LlmMetadata>,
    ) -> Result<Uuid> {
        let parent_id = self.current_node_id;
        let node_id = self.nodes.add_node(parent_id, role, content, llm_metadata)?;
        let sibling_count = self.nodes.get_children(parent_id)?.len();

        self.current_node_id = node_id;
        self.touch();

        tracing::info!(
            discussion_id = %self.uuid,
            node_id = %node_id,
            parent_id = %parent_id,
            role = %role,
            branched = sibling_count > 1,
            "DiscussionTree: message appended"
        );

        Ok(node_id)
    }

    /// Moves the current pointer to an existing node.
    ///
    /// Fails with `NodeNotFound` and leaves the pointer untouched when the
    /// target is absent. Selecting the current node changes nothing.
    pub fn select(&mut self, node_id: Uuid) -> Result<()> {
        self.nodes.get_node(node_id)?;

        if node_id == self.current_node_id {
            tracing::debug!(
                discussion_id = %self.uuid,
                node_id = %node_id,
                "DiscussionTree: select on current node"
            );
            return Ok(());
        }

        let on_current_path = self
            .navigator()
            .is_descendant(node_id, self.current_node_id)
            .unwrap_or(false);

        self.current_node_id = node_id;
        self.touch();

        tracing::debug!(
            discussion_id = %self.uuid,
            node_id = %node_id,
            on_current_path,
            "DiscussionTree: pointer moved"
        );

        Ok(())
    }

    /// Moves the pointer to the most recently created node.
    pub fn select_latest(&mut self) -> Uuid {
        let latest = self.navigator().latest_node().id;
        if latest != self.current_node_id {
            self.current_node_id = latest;
            self.touch();
        }
        latest
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
        self.touch();
    }
}
